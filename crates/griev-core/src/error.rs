use std::fmt;

/// Machine-readable error codes for operator- and script-friendly output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    StoreOpenFailed,
    ComplaintNotFound,
    InvalidStatusTransition,
    InvalidEnumValue,
    InvalidField,
    MissingSubmitter,
    EmbeddingUnavailable,
    EmbeddingDimensionMismatch,
    ReferenceIdCollision,
    AuditLogFailure,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::StoreOpenFailed => "E1003",
            Self::ComplaintNotFound => "E2001",
            Self::InvalidStatusTransition => "E2002",
            Self::InvalidEnumValue => "E2003",
            Self::InvalidField => "E2004",
            Self::MissingSubmitter => "E2005",
            Self::EmbeddingUnavailable => "E3001",
            Self::EmbeddingDimensionMismatch => "E3002",
            Self::ReferenceIdCollision => "E4001",
            Self::AuditLogFailure => "E4002",
            Self::LockContention => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::StoreOpenFailed => "Complaint store could not be opened",
            Self::ComplaintNotFound => "Complaint not found",
            Self::InvalidStatusTransition => "Invalid status transition",
            Self::InvalidEnumValue => "Invalid category/priority/status value",
            Self::InvalidField => "Invalid field value",
            Self::MissingSubmitter => "Submitter identity required",
            Self::EmbeddingUnavailable => "Embedding provider unavailable",
            Self::EmbeddingDimensionMismatch => "Embedding dimension mismatch",
            Self::ReferenceIdCollision => "Reference ID collision",
            Self::AuditLogFailure => "Duplicate audit write failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Whether the operation that produced this code is worth retrying as-is.
    #[must_use]
    pub const fn retryable(self) -> bool {
        matches!(self, Self::EmbeddingUnavailable | Self::LockContention)
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `grv init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .grv/config.toml and retry."),
            Self::StoreOpenFailed => Some("Check permissions on .grv/griev.db and retry."),
            Self::ComplaintNotFound => Some("Check the reference ID; use `grv list` to browse."),
            Self::InvalidStatusTransition => Some(
                "Follow valid transitions: registered -> verified -> assigned -> in_progress -> resolved.",
            ),
            Self::InvalidEnumValue => {
                Some("Use one of the documented category/priority/status values.")
            }
            Self::InvalidField => None,
            Self::MissingSubmitter => Some(
                "Set --submitter, GRV_SUBMITTER, or `submitter` in the user config.",
            ),
            Self::EmbeddingUnavailable => {
                Some("Retry the submission; the complaint was not recorded.")
            }
            Self::EmbeddingDimensionMismatch => {
                Some("The store was initialized with a different embedding dimension.")
            }
            Self::ReferenceIdCollision => {
                Some("This indicates store corruption; do not retry. Report a bug with logs.")
            }
            Self::AuditLogFailure => Some("The submission outcome stands; check disk space."),
            Self::LockContention => Some("Retry after the other `grv` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
