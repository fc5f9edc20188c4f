use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The closed set of complaint categories.
///
/// Parsing is lenient (trim, case-fold, whitespace collapse, common aliases)
/// so operator input like "roads" or "Water" lands on the canonical label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Electricity,
    #[serde(rename = "Water Supply")]
    WaterSupply,
    #[serde(rename = "Road & Infrastructure")]
    RoadInfrastructure,
    #[serde(rename = "Sanitation & Waste")]
    SanitationWaste,
    #[serde(rename = "Public Safety")]
    PublicSafety,
    #[serde(rename = "Public Transport")]
    PublicTransport,
    #[serde(rename = "Parks & Recreation")]
    ParksRecreation,
    Other,
}

impl Category {
    pub const ALL: [Self; 8] = [
        Self::Electricity,
        Self::WaterSupply,
        Self::RoadInfrastructure,
        Self::SanitationWaste,
        Self::PublicSafety,
        Self::PublicTransport,
        Self::ParksRecreation,
        Self::Other,
    ];

    /// Canonical display label, also the stored form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Electricity => "Electricity",
            Self::WaterSupply => "Water Supply",
            Self::RoadInfrastructure => "Road & Infrastructure",
            Self::SanitationWaste => "Sanitation & Waste",
            Self::PublicSafety => "Public Safety",
            Self::PublicTransport => "Public Transport",
            Self::ParksRecreation => "Parks & Recreation",
            Self::Other => "Other",
        }
    }

    /// Filesystem-safe slug used for partition lock file names.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::WaterSupply => "water-supply",
            Self::RoadInfrastructure => "road-infrastructure",
            Self::SanitationWaste => "sanitation-waste",
            Self::PublicSafety => "public-safety",
            Self::PublicTransport => "public-transport",
            Self::ParksRecreation => "parks-recreation",
            Self::Other => "other",
        }
    }
}

/// Submission priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Priority {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// The complaint lifecycle states.
///
/// The main chain is one-directional: registered -> verified -> assigned ->
/// in_progress -> resolved. Forward skips are allowed (a verified complaint
/// may be resolved directly); moving backward is not. `rejected` is reachable
/// from every non-terminal state. `resolved` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Registered,
    Verified,
    Assigned,
    InProgress,
    Resolved,
    Rejected,
}

impl Status {
    pub const ALL: [Self; 6] = [
        Self::Registered,
        Self::Verified,
        Self::Assigned,
        Self::InProgress,
        Self::Resolved,
        Self::Rejected,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Verified => "verified",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }

    /// Position on the main chain; `rejected` sits outside it.
    const fn chain_rank(self) -> Option<u8> {
        match self {
            Self::Registered => Some(0),
            Self::Verified => Some(1),
            Self::Assigned => Some(2),
            Self::InProgress => Some(3),
            Self::Resolved => Some(4),
            Self::Rejected => None,
        }
    }

    /// Statuses reachable from this one, in chain order.
    #[must_use]
    pub fn successors(self) -> Vec<Self> {
        if self.is_terminal() {
            return Vec::new();
        }
        let mut successors: Vec<Self> = Self::ALL
            .iter()
            .copied()
            .filter(|target| {
                target
                    .chain_rank()
                    .zip(self.chain_rank())
                    .is_some_and(|(to, from)| to > from)
            })
            .collect();
        successors.push(Self::Rejected);
        successors
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for no-op transitions, transitions out
    /// of a terminal state, and backward moves on the main chain.
    pub fn can_transition_to(self, target: Self) -> Result<(), InvalidTransition> {
        if self == target {
            return Err(InvalidTransition {
                from: self,
                to: target,
                reason: "no-op transition is not allowed",
            });
        }

        if self.is_terminal() {
            return Err(InvalidTransition {
                from: self,
                to: target,
                reason: "terminal states accept no further transitions",
            });
        }

        if target == Self::Rejected {
            return Ok(());
        }

        match (self.chain_rank(), target.chain_rank()) {
            (Some(from_rank), Some(to_rank)) if to_rank > from_rank => Ok(()),
            _ => Err(InvalidTransition {
                from: self,
                to: target,
                reason: "lifecycle only moves forward",
            }),
        }
    }
}

/// Error returned when a status transition is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: Status,
    pub to: Status,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot move complaint from '{}' to '{}': {}",
            self.from, self.to, self.reason
        )?;
        let successors = self.from.successors();
        if !successors.is_empty() {
            let allowed: Vec<&str> = successors.iter().map(|s| s.as_str()).collect();
            write!(f, " (allowed: {})", allowed.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidTransition {}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "electricity" | "power" | "electrical" => Ok(Self::Electricity),
            "water supply" | "water-supply" | "water" => Ok(Self::WaterSupply),
            "road & infrastructure" | "road and infrastructure" | "road-infrastructure"
            | "roads" | "road" | "infrastructure" => Ok(Self::RoadInfrastructure),
            "sanitation & waste" | "sanitation and waste" | "sanitation-waste" | "sanitation"
            | "waste" | "garbage" => Ok(Self::SanitationWaste),
            "public safety" | "public-safety" | "safety" => Ok(Self::PublicSafety),
            "public transport" | "public-transport" | "transport" | "transit" => {
                Ok(Self::PublicTransport)
            }
            "parks & recreation" | "parks and recreation" | "parks-recreation" | "parks"
            | "recreation" => Ok(Self::ParksRecreation),
            "other" | "misc" | "general" => Ok(Self::Other),
            _ => Err(ParseEnumError {
                expected: "category",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "medium" | "normal" => Ok(Self::Medium),
            "high" | "urgent" => Ok(Self::High),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "registered" => Ok(Self::Registered),
            "verified" => Ok(Self::Verified),
            "assigned" => Ok(Self::Assigned),
            "in_progress" | "in progress" | "in-progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

pub const TITLE_MIN_LEN: usize = 5;
pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MIN_LEN: usize = 30;
pub const DESCRIPTION_MAX_LEN: usize = 5000;
pub const LOCATION_MIN_LEN: usize = 3;
pub const LOCATION_MAX_LEN: usize = 200;

/// A persisted complaint (the store-level aggregate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    /// Internal opaque row ID; never shown to submitters.
    pub id: i64,
    /// Human-shareable identifier, e.g. `GRV-2026-00042`.
    pub reference_id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: String,
    pub priority: Priority,
    pub status: Status,
    pub submitter: String,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// A validated submission that has not yet been through detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: String,
    pub priority: Priority,
    pub submitter: String,
}

/// A single field violation found by [`NewComplaint::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl NewComplaint {
    /// Check field bounds before the detection pipeline runs.
    ///
    /// # Errors
    ///
    /// Returns the first [`FieldError`] found.
    pub fn validate(&self) -> Result<(), FieldError> {
        let title_len = self.title.chars().count();
        if self.title.trim() != self.title {
            return Err(FieldError {
                field: "title",
                reason: "must not start or end with whitespace".to_string(),
            });
        }
        if !(TITLE_MIN_LEN..=TITLE_MAX_LEN).contains(&title_len) {
            return Err(FieldError {
                field: "title",
                reason: format!("must be {TITLE_MIN_LEN}-{TITLE_MAX_LEN} characters"),
            });
        }
        if self.title.chars().any(char::is_control) {
            return Err(FieldError {
                field: "title",
                reason: "must not contain control characters".to_string(),
            });
        }

        let description_len = self.description.chars().count();
        if !(DESCRIPTION_MIN_LEN..=DESCRIPTION_MAX_LEN).contains(&description_len) {
            return Err(FieldError {
                field: "description",
                reason: format!("must be {DESCRIPTION_MIN_LEN}-{DESCRIPTION_MAX_LEN} characters"),
            });
        }

        let location_len = self.location.trim().chars().count();
        if !(LOCATION_MIN_LEN..=LOCATION_MAX_LEN).contains(&location_len) {
            return Err(FieldError {
                field: "location",
                reason: format!("must be {LOCATION_MIN_LEN}-{LOCATION_MAX_LEN} characters"),
            });
        }

        if self.submitter.trim().is_empty() {
            return Err(FieldError {
                field: "submitter",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Category, Complaint, FieldError, InvalidTransition, NewComplaint, Priority, Status,
    };
    use std::str::FromStr;

    fn sample_new() -> NewComplaint {
        NewComplaint {
            title: "Broken streetlight on Main St".to_string(),
            description: "The streetlight opposite house 42 has been dark for a week now."
                .to_string(),
            category: Category::Electricity,
            location: "Sector 14".to_string(),
            priority: Priority::Medium,
            submitter: "citizen-1".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Enum serialization and parsing
    // -----------------------------------------------------------------------

    #[test]
    fn enum_json_roundtrips() {
        assert_eq!(
            serde_json::to_string(&Category::RoadInfrastructure).unwrap(),
            "\"Road & Infrastructure\""
        );
        assert_eq!(
            serde_json::to_string(&Category::Electricity).unwrap(),
            "\"Electricity\""
        );
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"in_progress\""
        );

        assert_eq!(
            serde_json::from_str::<Category>("\"Water Supply\"").unwrap(),
            Category::WaterSupply
        );
        assert_eq!(
            serde_json::from_str::<Status>("\"rejected\"").unwrap(),
            Status::Rejected
        );
    }

    #[test]
    fn display_parse_roundtrips() {
        for value in Category::ALL {
            let rendered = value.to_string();
            let reparsed = Category::from_str(&rendered).unwrap();
            assert_eq!(value, reparsed);
        }
        for value in Priority::ALL {
            let rendered = value.to_string();
            let reparsed = Priority::from_str(&rendered).unwrap();
            assert_eq!(value, reparsed);
        }
        for value in Status::ALL {
            let rendered = value.to_string();
            let reparsed = Status::from_str(&rendered).unwrap();
            assert_eq!(value, reparsed);
        }
    }

    #[test]
    fn category_parse_accepts_aliases() {
        assert_eq!(
            Category::from_str("roads").unwrap(),
            Category::RoadInfrastructure
        );
        assert_eq!(
            Category::from_str("  Road   &  Infrastructure ").unwrap(),
            Category::RoadInfrastructure
        );
        assert_eq!(Category::from_str("WATER").unwrap(), Category::WaterSupply);
        assert_eq!(Category::from_str("garbage").unwrap(), Category::SanitationWaste);
    }

    #[test]
    fn status_parse_accepts_spaced_form() {
        assert_eq!(Status::from_str("in progress").unwrap(), Status::InProgress);
        assert_eq!(Status::from_str("In-Progress").unwrap(), Status::InProgress);
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert!(Category::from_str("plumbing").is_err());
        assert!(Priority::from_str("critical").is_err());
        assert!(Status::from_str("open").is_err());
    }

    #[test]
    fn category_slugs_are_filesystem_safe() {
        for value in Category::ALL {
            let slug = value.slug();
            assert!(
                slug.chars().all(|c| c.is_ascii_lowercase() || c == '-'),
                "slug {slug} has unsafe characters"
            );
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle transitions
    // -----------------------------------------------------------------------

    #[test]
    fn forward_chain_transitions_allowed() {
        assert!(Status::Registered.can_transition_to(Status::Verified).is_ok());
        assert!(Status::Verified.can_transition_to(Status::Assigned).is_ok());
        assert!(Status::Assigned.can_transition_to(Status::InProgress).is_ok());
        assert!(Status::InProgress.can_transition_to(Status::Resolved).is_ok());
    }

    #[test]
    fn forward_skips_allowed() {
        assert!(Status::Registered.can_transition_to(Status::Resolved).is_ok());
        assert!(Status::Verified.can_transition_to(Status::InProgress).is_ok());
    }

    #[test]
    fn backward_transitions_rejected() {
        assert!(matches!(
            Status::Resolved.can_transition_to(Status::Registered),
            Err(InvalidTransition {
                from: Status::Resolved,
                ..
            })
        ));
        assert!(Status::Assigned.can_transition_to(Status::Verified).is_err());
        assert!(Status::InProgress.can_transition_to(Status::Registered).is_err());
    }

    #[test]
    fn rejected_reachable_from_all_non_terminal() {
        for status in [
            Status::Registered,
            Status::Verified,
            Status::Assigned,
            Status::InProgress,
        ] {
            assert!(
                status.can_transition_to(Status::Rejected).is_ok(),
                "rejected should be reachable from {status}"
            );
        }
    }

    #[test]
    fn terminal_states_are_immutable() {
        for terminal in [Status::Resolved, Status::Rejected] {
            for target in Status::ALL {
                if target == terminal {
                    continue;
                }
                assert!(
                    terminal.can_transition_to(target).is_err(),
                    "{terminal} -> {target} should be rejected"
                );
            }
        }
    }

    #[test]
    fn noop_transition_rejected() {
        for status in Status::ALL {
            assert!(status.can_transition_to(status).is_err());
        }
    }

    #[test]
    fn transition_error_names_allowed_successors() {
        assert_eq!(
            Status::Registered.successors(),
            vec![
                Status::Verified,
                Status::Assigned,
                Status::InProgress,
                Status::Resolved,
                Status::Rejected
            ]
        );
        assert!(Status::Resolved.successors().is_empty());

        let error = Status::InProgress
            .can_transition_to(Status::Verified)
            .unwrap_err();
        let message = error.to_string();
        assert!(message.contains("allowed: resolved, rejected"), "{message}");
    }

    // -----------------------------------------------------------------------
    // Field validation
    // -----------------------------------------------------------------------

    #[test]
    fn valid_submission_passes() {
        assert!(sample_new().validate().is_ok());
    }

    #[test]
    fn short_title_rejected() {
        let mut input = sample_new();
        input.title = "Bad".to_string();
        assert!(matches!(
            input.validate(),
            Err(FieldError { field: "title", .. })
        ));
    }

    #[test]
    fn untrimmed_title_rejected() {
        let mut input = sample_new();
        input.title = " Leading space".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn short_description_rejected() {
        let mut input = sample_new();
        input.description = "too short".to_string();
        assert!(matches!(
            input.validate(),
            Err(FieldError {
                field: "description",
                ..
            })
        ));
    }

    #[test]
    fn long_description_rejected() {
        let mut input = sample_new();
        input.description = "x".repeat(super::DESCRIPTION_MAX_LEN + 1);
        assert!(input.validate().is_err());
    }

    #[test]
    fn short_location_rejected() {
        let mut input = sample_new();
        input.location = "s1".to_string();
        assert!(matches!(
            input.validate(),
            Err(FieldError {
                field: "location",
                ..
            })
        ));
    }

    #[test]
    fn empty_submitter_rejected() {
        let mut input = sample_new();
        input.submitter = "  ".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn complaint_serializes_with_canonical_labels() {
        let complaint = Complaint {
            id: 1,
            reference_id: "GRV-2026-00001".to_string(),
            title: "Broken streetlight on Main St".to_string(),
            description: "Dark for a week.".to_string(),
            category: Category::Electricity,
            location: "Sector 14".to_string(),
            priority: Priority::Medium,
            status: Status::Registered,
            submitter: "citizen-1".to_string(),
            created_at_us: 1_000,
            updated_at_us: 1_000,
        };
        let json = serde_json::to_string(&complaint).unwrap();
        assert!(json.contains("\"GRV-2026-00001\""));
        assert!(json.contains("\"Electricity\""));
        assert!(json.contains("\"registered\""));
    }
}
