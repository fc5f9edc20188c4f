//! Submitter identity resolution.
//!
//! Resolution chain: `--submitter` flag > `GRV_SUBMITTER` env > user config
//! `submitter` > `USER` env (TTY only). Mutating commands require an
//! identity; read-only commands work without one.

use griev_core::config::UserConfig;
use griev_core::error::ErrorCode;
use std::env;

/// Error returned when no submitter identity could be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitterResolutionError {
    pub message: String,
    pub code: ErrorCode,
}

impl std::fmt::Display for SubmitterResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SubmitterResolutionError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_with(
    cli_flag: Option<&str>,
    user_config: &UserConfig,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(submitter) = cli_flag
        && !submitter.is_empty()
    {
        return Some(submitter.to_string());
    }

    if let Some(value) = env.get("GRV_SUBMITTER") {
        return Some(value);
    }

    if let Some(value) = user_config.submitter.as_ref().filter(|v| !v.is_empty()) {
        return Some(value.clone());
    }

    // USER is only trusted interactively; scripts must be explicit.
    if env.is_tty() {
        if let Some(value) = env.get("USER") {
            return Some(value);
        }
    }

    None
}

/// Resolve the submitter identity, or `None` when nothing in the chain is
/// set.
#[must_use]
pub fn resolve_submitter(cli_flag: Option<&str>, user_config: &UserConfig) -> Option<String> {
    resolve_with(cli_flag, user_config, &RealEnv)
}

/// Resolve the submitter identity for a mutating command.
///
/// # Errors
///
/// Returns a [`SubmitterResolutionError`] when the whole chain is empty.
pub fn require_submitter(
    cli_flag: Option<&str>,
    user_config: &UserConfig,
) -> Result<String, SubmitterResolutionError> {
    resolve_submitter(cli_flag, user_config).ok_or_else(|| SubmitterResolutionError {
        message: "Submitter identity required for this command. \
                  Set --submitter, GRV_SUBMITTER, or `submitter` in the user config."
            .to_string(),
        code: ErrorCode::MissingSubmitter,
    })
}
