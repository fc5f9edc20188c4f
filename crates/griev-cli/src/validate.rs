//! Input validation that happens at the CLI boundary, before any store work.

use crate::output::CliError;
use griev_core::error::ErrorCode;

/// Check the `GRV-{year}-{seq}` reference ID shape before querying.
///
/// # Errors
///
/// Returns a [`CliError`] describing the expected shape.
pub fn validate_reference_id(raw: &str) -> Result<(), CliError> {
    let mut parts = raw.split('-');
    let shape_ok = parts.next() == Some("GRV")
        && parts
            .next()
            .is_some_and(|year| year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()))
        && parts
            .next()
            .is_some_and(|seq| seq.len() == 5 && seq.chars().all(|c| c.is_ascii_digit()))
        && parts.next().is_none();

    if shape_ok {
        Ok(())
    } else {
        Err(CliError::from_code(
            ErrorCode::InvalidField,
            format!("'{raw}' is not a reference ID (expected GRV-YYYY-NNNNN)"),
        ))
    }
}
