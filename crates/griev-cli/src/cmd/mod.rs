//! Command handlers for the `grv` binary.

pub mod check;
pub mod comment;
pub mod duplicates;
pub mod init;
pub mod list;
pub mod stats;
pub mod status;
pub mod submit;
pub mod track;

use crate::output::{CliError, OutputMode, micros_to_rfc3339, render_error};
use griev_core::db;
use griev_core::error::ErrorCode;
use griev_core::model::Complaint;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

/// Open the store only if the project has been initialized; render a
/// not-initialized error otherwise.
///
/// # Errors
///
/// Returns an error (already rendered) when the store is missing or cannot
/// be opened.
pub fn open_existing_store(output: OutputMode, project_root: &Path) -> anyhow::Result<Connection> {
    let path = db::store_path(project_root);
    match db::try_open_store(&path) {
        Ok(Some(conn)) => Ok(conn),
        Ok(None) => {
            render_error(
                output,
                &CliError::from_code(
                    ErrorCode::NotInitialized,
                    format!("no complaint store at {}", path.display()),
                ),
            )?;
            anyhow::bail!("not initialized");
        }
        Err(open_error) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::StoreOpenFailed, format!("{open_error:#}")),
            )?;
            anyhow::bail!("store open failed");
        }
    }
}

/// A complaint as rendered in JSON output: timestamps in RFC 3339, internal
/// row ID omitted.
#[derive(Debug, Serialize)]
pub struct ComplaintView {
    pub reference_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub priority: String,
    pub status: String,
    pub submitter: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ComplaintView {
    #[must_use]
    pub fn from_complaint(complaint: &Complaint) -> Self {
        Self {
            reference_id: complaint.reference_id.clone(),
            title: complaint.title.clone(),
            description: complaint.description.clone(),
            category: complaint.category.as_str().to_string(),
            location: complaint.location.clone(),
            priority: complaint.priority.as_str().to_string(),
            status: complaint.status.as_str().to_string(),
            submitter: complaint.submitter.clone(),
            created_at: micros_to_rfc3339(complaint.created_at_us),
            updated_at: micros_to_rfc3339(complaint.updated_at_us),
        }
    }
}
