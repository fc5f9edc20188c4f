//! `grv track` — show one complaint with its comment timeline.

use crate::cmd::{ComplaintView, open_existing_store};
use crate::output::{
    CliError, OutputMode, micros_to_rfc3339, pretty_kv, pretty_rule, pretty_section, render,
    render_error,
};
use crate::validate;
use clap::Args;
use griev_core::db::query;
use griev_core::error::ErrorCode;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct TrackArgs {
    /// Reference ID, e.g. GRV-2026-00042.
    pub reference_id: String,
}

#[derive(Debug, Serialize)]
pub struct TrackComment {
    pub author: String,
    pub body: String,
    pub is_system: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
struct TrackResult {
    complaint: ComplaintView,
    comments: Vec<TrackComment>,
}

/// Execute `grv track <reference-id>`.
///
/// # Errors
///
/// Returns an error when the ID is malformed, the store is missing, or the
/// complaint does not exist. The error is rendered before returning.
pub fn run_track(args: &TrackArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    if let Err(cli_error) = validate::validate_reference_id(&args.reference_id) {
        render_error(output, &cli_error)?;
        anyhow::bail!("invalid reference ID");
    }

    let conn = open_existing_store(output, project_root)?;

    let Some(complaint) = query::get_complaint_by_reference(&conn, &args.reference_id)? else {
        render_error(
            output,
            &CliError::from_code(ErrorCode::ComplaintNotFound, &args.reference_id),
        )?;
        anyhow::bail!("complaint '{}' not found", args.reference_id);
    };

    let comments = query::list_comments(&conn, complaint.id)?
        .into_iter()
        .map(|comment| TrackComment {
            author: comment.author,
            body: comment.body,
            is_system: comment.is_system,
            created_at: micros_to_rfc3339(comment.created_at_us),
        })
        .collect();

    let result = TrackResult {
        complaint: ComplaintView::from_complaint(&complaint),
        comments,
    };

    render(output, &result, |r, w| {
        pretty_section(w, &format!("Complaint {}", r.complaint.reference_id))?;
        pretty_kv(w, "Title", &r.complaint.title)?;
        pretty_kv(w, "Category", &r.complaint.category)?;
        pretty_kv(w, "Location", &r.complaint.location)?;
        pretty_kv(w, "Priority", &r.complaint.priority)?;
        pretty_kv(w, "Status", &r.complaint.status)?;
        pretty_kv(w, "Submitter", &r.complaint.submitter)?;
        pretty_kv(w, "Created", &r.complaint.created_at)?;
        pretty_kv(w, "Updated", &r.complaint.updated_at)?;
        writeln!(w)?;
        writeln!(w, "{}", r.complaint.description)?;

        if !r.comments.is_empty() {
            writeln!(w)?;
            pretty_rule(w)?;
            for comment in &r.comments {
                let marker = if comment.is_system { " [system]" } else { "" };
                writeln!(w, "{}{} at {}", comment.author, marker, comment.created_at)?;
                writeln!(w, "  {}", comment.body)?;
            }
        }
        Ok(())
    })
}
