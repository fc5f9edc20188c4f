//! `grv status` — move a complaint through its lifecycle.
//!
//! Every successful transition appends a system comment so the timeline in
//! `grv track` records who changed what, when.

use crate::cmd::{ComplaintView, open_existing_store};
use crate::output::{CliError, OutputMode, render, render_error};
use crate::submitter;
use crate::validate;
use clap::Args;
use griev_core::config::EffectiveConfig;
use griev_core::db::{self, query};
use griev_core::error::ErrorCode;
use griev_core::model::Status;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Reference ID, e.g. GRV-2026-00042.
    pub reference_id: String,

    /// Target status: verified, assigned, in_progress, resolved, or rejected.
    pub new_status: String,

    /// Optional note recorded alongside the transition.
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResult {
    complaint: ComplaintView,
    previous_status: String,
}

/// Execute `grv status <reference-id> <new-status>`.
///
/// # Errors
///
/// Returns an error when the ID or status is invalid, the complaint does
/// not exist, or the transition is not allowed.
pub fn run_status(
    args: &StatusArgs,
    submitter_flag: Option<&str>,
    config: &EffectiveConfig,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    if let Err(cli_error) = validate::validate_reference_id(&args.reference_id) {
        render_error(output, &cli_error)?;
        anyhow::bail!("invalid reference ID");
    }

    let target = match Status::from_str(&args.new_status) {
        Ok(target) => target,
        Err(parse_error) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::InvalidEnumValue, parse_error.to_string()),
            )?;
            anyhow::bail!("invalid status");
        }
    };

    let who = match submitter::require_submitter(submitter_flag, &config.user) {
        Ok(who) => who,
        Err(resolution) => {
            render_error(
                output,
                &CliError {
                    message: resolution.message.clone(),
                    suggestion: resolution.code.hint().map(str::to_string),
                    error_code: Some(resolution.code.to_string()),
                },
            )?;
            anyhow::bail!("missing submitter identity");
        }
    };

    let conn = open_existing_store(output, project_root)?;

    let Some(complaint) = query::get_complaint_by_reference(&conn, &args.reference_id)? else {
        render_error(
            output,
            &CliError::from_code(ErrorCode::ComplaintNotFound, &args.reference_id),
        )?;
        anyhow::bail!("complaint '{}' not found", args.reference_id);
    };

    if let Err(transition_error) = complaint.status.can_transition_to(target) {
        render_error(
            output,
            &CliError::from_code(
                ErrorCode::InvalidStatusTransition,
                transition_error.to_string(),
            ),
        )?;
        anyhow::bail!("invalid transition");
    }

    let now_us = db::now_us();
    query::set_status(&conn, complaint.id, target, now_us)?;

    let mut note = format!(
        "status changed from {} to {} by {}",
        complaint.status, target, who
    );
    if let Some(extra) = args.note.as_deref().filter(|n| !n.trim().is_empty()) {
        note.push_str(": ");
        note.push_str(extra.trim());
    }
    // Timeline entry is best-effort; the transition itself already stands.
    if let Err(comment_error) = query::insert_comment(&conn, complaint.id, &who, &note, true, now_us)
    {
        warn!("system comment write failed: {comment_error:#}");
    }

    let Some(updated) = query::get_complaint(&conn, complaint.id)? else {
        anyhow::bail!("complaint vanished after update");
    };

    let result = StatusResult {
        complaint: ComplaintView::from_complaint(&updated),
        previous_status: complaint.status.as_str().to_string(),
    };

    render(output, &result, |r, w| {
        writeln!(
            w,
            "✓ {} moved from {} to {}",
            r.complaint.reference_id, r.previous_status, r.complaint.status
        )
    })
}
