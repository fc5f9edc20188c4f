//! `grv comment` — append a comment to a complaint's timeline.

use crate::cmd::open_existing_store;
use crate::output::{CliError, OutputMode, micros_to_rfc3339, render, render_error};
use crate::submitter;
use crate::validate;
use clap::Args;
use griev_core::config::EffectiveConfig;
use griev_core::db::{self, query};
use griev_core::error::ErrorCode;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct CommentArgs {
    /// Reference ID, e.g. GRV-2026-00042.
    pub reference_id: String,

    /// Comment body.
    #[arg(long, short = 'm', visible_alias = "body")]
    pub message: String,
}

#[derive(Debug, Serialize)]
struct CommentResult {
    reference_id: String,
    author: String,
    body: String,
    created_at: String,
}

/// Execute `grv comment <reference-id> -m <message>`.
///
/// # Errors
///
/// Returns an error when the ID is invalid, identity is missing, or the
/// complaint does not exist.
pub fn run_comment(
    args: &CommentArgs,
    submitter_flag: Option<&str>,
    config: &EffectiveConfig,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    if let Err(cli_error) = validate::validate_reference_id(&args.reference_id) {
        render_error(output, &cli_error)?;
        anyhow::bail!("invalid reference ID");
    }

    if args.message.trim().is_empty() {
        render_error(
            output,
            &CliError::from_code(ErrorCode::InvalidField, "comment body must not be empty"),
        )?;
        anyhow::bail!("empty comment");
    }

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

    let now_us = db::now_us();
    query::insert_comment(&conn, complaint.id, &who, args.message.trim(), false, now_us)?;

    let result = CommentResult {
        reference_id: complaint.reference_id,
        author: who,
        body: args.message.trim().to_string(),
        created_at: micros_to_rfc3339(now_us),
    };

    render(output, &result, |r, w| {
        writeln!(w, "✓ comment added to {}", r.reference_id)
    })
}
