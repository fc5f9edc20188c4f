//! `grv list` — list complaints with filters and pagination.

use crate::cmd::{ComplaintView, open_existing_store};
use crate::output::{CliError, OutputMode, render, render_error};
use crate::submitter;
use clap::Args;
use griev_core::config::EffectiveConfig;
use griev_core::db::query::{self, ComplaintFilter};
use griev_core::error::ErrorCode;
use griev_core::model::{Category, Priority, Status};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by status.
    #[arg(long)]
    pub status: Option<String>,

    /// Filter by category.
    #[arg(long)]
    pub category: Option<String>,

    /// Filter by priority.
    #[arg(long)]
    pub priority: Option<String>,

    /// Filter by submitter identity.
    #[arg(long, conflicts_with = "mine")]
    pub submitter: Option<String>,

    /// Only complaints submitted under your resolved identity.
    #[arg(long)]
    pub mine: bool,

    /// Maximum number of rows to return.
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Number of rows to skip.
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

fn parse_filter(args: &ListArgs, submitter: Option<String>) -> Result<ComplaintFilter, CliError> {
    let to_cli = |error: griev_core::model::ParseEnumError| {
        CliError::from_code(ErrorCode::InvalidEnumValue, error.to_string())
    };

    Ok(ComplaintFilter {
        status: args
            .status
            .as_deref()
            .map(Status::from_str)
            .transpose()
            .map_err(to_cli)?,
        category: args
            .category
            .as_deref()
            .map(Category::from_str)
            .transpose()
            .map_err(to_cli)?,
        priority: args
            .priority
            .as_deref()
            .map(Priority::from_str)
            .transpose()
            .map_err(to_cli)?,
        submitter,
        limit: Some(args.limit),
        offset: Some(args.offset),
    })
}

#[derive(Debug, Serialize)]
struct ListResult {
    complaints: Vec<ComplaintView>,
    total: u64,
}

/// Execute `grv list`.
///
/// # Errors
///
/// Returns an error when a filter value is invalid, `--mine` resolves no
/// identity, or the query fails.
pub fn run_list(
    args: &ListArgs,
    submitter_flag: Option<&str>,
    config: &EffectiveConfig,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let submitter_filter = if args.mine {
        match submitter::require_submitter(submitter_flag, &config.user) {
            Ok(who) => Some(who),
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
        }
    } else {
        args.submitter.clone()
    };

    let filter = match parse_filter(args, submitter_filter) {
        Ok(filter) => filter,
        Err(cli_error) => {
            render_error(output, &cli_error)?;
            anyhow::bail!("invalid filter");
        }
    };

    let conn = open_existing_store(output, project_root)?;
    let page = query::list_complaints(&conn, &filter)?;

    let result = ListResult {
        complaints: page.complaints.iter().map(ComplaintView::from_complaint).collect(),
        total: page.total,
    };

    render(output, &result, |r, w| {
        if r.complaints.is_empty() {
            return writeln!(w, "no complaints match");
        }
        for complaint in &r.complaints {
            writeln!(
                w,
                "{}  {:<12} {:<24} {}",
                complaint.reference_id, complaint.status, complaint.category, complaint.title
            )?;
        }
        writeln!(w, "({} of {} shown)", r.complaints.len(), r.total)
    })
}
