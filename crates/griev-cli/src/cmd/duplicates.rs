//! `grv duplicates` — page through the duplicate audit log.

use crate::cmd::open_existing_store;
use crate::output::{OutputMode, micros_to_rfc3339, pretty_rule, render};
use clap::Args;
use griev_core::db::query;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct DuplicatesArgs {
    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Maximum number of audit rows per page.
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Show only flagged attempts (actual duplicates).
    #[arg(long)]
    pub flagged_only: bool,
}

#[derive(Debug, Serialize)]
struct AuditView {
    original_reference_id: String,
    original_title: String,
    attempted_title: String,
    attempted_by: String,
    similarity_score: f64,
    text_score: f64,
    location_score: f64,
    category_score: f64,
    flagged: bool,
    reasoning: String,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct DuplicatesResult {
    records: Vec<AuditView>,
    total: u64,
}

/// Execute `grv duplicates`.
///
/// # Errors
///
/// Returns an error if the store is missing or the query fails.
pub fn run_duplicates(
    args: &DuplicatesArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let conn = open_existing_store(output, project_root)?;
    let offset = (args.page - 1).saturating_mul(args.limit);
    let page = query::list_audit(&conn, args.flagged_only, args.limit, offset)?;

    let records = page
        .records
        .into_iter()
        .map(|record| AuditView {
            original_reference_id: record.original_reference_id,
            original_title: record.original_title,
            attempted_title: record.attempted_title,
            attempted_by: record.attempted_by,
            similarity_score: record.similarity_score,
            text_score: record.text_score,
            location_score: record.location_score,
            category_score: record.category_score,
            flagged: record.flagged,
            reasoning: record.reasoning,
            created_at: micros_to_rfc3339(record.created_at_us),
        })
        .collect::<Vec<_>>();

    let result = DuplicatesResult {
        records,
        total: page.total,
    };

    render(output, &result, |r, w| {
        if r.records.is_empty() {
            return writeln!(w, "no duplicate attempts recorded");
        }
        for record in &r.records {
            let marker = if record.flagged { "FLAGGED" } else { "near  " };
            writeln!(
                w,
                "{}  {:>5.1}%  {}  \"{}\" by {}",
                marker,
                record.similarity_score,
                record.original_reference_id,
                record.attempted_title,
                record.attempted_by
            )?;
        }
        pretty_rule(w)?;
        writeln!(w, "({} of {} attempts shown)", r.records.len(), r.total)
    })
}
