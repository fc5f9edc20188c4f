//! `grv stats` — store-wide aggregates for administrators.

use crate::cmd::open_existing_store;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};
use clap::Args;
use griev_core::db::query;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct StatsArgs {}

/// Execute `grv stats`.
///
/// # Errors
///
/// Returns an error if the store is missing or an aggregate query fails.
pub fn run_stats(
    _args: &StatsArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let conn = open_existing_store(output, project_root)?;
    let report = query::collect_stats(&conn)?;

    render(output, &report, |r, w| {
        pretty_section(w, "Complaint statistics")?;
        pretty_kv(w, "Total", r.total_complaints.to_string())?;
        pretty_kv(w, "Pending", r.pending.to_string())?;
        pretty_kv(w, "Active", r.active.to_string())?;
        pretty_kv(w, "Resolved", r.resolved.to_string())?;
        pretty_kv(w, "Rejected", r.rejected.to_string())?;
        pretty_kv(w, "Duplicates", r.duplicates_caught.to_string())?;
        if let Some(days) = r.avg_resolution_days {
            pretty_kv(w, "Avg resolution", format!("{days:.1} days"))?;
        }

        if !r.by_category.is_empty() {
            writeln!(w)?;
            pretty_section(w, "By category")?;
            for (category, count) in &r.by_category {
                pretty_kv(w, category, count.to_string())?;
            }
        }

        if !r.by_status.is_empty() {
            writeln!(w)?;
            pretty_section(w, "By status")?;
            for (status, count) in &r.by_status {
                pretty_kv(w, status, count.to_string())?;
            }
        }
        Ok(())
    })
}
