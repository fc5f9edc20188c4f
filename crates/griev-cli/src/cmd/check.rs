//! `grv check` — dry-run duplicate detection with no writes.

use crate::cmd::open_existing_store;
use crate::cmd::submit::{ComplaintArgs, MatchView, render_engine_error};
use crate::output::{OutputMode, pretty_kv, pretty_section, render, render_error};
use clap::Args;
use griev_core::config::EffectiveConfig;
use griev_detect::engine::DetectionEngine;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub complaint: ComplaintArgs,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    is_duplicate: bool,
    candidates_considered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    best_match: Option<MatchView>,
}

/// Execute `grv check`.
///
/// Uses a placeholder submitter identity because nothing is persisted and
/// no audit row is written.
///
/// # Errors
///
/// Returns an error when validation, embedding, or a store read fails.
pub fn run_check(
    args: &CheckArgs,
    config: &EffectiveConfig,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let input = match args.complaint.to_new_complaint("check".to_string()) {
        Ok(input) => input,
        Err(cli_error) => {
            render_error(output, &cli_error)?;
            anyhow::bail!("invalid submission");
        }
    };

    let conn = open_existing_store(output, project_root)?;
    let engine = match DetectionEngine::new(config.project.clone()) {
        Ok(engine) => engine,
        Err(engine_error) => {
            render_engine_error(output, &engine_error)?;
            anyhow::bail!("engine setup failed");
        }
    };

    let report = match engine.check(&conn, &input) {
        Ok(report) => report,
        Err(engine_error) => {
            render_engine_error(output, &engine_error)?;
            anyhow::bail!("check failed");
        }
    };

    let result = CheckResult {
        is_duplicate: report.is_duplicate,
        candidates_considered: report.candidates_considered,
        best_match: report.best_match.as_ref().map(MatchView::from_match),
    };

    render(output, &result, |r, w| {
        pretty_section(w, "Duplicate check (dry run)")?;
        pretty_kv(w, "Duplicate", if r.is_duplicate { "yes" } else { "no" })?;
        pretty_kv(w, "Candidates", r.candidates_considered.to_string())?;
        if let Some(ref best) = r.best_match {
            pretty_kv(w, "Best match", &best.reference_id)?;
            pretty_kv(w, "Similarity", format!("{:.1}%", best.similarity_score))?;
            writeln!(w)?;
            writeln!(w, "{}", best.reasoning)?;
        }
        Ok(())
    })
}
