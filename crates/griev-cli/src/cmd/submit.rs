//! `grv submit` — run duplicate detection and register the complaint.

use crate::cmd::{ComplaintView, open_existing_store};
use crate::output::{
    CliError, OutputMode, micros_to_rfc3339, pretty_kv, pretty_section, render, render_error,
};
use crate::submitter;
use clap::Args;
use griev_core::config::EffectiveConfig;
use griev_core::model::{Category, NewComplaint, Priority};
use griev_detect::engine::{DetectionEngine, DuplicateMatch, EngineError, SubmitOutcome};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// Complaint fields shared by `submit` and `check`.
#[derive(Args, Debug)]
pub struct ComplaintArgs {
    /// Short summary of the problem (5-200 characters).
    #[arg(long)]
    pub title: String,

    /// Full description (30-5000 characters).
    #[arg(long)]
    pub description: String,

    /// Category, e.g. "Electricity" or "Water Supply" (aliases accepted).
    #[arg(long)]
    pub category: String,

    /// Free-text location (3-200 characters).
    #[arg(long)]
    pub location: String,

    /// Priority: low, medium, or high.
    #[arg(long, default_value = "medium")]
    pub priority: String,
}

impl ComplaintArgs {
    /// Parse the enum-valued fields and assemble a [`NewComplaint`].
    ///
    /// # Errors
    ///
    /// Returns a [`CliError`] naming the invalid value.
    pub fn to_new_complaint(&self, submitter: String) -> Result<NewComplaint, CliError> {
        let category = Category::from_str(&self.category).map_err(|error| {
            CliError::from_code(griev_core::error::ErrorCode::InvalidEnumValue, error.to_string())
        })?;
        let priority = Priority::from_str(&self.priority).map_err(|error| {
            CliError::from_code(griev_core::error::ErrorCode::InvalidEnumValue, error.to_string())
        })?;

        Ok(NewComplaint {
            title: self.title.clone(),
            description: self.description.clone(),
            category,
            location: self.location.clone(),
            priority,
            submitter,
        })
    }
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub complaint: ComplaintArgs,
}

/// A duplicate match as rendered in JSON output.
#[derive(Debug, Serialize)]
pub struct MatchView {
    pub reference_id: String,
    pub title: String,
    pub category: String,
    pub location: String,
    pub status: String,
    pub created_at: String,
    /// Composite similarity in percent.
    pub similarity_score: f64,
    pub reasoning: String,
    pub factor_scores: FactorView,
}

/// Per-factor scores in percent.
#[derive(Debug, Serialize)]
pub struct FactorView {
    pub text_similarity: f64,
    pub location_match: f64,
    pub category_match: f64,
}

impl MatchView {
    #[must_use]
    pub fn from_match(found: &DuplicateMatch) -> Self {
        Self {
            reference_id: found.reference_id.clone(),
            title: found.title.clone(),
            category: found.category.clone(),
            location: found.location.clone(),
            status: found.status.as_str().to_string(),
            created_at: micros_to_rfc3339(found.created_at_us),
            similarity_score: found.similarity_score,
            reasoning: found.reasoning.clone(),
            factor_scores: FactorView {
                text_similarity: found.factor_scores.text_similarity,
                location_match: found.factor_scores.location_match,
                category_match: found.factor_scores.category_match,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitResult {
    is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    complaint: Option<ComplaintView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duplicate_match: Option<MatchView>,
}

pub(crate) fn render_engine_error(output: OutputMode, error: &EngineError) -> anyhow::Result<()> {
    render_error(output, &CliError::from_code(error.code(), error.to_string()))
}

fn write_match(found: &MatchView, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Possible duplicate found")?;
    pretty_kv(w, "Reference", &found.reference_id)?;
    pretty_kv(w, "Title", &found.title)?;
    pretty_kv(w, "Category", &found.category)?;
    pretty_kv(w, "Location", &found.location)?;
    pretty_kv(w, "Status", &found.status)?;
    pretty_kv(w, "Submitted", &found.created_at)?;
    pretty_kv(w, "Similarity", format!("{:.1}%", found.similarity_score))?;
    writeln!(w)?;
    writeln!(w, "{}", found.reasoning)?;
    writeln!(w)?;
    writeln!(
        w,
        "Your complaint was not registered. Track the existing one with:\n    grv track {}",
        found.reference_id
    )
}

/// Execute `grv submit`.
///
/// # Errors
///
/// Returns an error when identity resolution, detection, or persistence
/// fails. The error is rendered before returning.
pub fn run_submit(
    args: &SubmitArgs,
    submitter_flag: Option<&str>,
    config: &EffectiveConfig,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
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

    let input = match args.complaint.to_new_complaint(who) {
        Ok(input) => input,
        Err(cli_error) => {
            render_error(output, &cli_error)?;
            anyhow::bail!("invalid submission");
        }
    };

    let mut conn = open_existing_store(output, project_root)?;
    let engine = match DetectionEngine::new(config.project.clone()) {
        Ok(engine) => engine,
        Err(engine_error) => {
            render_engine_error(output, &engine_error)?;
            anyhow::bail!("engine setup failed");
        }
    };

    let outcome = match engine.submit(&mut conn, project_root, &input) {
        Ok(outcome) => outcome,
        Err(engine_error) => {
            render_engine_error(output, &engine_error)?;
            anyhow::bail!("submission failed");
        }
    };

    let result = match outcome {
        SubmitOutcome::Accepted(complaint) => SubmitResult {
            is_duplicate: false,
            complaint: Some(ComplaintView::from_complaint(&complaint)),
            duplicate_match: None,
        },
        SubmitOutcome::Flagged(found) => SubmitResult {
            is_duplicate: true,
            complaint: None,
            duplicate_match: Some(MatchView::from_match(&found)),
        },
    };

    render(output, &result, |r, w| {
        if let Some(ref complaint) = r.complaint {
            writeln!(w, "✓ complaint registered: {}", complaint.reference_id)?;
            writeln!(w, "  track it with: grv track {}", complaint.reference_id)
        } else if let Some(ref found) = r.duplicate_match {
            write_match(found, w)
        } else {
            Ok(())
        }
    })?;

    // A flagged submission is a successful command: the engine did its job.
    Ok(())
}
