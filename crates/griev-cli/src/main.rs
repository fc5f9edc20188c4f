mod cmd;
mod output;
mod submitter;
mod validate;

use clap::{Parser, Subcommand};
use griev_core::{config, error::ErrorCode, timing};
use output::{CliError, OutputMode, render_error};
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "grv: duplicate-aware civic grievance intake",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Override submitter identity (skips env resolution).
    #[arg(long, global = true)]
    submitter: Option<String>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn submitter_flag(&self) -> Option<&str> {
        self.submitter.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Initialize a griev project",
        long_about = "Initialize a griev project in the current directory: create .grv/, \
                      write a default config, and migrate the complaint store.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    grv init\n\n    # Emit machine-readable output\n    grv init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Intake",
        about = "Submit a complaint through duplicate detection",
        long_about = "Run the submission through duplicate detection. A new complaint gets \
                      a reference ID; a duplicate is flagged with the matching complaint \
                      and reasoning, and nothing is persisted.",
        after_help = "EXAMPLES:\n    # Submit a complaint\n    grv submit --title \"Broken streetlight on Main St\" \\\n        --description \"Dark every night for a week at the corner of Main and 2nd.\" \\\n        --category Electricity --location \"Main Street\"\n\n    # Emit machine-readable output\n    grv submit --title ... --description ... --category ... --location ... --json"
    )]
    Submit(cmd::submit::SubmitArgs),

    #[command(
        next_help_heading = "Intake",
        about = "Dry-run duplicate detection",
        long_about = "Score a would-be submission against the store without persisting \
                      anything: no complaint, no audit row, no lock.",
        after_help = "EXAMPLES:\n    # See what submit would decide\n    grv check --title \"Broken streetlight on Main St\" \\\n        --description \"Dark every night for a week at the corner of Main and 2nd.\" \\\n        --category Electricity --location \"Main Street\" --json"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one complaint and its timeline",
        long_about = "Show full details for a complaint by reference ID, including its \
                      comment timeline in chronological order.",
        after_help = "EXAMPLES:\n    # Track a complaint\n    grv track GRV-2026-00042\n\n    # Emit machine-readable output\n    grv track GRV-2026-00042 --json"
    )]
    Track(cmd::track::TrackArgs),

    #[command(
        next_help_heading = "Read",
        about = "List complaints",
        long_about = "List complaints newest-first with optional filters and pagination.",
        after_help = "EXAMPLES:\n    # Open electricity complaints\n    grv list --category Electricity --status registered\n\n    # Second page of 20\n    grv list --limit 20 --offset 20 --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Change a complaint's status",
        long_about = "Move a complaint forward through its lifecycle. The transition is \
                      validated and recorded as a system comment on the timeline.",
        after_help = "EXAMPLES:\n    # Verify a registered complaint\n    grv status GRV-2026-00042 verified\n\n    # Resolve with a note\n    grv status GRV-2026-00042 resolved --note \"crew replaced the lamp\""
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Comment on a complaint",
        long_about = "Append a comment to a complaint's timeline.",
        after_help = "EXAMPLES:\n    # Add a comment\n    grv comment GRV-2026-00042 -m \"crew scheduled for Thursday\""
    )]
    Comment(cmd::comment::CommentArgs),

    #[command(
        next_help_heading = "Admin",
        about = "Show the duplicate audit log",
        long_about = "Page through recorded duplicate detection attempts, newest first.",
        after_help = "EXAMPLES:\n    # Recent attempts\n    grv duplicates\n\n    # Only flagged duplicates, as JSON\n    grv duplicates --flagged-only --json"
    )]
    Duplicates(cmd::duplicates::DuplicatesArgs),

    #[command(
        next_help_heading = "Admin",
        about = "Show store-wide statistics",
        long_about = "Aggregate counts by status, category, and priority, plus duplicate \
                      and resolution-time summaries.",
        after_help = "EXAMPLES:\n    # Dashboard numbers\n    grv stats\n\n    # Emit machine-readable output\n    grv stats --json"
    )]
    Stats(cmd::stats::StatsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GRV_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "griev=debug,info"
        } else {
            "griev=info,warn"
        })
    });

    let format = env::var("GRV_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = std::env::current_dir()?;

    let effective = match config::resolve_config(&project_root, cli.json) {
        Ok(effective) => effective,
        Err(config_error) => {
            let fallback = if cli.json {
                OutputMode::Json
            } else {
                OutputMode::Text
            };
            render_error(
                fallback,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{config_error:#}")),
            )?;
            anyhow::bail!("config error");
        }
    };
    let output = OutputMode::from_name(&effective.resolved_output);

    let command_result = match cli.command {
        Commands::Init(ref args) => {
            timing::timed("cmd.init", || cmd::init::run_init(args, output, &project_root))
        }
        Commands::Submit(ref args) => timing::timed("cmd.submit", || {
            cmd::submit::run_submit(args, cli.submitter_flag(), &effective, output, &project_root)
        }),
        Commands::Check(ref args) => timing::timed("cmd.check", || {
            cmd::check::run_check(args, &effective, output, &project_root)
        }),
        Commands::Track(ref args) => {
            timing::timed("cmd.track", || cmd::track::run_track(args, output, &project_root))
        }
        Commands::List(ref args) => timing::timed("cmd.list", || {
            cmd::list::run_list(args, cli.submitter_flag(), &effective, output, &project_root)
        }),
        Commands::Status(ref args) => timing::timed("cmd.status", || {
            cmd::status::run_status(args, cli.submitter_flag(), &effective, output, &project_root)
        }),
        Commands::Comment(ref args) => timing::timed("cmd.comment", || {
            cmd::comment::run_comment(args, cli.submitter_flag(), &effective, output, &project_root)
        }),
        Commands::Duplicates(ref args) => timing::timed("cmd.duplicates", || {
            cmd::duplicates::run_duplicates(args, output, &project_root)
        }),
        Commands::Stats(ref args) => {
            timing::timed("cmd.stats", || cmd::stats::run_stats(args, output, &project_root))
        }
    };

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else if output.is_json() {
            eprintln!("{}", report.to_json());
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
        }
    }

    command_result
}
