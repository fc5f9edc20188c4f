//! `grv init` — initialize a project directory.

use crate::output::{OutputMode, render};
use clap::Args;
use griev_core::config::{self, ProjectConfig};
use griev_core::db;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file with defaults.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitResult {
    initialized: bool,
    already_initialized: bool,
    store_path: String,
    config_path: String,
}

/// Execute `grv init`.
///
/// Creates `.grv/`, writes a default `config.toml` (unless one exists),
/// and opens the store so the schema is migrated up front. Idempotent.
///
/// # Errors
///
/// Returns an error if the directory, config, or store cannot be created.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let config_path = config::project_config_path(project_root);
    let store_path = db::store_path(project_root);
    let already_initialized = store_path.exists();

    if let Some(grv_dir) = config_path.parent() {
        std::fs::create_dir_all(grv_dir)?;
    }

    if !config_path.exists() || args.force {
        let defaults = toml::to_string_pretty(&ProjectConfig::default())?;
        std::fs::write(&config_path, defaults)?;
        info!(path = %config_path.display(), "wrote default config");
    }

    // Opening runs migrations, so the first submit doesn't pay for them.
    drop(db::open_store(&store_path)?);

    let result = InitResult {
        initialized: true,
        already_initialized,
        store_path: store_path.display().to_string(),
        config_path: config_path.display().to_string(),
    };

    render(output, &result, |r, w| {
        if r.already_initialized {
            writeln!(w, "✓ project already initialized")?;
        } else {
            writeln!(w, "✓ initialized griev project")?;
        }
        writeln!(w, "  store:  {}", r.store_path)?;
        writeln!(w, "  config: {}", r.config_path)
    })
}
