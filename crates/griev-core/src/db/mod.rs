//! SQLite store for complaints, embeddings, and the duplicate audit log.
//!
//! Runtime defaults are intentionally conservative:
//! - `journal_mode = WAL` to allow concurrent readers while a writer commits
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` so audit rows always reference a live complaint

pub mod migrations;
pub mod query;
pub mod refid;
pub mod schema;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use rusqlite::Connection;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Store file name under the `.grv` directory.
pub const STORE_FILE: &str = "griev.db";

/// Path to the store file under the given project root.
#[must_use]
pub fn store_path(project_root: &Path) -> PathBuf {
    project_root.join(crate::config::GRV_DIR).join(STORE_FILE)
}

/// Current wall-clock time in integer microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

/// Current UTC calendar year, used for reference ID allocation.
#[must_use]
pub fn utc_year() -> i32 {
    Utc::now().year()
}

/// Open (or create) the store, apply runtime pragmas, and migrate the schema
/// to the latest version.
///
/// sqlite-vec registration is attempted first so the connection picks up
/// `vec_distance_cosine`; a failed registration downgrades candidate ranking
/// to the Rust cosine scan and is logged, not fatal.
///
/// # Errors
///
/// Returns an error if opening, configuring, or migrating the store fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Err(reason) = griev_sqlite_vec::register_auto_extension() {
        warn!("sqlite-vec unavailable, using Rust cosine fallback: {reason}");
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("open complaint store {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;

    Ok(conn)
}

/// Open the store only if the file already exists.
///
/// Read-only commands use this to distinguish "not initialized" from real
/// open failures.
///
/// # Errors
///
/// Returns an error if an existing store cannot be opened.
pub fn try_open_store(path: &Path) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }
    open_store(path).map(Some)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
