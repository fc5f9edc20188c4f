//! Complaint model, configuration, and SQLite store for griev.
//!
//! This crate holds everything the duplicate detection engine needs from the
//! surrounding system: the complaint aggregate and its lifecycle, the project
//! and user configuration, the SQLite store (schema, migrations, queries,
//! reference ID allocation), and the per-category commit locks.

pub mod config;
pub mod db;
pub mod error;
pub mod lock;
pub mod model;
pub mod timing;
