//! Public reference ID allocation.
//!
//! Reference IDs are `GRV-{year}-{seq:05}` with a per-year sequence stored in
//! `ref_sequences`. Allocation happens inside the same transaction as the
//! complaint insert, so an aborted submission never burns a number that a
//! later submission would skip over.

use rusqlite::{Transaction, params};

/// Allocate the next reference ID for `year` inside the caller's transaction.
///
/// # Errors
///
/// Returns the underlying SQLite error if the sequence row cannot be created
/// or advanced.
pub fn allocate(tx: &Transaction<'_>, year: i32) -> rusqlite::Result<String> {
    tx.execute(
        "INSERT OR IGNORE INTO ref_sequences (year, next_seq) VALUES (?1, 1)",
        params![year],
    )?;

    let seq: i64 = tx.query_row(
        "UPDATE ref_sequences SET next_seq = next_seq + 1 WHERE year = ?1 \
         RETURNING next_seq - 1",
        params![year],
        |row| row.get(0),
    )?;

    Ok(format!("GRV-{year}-{seq:05}"))
}

/// Whether an insert failure is a `reference_id` UNIQUE violation.
///
/// The allocator makes this impossible under normal operation, so callers
/// map it to a fatal invariant breach rather than retrying.
#[must_use]
pub fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                ..
            },
            _,
        )
    )
}
