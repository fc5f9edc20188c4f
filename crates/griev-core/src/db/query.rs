//! Typed queries over the complaint store.
//!
//! All reads return owned row structs; writes that must be atomic with
//! reference ID allocation take a [`Transaction`] so the caller controls the
//! commit boundary.

use crate::model::{Category, Complaint, NewComplaint, Priority, Status};
use anyhow::{Context, Result};
use rusqlite::{
    Connection, OptionalExtension, Row, Transaction, params, params_from_iter, types::Type,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

const COMPLAINT_COLUMNS: &str = "id, reference_id, title, description, category, location, \
     priority, status, submitter, created_at_us, updated_at_us";

fn parse_column<T: FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

fn complaint_from_row(row: &Row<'_>) -> rusqlite::Result<Complaint> {
    Ok(Complaint {
        id: row.get(0)?,
        reference_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: parse_column::<Category>(row, 4)?,
        location: row.get(5)?,
        priority: parse_column::<Priority>(row, 6)?,
        status: parse_column::<Status>(row, 7)?,
        submitter: row.get(8)?,
        created_at_us: row.get(9)?,
        updated_at_us: row.get(10)?,
    })
}

/// Fetch a complaint by internal row ID.
///
/// # Errors
///
/// Returns an error if the query fails or a stored enum value is corrupt.
pub fn get_complaint(conn: &Connection, id: i64) -> Result<Option<Complaint>> {
    conn.query_row(
        &format!("SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?1"),
        params![id],
        complaint_from_row,
    )
    .optional()
    .with_context(|| format!("query complaint id {id}"))
}

/// Fetch a complaint by its public reference ID.
///
/// # Errors
///
/// Returns an error if the query fails or a stored enum value is corrupt.
pub fn get_complaint_by_reference(
    conn: &Connection,
    reference_id: &str,
) -> Result<Option<Complaint>> {
    conn.query_row(
        &format!("SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE reference_id = ?1"),
        params![reference_id],
        complaint_from_row,
    )
    .optional()
    .with_context(|| format!("query complaint {reference_id}"))
}

/// Insert a new complaint row inside the caller's transaction.
///
/// Returns the internal row ID. The caller is responsible for writing the
/// embedding row in the same transaction.
///
/// # Errors
///
/// Returns the underlying SQLite error; a `reference_id` UNIQUE violation
/// surfaces here and must be treated as a fatal invariant breach.
pub fn insert_complaint(
    tx: &Transaction<'_>,
    input: &NewComplaint,
    reference_id: &str,
    now_us: i64,
) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO complaints (
            reference_id, title, description, category, location,
            priority, status, submitter, created_at_us, updated_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'registered', ?7, ?8, ?8)",
        params![
            reference_id,
            input.title,
            input.description,
            input.category.as_str(),
            input.location,
            input.priority.as_str(),
            input.submitter,
            now_us,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Write a complaint's embedding row inside the caller's transaction.
///
/// # Errors
///
/// Returns the underlying SQLite error.
pub fn insert_embedding(
    tx: &Transaction<'_>,
    complaint_id: i64,
    content_hash: &str,
    embedding_json: &str,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO complaint_embeddings (complaint_id, content_hash, embedding_json)
         VALUES (?1, ?2, ?3)",
        params![complaint_id, content_hash, embedding_json],
    )?;
    Ok(())
}

/// Read the pinned embedding dimension from the meta row (0 = unpinned).
///
/// # Errors
///
/// Returns an error if the meta row is missing.
pub fn embedding_dim(conn: &Connection) -> Result<usize> {
    let dim: i64 = conn
        .query_row("SELECT embedding_dim FROM engine_meta WHERE id = 1", [], |row| {
            row.get(0)
        })
        .context("query pinned embedding dimension")?;
    usize::try_from(dim).context("embedding_dim out of range")
}

/// Pin the store's embedding dimension on first use.
///
/// Returns the effective dimension: the newly pinned value when the store was
/// unpinned, otherwise the existing pin (which the caller must compare
/// against its provider's dimension).
///
/// # Errors
///
/// Returns an error if the meta row cannot be read or updated.
pub fn pin_embedding_dim(conn: &Connection, dim: usize) -> Result<usize> {
    let current = embedding_dim(conn)?;
    if current != 0 {
        return Ok(current);
    }

    conn.execute(
        "UPDATE engine_meta SET embedding_dim = ?1 WHERE id = 1",
        params![i64::try_from(dim).context("dimension out of range")?],
    )
    .context("pin embedding dimension")?;
    Ok(dim)
}

/// Update a complaint's status and bump `updated_at_us`.
///
/// Lifecycle validation happens before this call via
/// [`Status::can_transition_to`]; this function only persists the result.
///
/// # Errors
///
/// Returns an error if the update fails or matches no row.
pub fn set_status(conn: &Connection, id: i64, status: Status, now_us: i64) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE complaints SET status = ?1, updated_at_us = ?2 WHERE id = ?3",
            params![status.as_str(), now_us, id],
        )
        .with_context(|| format!("update status for complaint id {id}"))?;
    anyhow::ensure!(changed == 1, "status update matched {changed} rows for id {id}");
    Ok(())
}

/// A single comment on a complaint timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRow {
    pub comment_id: i64,
    pub complaint_id: i64,
    pub author: String,
    pub body: String,
    pub is_system: bool,
    pub created_at_us: i64,
}

/// Append a comment (human or system-generated) to a complaint.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_comment(
    conn: &Connection,
    complaint_id: i64,
    author: &str,
    body: &str,
    is_system: bool,
    now_us: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO complaint_comments (complaint_id, author, body, is_system, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![complaint_id, author, body, i64::from(is_system), now_us],
    )
    .with_context(|| format!("insert comment for complaint id {complaint_id}"))?;
    Ok(conn.last_insert_rowid())
}

/// Fetch a complaint's comments in chronological order (oldest first).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_comments(conn: &Connection, complaint_id: i64) -> Result<Vec<CommentRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT comment_id, complaint_id, author, body, is_system, created_at_us
             FROM complaint_comments
             WHERE complaint_id = ?1
             ORDER BY created_at_us ASC, comment_id ASC",
        )
        .context("prepare comment query")?;

    let rows = stmt
        .query_map(params![complaint_id], |row| {
            Ok(CommentRow {
                comment_id: row.get(0)?,
                complaint_id: row.get(1)?,
                author: row.get(2)?,
                body: row.get(3)?,
                is_system: row.get::<_, i64>(4)? != 0,
                created_at_us: row.get(5)?,
            })
        })
        .context("execute comment query")?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("read comment rows")
}

/// Optional filters for complaint listings.
#[derive(Debug, Clone, Default)]
pub struct ComplaintFilter {
    pub status: Option<Status>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub submitter: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ComplaintFilter {
    fn conditions(&self) -> (Vec<String>, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = self.status {
            param_values.push(Box::new(status.as_str()));
            conditions.push(format!("status = ?{}", param_values.len()));
        }
        if let Some(category) = self.category {
            param_values.push(Box::new(category.as_str()));
            conditions.push(format!("category = ?{}", param_values.len()));
        }
        if let Some(priority) = self.priority {
            param_values.push(Box::new(priority.as_str()));
            conditions.push(format!("priority = ?{}", param_values.len()));
        }
        if let Some(ref submitter) = self.submitter {
            param_values.push(Box::new(submitter.clone()));
            conditions.push(format!("submitter = ?{}", param_values.len()));
        }

        (conditions, param_values)
    }
}

/// One page of a complaint listing plus the unpaginated total.
#[derive(Debug, Clone, Serialize)]
pub struct ComplaintPage {
    pub complaints: Vec<Complaint>,
    pub total: u64,
}

/// List complaints newest-first with optional filters and pagination.
///
/// # Errors
///
/// Returns an error if either the page or count query fails.
pub fn list_complaints(conn: &Connection, filter: &ComplaintFilter) -> Result<ComplaintPage> {
    let (conditions, param_values) = filter.conditions();

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let mut limit_clause = String::new();
    match (filter.limit, filter.offset) {
        (Some(limit), Some(offset)) => {
            let _ = write!(limit_clause, " LIMIT {limit} OFFSET {offset}");
        }
        (Some(limit), None) => {
            let _ = write!(limit_clause, " LIMIT {limit}");
        }
        (None, Some(offset)) => {
            let _ = write!(limit_clause, " LIMIT -1 OFFSET {offset}");
        }
        (None, None) => {}
    }

    let sql = format!(
        "SELECT {COMPLAINT_COLUMNS} FROM complaints{where_clause} \
         ORDER BY created_at_us DESC, id DESC{limit_clause}"
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(AsRef::as_ref).collect();

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare complaint listing: {sql}"))?;
    let rows = stmt
        .query_map(params_from_iter(params_ref.iter()), complaint_from_row)
        .context("execute complaint listing")?;

    let complaints = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read complaint listing rows")?;

    let count_sql = format!("SELECT COUNT(*) FROM complaints{where_clause}");
    let total: i64 = conn
        .query_row(&count_sql, params_from_iter(params_ref.iter()), |row| {
            row.get(0)
        })
        .context("count complaint listing")?;

    Ok(ComplaintPage {
        complaints,
        total: u64::try_from(total).unwrap_or_default(),
    })
}

/// Evidence row written by the decision policy for one detection attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditRecord {
    pub original_complaint_id: i64,
    pub attempted_title: String,
    pub attempted_description: String,
    pub attempted_by: String,
    /// Composite similarity in percent [0, 100].
    pub similarity_score: f64,
    pub text_score: f64,
    pub location_score: f64,
    pub category_score: f64,
    /// Whether the attempt crossed the duplicate threshold.
    pub flagged: bool,
    pub reasoning: String,
}

/// Persist a duplicate audit row.
///
/// # Errors
///
/// Returns an error if the insert fails; callers treat this as non-fatal.
pub fn insert_audit(conn: &Connection, record: &NewAuditRecord, now_us: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO duplicate_audit (
            original_complaint_id, attempted_title, attempted_description,
            attempted_by, similarity_score, text_score, location_score,
            category_score, flagged, reasoning, created_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.original_complaint_id,
            record.attempted_title,
            record.attempted_description,
            record.attempted_by,
            record.similarity_score,
            record.text_score,
            record.location_score,
            record.category_score,
            i64::from(record.flagged),
            record.reasoning,
            now_us,
        ],
    )
    .context("insert duplicate audit row")?;
    Ok(conn.last_insert_rowid())
}

/// One stored detection attempt, joined with the original complaint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub audit_id: i64,
    pub original_complaint_id: i64,
    pub original_reference_id: String,
    pub original_title: String,
    pub attempted_title: String,
    pub attempted_description: String,
    pub attempted_by: String,
    pub similarity_score: f64,
    pub text_score: f64,
    pub location_score: f64,
    pub category_score: f64,
    pub flagged: bool,
    pub reasoning: String,
    pub created_at_us: i64,
}

/// One page of the audit log plus the total row count.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub records: Vec<AuditRecord>,
    pub total: u64,
}

/// Page through the duplicate audit log, newest attempts first.
///
/// With `flagged_only`, both the page and the total count apply the same
/// `flagged = 1` predicate, so pagination never drops flagged rows past a
/// page boundary.
///
/// # Errors
///
/// Returns an error if either the page or count query fails.
pub fn list_audit(
    conn: &Connection,
    flagged_only: bool,
    limit: u32,
    offset: u32,
) -> Result<AuditPage> {
    let flagged_clause = if flagged_only {
        " WHERE a.flagged = 1"
    } else {
        ""
    };
    let mut stmt = conn
        .prepare(&format!(
            "SELECT a.audit_id, a.original_complaint_id, c.reference_id, c.title,
                    a.attempted_title, a.attempted_description, a.attempted_by,
                    a.similarity_score, a.text_score, a.location_score,
                    a.category_score, a.flagged, a.reasoning, a.created_at_us
             FROM duplicate_audit a
             JOIN complaints c ON c.id = a.original_complaint_id{flagged_clause}
             ORDER BY a.created_at_us DESC, a.audit_id DESC
             LIMIT ?1 OFFSET ?2",
        ))
        .context("prepare audit listing")?;

    let rows = stmt
        .query_map(params![limit, offset], |row| {
            Ok(AuditRecord {
                audit_id: row.get(0)?,
                original_complaint_id: row.get(1)?,
                original_reference_id: row.get(2)?,
                original_title: row.get(3)?,
                attempted_title: row.get(4)?,
                attempted_description: row.get(5)?,
                attempted_by: row.get(6)?,
                similarity_score: row.get(7)?,
                text_score: row.get(8)?,
                location_score: row.get(9)?,
                category_score: row.get(10)?,
                flagged: row.get::<_, i64>(11)? != 0,
                reasoning: row.get(12)?,
                created_at_us: row.get(13)?,
            })
        })
        .context("execute audit listing")?;

    let records = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read audit rows")?;

    let count_sql = if flagged_only {
        "SELECT COUNT(*) FROM duplicate_audit WHERE flagged = 1"
    } else {
        "SELECT COUNT(*) FROM duplicate_audit"
    };
    let total: i64 = conn
        .query_row(count_sql, [], |row| row.get(0))
        .context("count audit rows")?;

    Ok(AuditPage {
        records,
        total: u64::try_from(total).unwrap_or_default(),
    })
}

/// Admin dashboard aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub total_complaints: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
    /// registered + verified.
    pub pending: u64,
    /// assigned + in_progress.
    pub active: u64,
    pub resolved: u64,
    pub rejected: u64,
    /// Flagged duplicate audit rows.
    pub duplicates_caught: u64,
    /// Mean days from creation to resolution over resolved complaints.
    pub avg_resolution_days: Option<f64>,
}

fn counts_by_column(conn: &Connection, column: &str) -> Result<BTreeMap<String, u64>> {
    let sql = format!("SELECT {column}, COUNT(*) FROM complaints GROUP BY {column}");
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare counts by {column}"))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .with_context(|| format!("execute counts by {column}"))?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let (key, count) = row.context("read count row")?;
        counts.insert(key, u64::try_from(count).unwrap_or_default());
    }
    Ok(counts)
}

/// Collect the admin stats aggregates in one pass over the store.
///
/// # Errors
///
/// Returns an error if any aggregate query fails.
pub fn collect_stats(conn: &Connection) -> Result<StatsReport> {
    let by_status = counts_by_column(conn, "status")?;
    let by_category = counts_by_column(conn, "category")?;
    let by_priority = counts_by_column(conn, "priority")?;

    let count = |status: Status| by_status.get(status.as_str()).copied().unwrap_or(0);
    let total_complaints = by_status.values().sum();

    let duplicates_caught: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM duplicate_audit WHERE flagged = 1",
            [],
            |row| row.get(0),
        )
        .context("count flagged audit rows")?;

    // Exact because resolved is terminal: the status change to resolved is the
    // last updated_at_us bump a complaint receives.
    let avg_resolution_days: Option<f64> = conn
        .query_row(
            "SELECT AVG((updated_at_us - created_at_us) / 86400000000.0)
             FROM complaints WHERE status = 'resolved'",
            [],
            |row| row.get(0),
        )
        .context("average resolution time")?;

    Ok(StatsReport {
        total_complaints,
        pending: count(Status::Registered) + count(Status::Verified),
        active: count(Status::Assigned) + count(Status::InProgress),
        resolved: count(Status::Resolved),
        rejected: count(Status::Rejected),
        by_status,
        by_category,
        by_priority,
        duplicates_caught: u64::try_from(duplicates_caught).unwrap_or_default(),
        avg_resolution_days,
    })
}
