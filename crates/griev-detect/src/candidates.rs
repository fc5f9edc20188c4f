//! Candidate retrieval.
//!
//! Pulls the complaints a submission should be scored against: same category
//! first (rejected complaints excluded, resolved kept), widening to the full
//! corpus only when the category has no candidates at all. Coarse ranking
//! uses `vec_distance_cosine` in SQL when sqlite-vec is loaded, with a
//! pure-Rust cosine scan as the fallback.

use crate::embed::{decode_embedding_json, encode_embedding_json};
use crate::score::cosine_similarity;
use anyhow::{Context, Result};
use griev_core::model::{Category, Status};
use rusqlite::{Connection, Row, types::Type};
use std::str::FromStr;
use tracing::debug;

/// A stored complaint eligible for scoring against a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: i64,
    pub reference_id: String,
    pub title: String,
    pub category: String,
    pub location: String,
    pub status: Status,
    pub created_at_us: i64,
    pub embedding: Vec<f32>,
}

const CANDIDATE_SELECT: &str = "SELECT c.id, c.reference_id, c.title, c.category, c.location, \
            c.status, c.created_at_us, e.embedding_json \
     FROM complaints c \
     JOIN complaint_embeddings e ON e.complaint_id = c.id \
     WHERE c.status != 'rejected'";

fn candidate_from_row(row: &Row<'_>) -> rusqlite::Result<Candidate> {
    let status_raw: String = row.get(5)?;
    let status = Status::from_str(&status_raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(error)))?;

    let embedding_raw: String = row.get(7)?;
    let embedding = decode_embedding_json(&embedding_raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(error)))?;

    Ok(Candidate {
        id: row.get(0)?,
        reference_id: row.get(1)?,
        title: row.get(2)?,
        category: row.get(3)?,
        location: row.get(4)?,
        status,
        created_at_us: row.get(6)?,
        embedding,
    })
}

/// Top-K ranking inside SQLite. Fails when sqlite-vec is not loaded, in
/// which case the caller falls back to [`rank_in_rust`].
fn try_rank_sqlite_vec(
    conn: &Connection,
    query_json: &str,
    category: Option<Category>,
    limit: usize,
) -> rusqlite::Result<Vec<Candidate>> {
    let sql = match category {
        Some(_) => format!(
            "{CANDIDATE_SELECT} AND c.category = ?2 \
             ORDER BY vec_distance_cosine(vec_f32(e.embedding_json), vec_f32(?1)) ASC, \
                      c.created_at_us ASC \
             LIMIT ?3"
        ),
        None => format!(
            "{CANDIDATE_SELECT} \
             ORDER BY vec_distance_cosine(vec_f32(e.embedding_json), vec_f32(?1)) ASC, \
                      c.created_at_us ASC \
             LIMIT ?2"
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = match category {
        Some(category) => stmt.query_map(
            rusqlite::params![query_json, category.as_str(), limit],
            candidate_from_row,
        )?,
        None => stmt.query_map(rusqlite::params![query_json, limit], candidate_from_row)?,
    };

    rows.collect()
}

/// Top-K ranking in Rust: load every eligible row, sort by cosine, truncate.
fn rank_in_rust(
    conn: &Connection,
    query_embedding: &[f32],
    category: Option<Category>,
    limit: usize,
) -> Result<Vec<Candidate>> {
    let sql = match category {
        Some(_) => format!("{CANDIDATE_SELECT} AND c.category = ?1"),
        None => CANDIDATE_SELECT.to_string(),
    };

    let mut stmt = conn.prepare(&sql).context("prepare candidate scan")?;
    let rows = match category {
        Some(category) => stmt.query_map(rusqlite::params![category.as_str()], candidate_from_row),
        None => stmt.query_map([], candidate_from_row),
    }
    .context("execute candidate scan")?;

    let candidates = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read candidate rows")?;

    // Cosine once per row, not once per comparison.
    let mut scored: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|candidate| {
            (
                cosine_similarity(query_embedding, &candidate.embedding),
                candidate,
            )
        })
        .collect();
    scored.sort_by(|(sim_a, a), (sim_b, b)| {
        sim_b
            .partial_cmp(sim_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.created_at_us.cmp(&b.created_at_us))
    });

    Ok(scored
        .into_iter()
        .take(limit)
        .map(|(_, candidate)| candidate)
        .collect())
}

fn rank(
    conn: &Connection,
    query_embedding: &[f32],
    query_json: &str,
    category: Option<Category>,
    limit: usize,
) -> Result<Vec<Candidate>> {
    match try_rank_sqlite_vec(conn, query_json, category, limit) {
        Ok(candidates) => Ok(candidates),
        Err(error) => {
            debug!("sqlite-vec ranking unavailable, scanning in Rust: {error}");
            rank_in_rust(conn, query_embedding, category, limit)
        }
    }
}

/// Retrieve the top-`limit` candidates for a submission.
///
/// Same-category candidates are preferred; when the category holds none the
/// search widens to the whole corpus so a miscategorized resubmission can
/// still surface.
///
/// # Errors
///
/// Returns an error if the query fails or a stored row is corrupt.
pub fn retrieve(
    conn: &Connection,
    query_embedding: &[f32],
    category: Category,
    limit: usize,
) -> Result<Vec<Candidate>> {
    let query_json =
        encode_embedding_json(query_embedding).context("serialize query embedding")?;

    let same_category = rank(conn, query_embedding, &query_json, Some(category), limit)?;
    if !same_category.is_empty() {
        return Ok(same_category);
    }

    rank(conn, query_embedding, &query_json, None, limit)
}
