//! Per-factor similarity scoring.
//!
//! Each factor lands in [0.0, 1.0]:
//! - text: cosine similarity of the embeddings, mapped from [-1, 1]
//! - location: textual match (exact, containment, or none)
//! - category: binary match on the canonical label
//!
//! The composite combination lives in [`composite`].

pub mod composite;

use griev_core::model::Category;
use std::str::FromStr;

/// Containment score when one normalized location contains the other.
pub const PARTIAL_LOCATION_SCORE: f64 = 0.6;

/// Cosine similarity in [-1.0, 1.0]. Mismatched lengths and zero vectors
/// yield 0.0 rather than NaN.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Text factor: cosine mapped into [0.0, 1.0] via `(cos + 1) / 2`.
///
/// A zero vector on either side scores 0.0, not 0.5: no signal means no
/// claimed similarity.
#[must_use]
pub fn text_similarity(a: &[f32], b: &[f32]) -> f64 {
    let zero = |v: &[f32]| v.iter().all(|x| *x == 0.0);
    if a.len() != b.len() || a.is_empty() || zero(a) || zero(b) {
        return 0.0;
    }
    (cosine_similarity(a, b) + 1.0) / 2.0
}

/// Scores how strongly two free-text locations refer to the same place.
pub trait LocationScorer: Send + Sync {
    /// Score in [0.0, 1.0].
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Textual location matching: exact (after normalization) scores 1.0,
/// containment scores [`PARTIAL_LOCATION_SCORE`], anything else 0.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextualLocationScorer;

fn normalize_location(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl LocationScorer for TextualLocationScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a = normalize_location(a);
        let b = normalize_location(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }
        if a.contains(&b) || b.contains(&a) {
            return PARTIAL_LOCATION_SCORE;
        }
        0.0
    }
}

/// Category factor: 1.0 when both sides parse to the same canonical
/// category, 0.0 otherwise (including when the stored value fails to parse).
#[must_use]
pub fn category_match(a: &str, b: &str) -> f64 {
    match (Category::from_str(a), Category::from_str(b)) {
        (Ok(left), Ok(right)) if left == right => 1.0,
        _ => 0.0,
    }
}

/// The three per-factor scores for one candidate, each in [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorScores {
    pub text: f64,
    pub location: f64,
    pub category: f64,
}
