//! Decision policy: pick the best candidate, classify against the
//! threshold, and produce human-readable reasoning for the audit trail.

use crate::candidates::Candidate;
use crate::score::FactorScores;

/// One candidate with its factor scores and composite percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub factors: FactorScores,
    /// Composite score in percent [0, 100].
    pub composite: f64,
}

/// Outcome of comparing a composite score against the duplicate threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    New,
    Duplicate,
}

/// Threshold comparison. Inclusive: a composite exactly at the threshold is
/// a duplicate.
#[must_use]
pub fn classify(composite: f64, threshold: f64) -> Decision {
    if composite >= threshold {
        Decision::Duplicate
    } else {
        Decision::New
    }
}

/// Pick the strongest candidate: highest composite, ties broken by oldest
/// creation time, then lowest row ID for full determinism.
#[must_use]
pub fn select_best(scored: &[ScoredCandidate]) -> Option<&ScoredCandidate> {
    scored.iter().min_by(|a, b| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.candidate.created_at_us.cmp(&b.candidate.created_at_us))
            .then(a.candidate.id.cmp(&b.candidate.id))
    })
}

fn factor_clauses(factors: &FactorScores) -> Vec<&'static str> {
    let mut clauses = Vec::new();
    if factors.text >= 0.7 {
        clauses.push("highly similar wording");
    } else if factors.text >= 0.5 {
        clauses.push("notably similar wording");
    }
    if factors.location >= 1.0 {
        clauses.push("the same reported location");
    } else if factors.location >= 0.6 {
        clauses.push("overlapping location");
    }
    if factors.category >= 1.0 {
        clauses.push("matching category");
    }
    clauses
}

/// Build the reasoning sentence stored in the audit trail and shown to
/// submitters when their complaint is flagged.
#[must_use]
pub fn build_reasoning(best: &ScoredCandidate, flagged: bool) -> String {
    let percent = best.composite.round();
    let reference = &best.candidate.reference_id;
    let clauses = factor_clauses(&best.factors);

    if clauses.is_empty() {
        if flagged {
            return format!(
                "complaint is {percent:.0}% similar to {reference} based on \
                 an overall similarity above the duplicate threshold"
            );
        }
        return format!(
            "complaint is {percent:.0}% similar to {reference}, \
             below the duplicate threshold"
        );
    }

    format!(
        "complaint is {percent:.0}% similar to {reference} based on {}",
        clauses.join(" and ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use griev_core::model::Status;

    fn candidate(id: i64, reference_id: &str, created_at_us: i64) -> Candidate {
        Candidate {
            id,
            reference_id: reference_id.to_string(),
            title: "Broken streetlight on Main St".to_string(),
            category: "Electricity".to_string(),
            location: "Sector 14".to_string(),
            status: Status::Registered,
            created_at_us,
            embedding: vec![1.0, 0.0],
        }
    }

    fn scored(id: i64, reference_id: &str, created_at_us: i64, composite: f64) -> ScoredCandidate {
        ScoredCandidate {
            candidate: candidate(id, reference_id, created_at_us),
            factors: FactorScores {
                text: 0.8,
                location: 1.0,
                category: 1.0,
            },
            composite,
        }
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(classify(75.0, 75.0), Decision::Duplicate);
        assert_eq!(classify(75.001, 75.0), Decision::Duplicate);
        assert_eq!(classify(74.999, 75.0), Decision::New);
    }

    // -----------------------------------------------------------------------
    // Best-candidate selection
    // -----------------------------------------------------------------------

    #[test]
    fn highest_composite_wins() {
        let all = vec![
            scored(1, "GRV-2026-00001", 10, 60.0),
            scored(2, "GRV-2026-00002", 20, 90.0),
            scored(3, "GRV-2026-00003", 30, 75.0),
        ];
        let best = select_best(&all).expect("non-empty");
        assert_eq!(best.candidate.reference_id, "GRV-2026-00002");
    }

    #[test]
    fn composite_tie_goes_to_oldest() {
        let all = vec![
            scored(1, "GRV-2026-00001", 20, 80.0),
            scored(2, "GRV-2026-00002", 10, 80.0),
        ];
        let best = select_best(&all).expect("non-empty");
        assert_eq!(best.candidate.reference_id, "GRV-2026-00002");
    }

    #[test]
    fn full_tie_goes_to_lowest_id() {
        let all = vec![
            scored(7, "GRV-2026-00007", 10, 80.0),
            scored(3, "GRV-2026-00003", 10, 80.0),
        ];
        let best = select_best(&all).expect("non-empty");
        assert_eq!(best.candidate.id, 3);
    }

    #[test]
    fn empty_slice_has_no_best() {
        assert!(select_best(&[]).is_none());
    }

    // -----------------------------------------------------------------------
    // Reasoning text
    // -----------------------------------------------------------------------

    #[test]
    fn reasoning_names_the_strong_factors() {
        let best = scored(1, "GRV-2026-00001", 10, 86.4);
        let reasoning = build_reasoning(&best, true);
        assert_eq!(
            reasoning,
            "complaint is 86% similar to GRV-2026-00001 based on \
             highly similar wording and the same reported location and matching category"
        );
    }

    #[test]
    fn reasoning_distinguishes_text_tiers() {
        let mut best = scored(1, "GRV-2026-00001", 10, 70.0);
        best.factors = FactorScores {
            text: 0.55,
            location: 0.6,
            category: 0.0,
        };
        let reasoning = build_reasoning(&best, false);
        assert!(reasoning.contains("notably similar wording"));
        assert!(reasoning.contains("overlapping location"));
        assert!(!reasoning.contains("matching category"));
    }

    #[test]
    fn weak_factors_fall_back_to_overall_wording() {
        let mut best = scored(1, "GRV-2026-00001", 10, 76.0);
        best.factors = FactorScores {
            text: 0.4,
            location: 0.0,
            category: 0.0,
        };
        assert!(build_reasoning(&best, true).contains("above the duplicate threshold"));

        best.composite = 30.0;
        assert!(build_reasoning(&best, false).contains("below the duplicate threshold"));
    }
}
