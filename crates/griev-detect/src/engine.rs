//! The detection engine: embed, retrieve, score, decide, persist.
//!
//! [`DetectionEngine::submit`] is the only write path for new complaints.
//! Its ordering is deliberate:
//!
//! 1. validate fields and embed the text (outside any lock)
//! 2. acquire the category partition lock
//! 3. retrieve and score candidates, pick the best, classify
//! 4. duplicate: write a flagged audit row, persist nothing else
//! 5. new: allocate a reference ID, insert complaint + embedding in one
//!    transaction, then write an unflagged audit row when warranted
//!
//! Audit writes are best-effort: a failure is logged and the submission
//! outcome stands.

use crate::candidates::{self, Candidate};
use crate::embed::{self, EmbedError, Embedder};
use crate::policy::{self, Decision, ScoredCandidate};
use crate::score::{self, FactorScores, LocationScorer, TextualLocationScorer};
use griev_core::config::ProjectConfig;
use griev_core::db::{self, query, refid};
use griev_core::error::ErrorCode;
use griev_core::lock::{DEFAULT_LOCK_TIMEOUT, LockError, PartitionLock};
use griev_core::model::{Complaint, FieldError, NewComplaint};
use griev_core::timing::timed;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info};

/// Anything that can stop a submission or dry-run check.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Invalid(#[from] FieldError),
    #[error(transparent)]
    Embedding(#[from] EmbedError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("reference ID {reference_id} already exists in the store")]
    ReferenceIdCollision { reference_id: String },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Invalid(_) => ErrorCode::InvalidField,
            Self::Embedding(EmbedError::Unavailable(_)) => ErrorCode::EmbeddingUnavailable,
            Self::Embedding(EmbedError::Dimension { .. }) => {
                ErrorCode::EmbeddingDimensionMismatch
            }
            Self::Lock(lock) => lock.code(),
            Self::ReferenceIdCollision { .. } => ErrorCode::ReferenceIdCollision,
            Self::Store(_) => ErrorCode::InternalUnexpected,
        }
    }
}

/// The best-matching existing complaint, as shown to a submitter whose
/// submission was flagged. All scores are percentages in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub reference_id: String,
    pub title: String,
    pub category: String,
    pub location: String,
    pub status: griev_core::model::Status,
    pub created_at_us: i64,
    pub similarity_score: f64,
    pub reasoning: String,
    pub factor_scores: FactorPercents,
}

/// Per-factor scores in percent, for display and audit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorPercents {
    pub text_similarity: f64,
    pub location_match: f64,
    pub category_match: f64,
}

impl FactorPercents {
    fn from_factors(factors: &FactorScores) -> Self {
        Self {
            text_similarity: factors.text * 100.0,
            location_match: factors.location * 100.0,
            category_match: factors.category * 100.0,
        }
    }
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The complaint was persisted with a fresh reference ID.
    Accepted(Complaint),
    /// The submission was flagged as a duplicate and not persisted.
    Flagged(DuplicateMatch),
}

/// Result of a dry-run check: what `submit` would decide, with no writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub is_duplicate: bool,
    pub candidates_considered: usize,
    pub best_match: Option<DuplicateMatch>,
}

/// Ties the pipeline stages together around one project's configuration.
pub struct DetectionEngine {
    config: ProjectConfig,
    provider: Box<dyn Embedder>,
    location_scorer: Box<dyn LocationScorer>,
}

impl DetectionEngine {
    /// Build an engine with the configured embedding backend.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured backend cannot be constructed.
    pub fn new(config: ProjectConfig) -> Result<Self, EngineError> {
        let provider = embed::provider_from_config(&config.embedding)?;
        Ok(Self::with_provider(config, provider))
    }

    /// Build an engine around an explicit embedding backend.
    #[must_use]
    pub fn with_provider(config: ProjectConfig, provider: Box<dyn Embedder>) -> Self {
        Self {
            config,
            provider,
            location_scorer: Box::new(TextualLocationScorer),
        }
    }

    /// Run full detection and commit the outcome.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when validation, embedding, locking, or a
    /// store write fails. On error nothing has been persisted.
    pub fn submit(
        &self,
        conn: &mut Connection,
        project_root: &Path,
        input: &NewComplaint,
    ) -> Result<SubmitOutcome, EngineError> {
        input.validate()?;
        let embedding = self.embed_input(input)?;

        // Embedding is CPU-bound and store-independent, so it stays outside
        // the critical section. Everything from retrieval to commit runs
        // under the category partition lock.
        let lock =
            PartitionLock::acquire_category(project_root, input.category, DEFAULT_LOCK_TIMEOUT)?;
        debug!(lock = %lock.path().display(), "category partition locked");

        let result = self.detect_and_commit(conn, input, &embedding);
        lock.release();
        result
    }

    /// Dry-run detection: same scoring as [`Self::submit`], no lock taken,
    /// nothing written, no audit row.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when validation, embedding, or a store
    /// read fails.
    pub fn check(
        &self,
        conn: &Connection,
        input: &NewComplaint,
    ) -> Result<CheckReport, EngineError> {
        input.validate()?;
        let embedding = self.embed_input(input)?;
        self.check_dimension(conn)?;

        let candidates = self.retrieve(conn, input, &embedding)?;
        let candidates_considered = candidates.len();
        let scored = self.score_all(input, &embedding, candidates);
        let best = policy::select_best(&scored);

        let is_duplicate = best.is_some_and(|best| {
            policy::classify(best.composite, self.config.detection.threshold)
                == Decision::Duplicate
        });
        let best_match = best.map(|best| self.to_match(best, is_duplicate));

        Ok(CheckReport {
            is_duplicate,
            candidates_considered,
            best_match,
        })
    }

    fn detect_and_commit(
        &self,
        conn: &mut Connection,
        input: &NewComplaint,
        embedding: &[f32],
    ) -> Result<SubmitOutcome, EngineError> {
        self.verify_dimension(conn)?;

        let candidates = self.retrieve(conn, input, embedding)?;
        let scored = timed("detect.score", || {
            self.score_all(input, embedding, candidates)
        });
        let best = policy::select_best(&scored);

        if let Some(best) = best
            && policy::classify(best.composite, self.config.detection.threshold)
                == Decision::Duplicate
        {
            info!(
                matched = %best.candidate.reference_id,
                composite = best.composite,
                "submission flagged as duplicate"
            );
            let duplicate = self.to_match(best, true);
            self.write_audit(conn, input, best, true);
            return Ok(SubmitOutcome::Flagged(duplicate));
        }

        let complaint = timed("detect.persist", || self.persist(conn, input, embedding))?;
        info!(reference_id = %complaint.reference_id, "complaint accepted");

        if let Some(best) = best
            && best.composite >= self.config.detection.audit_floor
        {
            self.write_audit(conn, input, best, false);
        }

        Ok(SubmitOutcome::Accepted(complaint))
    }

    fn embed_input(&self, input: &NewComplaint) -> Result<Vec<f32>, EngineError> {
        let text = embed::embedded_text(&input.title, &input.description);
        let embedding = timed("detect.embed", || self.provider.embed(&text))?;
        if embedding.len() != self.provider.dimension() {
            return Err(EmbedError::Dimension {
                expected: self.provider.dimension(),
                got: embedding.len(),
            }
            .into());
        }
        Ok(embedding)
    }

    /// Pin the store's embedding dimension on first contact and refuse to
    /// mix vectors of different widths afterwards.
    fn verify_dimension(&self, conn: &Connection) -> Result<(), EngineError> {
        let pinned = query::pin_embedding_dim(conn, self.provider.dimension())?;
        if pinned != self.provider.dimension() {
            return Err(EmbedError::Dimension {
                expected: pinned,
                got: self.provider.dimension(),
            }
            .into());
        }
        Ok(())
    }

    /// Read-only dimension check for dry runs. An unpinned store stays
    /// unpinned; only [`Self::submit`] claims it.
    fn check_dimension(&self, conn: &Connection) -> Result<(), EngineError> {
        let pinned = query::embedding_dim(conn)?;
        if pinned != 0 && pinned != self.provider.dimension() {
            return Err(EmbedError::Dimension {
                expected: pinned,
                got: self.provider.dimension(),
            }
            .into());
        }
        Ok(())
    }

    fn retrieve(
        &self,
        conn: &Connection,
        input: &NewComplaint,
        embedding: &[f32],
    ) -> Result<Vec<Candidate>, EngineError> {
        let candidates = timed("detect.candidates", || {
            candidates::retrieve(
                conn,
                embedding,
                input.category,
                self.config.detection.candidate_limit,
            )
        })?;
        debug!(count = candidates.len(), "candidates retrieved");
        Ok(candidates)
    }

    fn score_all(
        &self,
        input: &NewComplaint,
        embedding: &[f32],
        candidates: Vec<Candidate>,
    ) -> Vec<ScoredCandidate> {
        candidates
            .into_iter()
            .map(|candidate| {
                let factors = FactorScores {
                    text: score::text_similarity(embedding, &candidate.embedding),
                    location: self
                        .location_scorer
                        .score(&input.location, &candidate.location),
                    category: score::category_match(
                        input.category.as_str(),
                        &candidate.category,
                    ),
                };
                let composite = score::composite::composite_percent(&factors, &self.config.weights);
                ScoredCandidate {
                    candidate,
                    factors,
                    composite,
                }
            })
            .collect()
    }

    fn persist(
        &self,
        conn: &mut Connection,
        input: &NewComplaint,
        embedding: &[f32],
    ) -> Result<Complaint, EngineError> {
        let now_us = db::now_us();
        let embedding_json =
            embed::encode_embedding_json(embedding).map_err(anyhow::Error::from)?;
        let text = embed::embedded_text(&input.title, &input.description);
        let content_hash = embed::content_hash_hex(&text);

        let tx = conn
            .transaction()
            .map_err(|error| EngineError::Store(error.into()))?;

        let reference_id =
            refid::allocate(&tx, db::utc_year()).map_err(|error| EngineError::Store(error.into()))?;

        let id = match query::insert_complaint(&tx, input, &reference_id, now_us) {
            Ok(id) => id,
            Err(error) if refid::is_unique_violation(&error) => {
                return Err(EngineError::ReferenceIdCollision { reference_id });
            }
            Err(error) => return Err(EngineError::Store(error.into())),
        };

        query::insert_embedding(&tx, id, &content_hash, &embedding_json)
            .map_err(|error| EngineError::Store(error.into()))?;
        tx.commit().map_err(|error| EngineError::Store(error.into()))?;

        query::get_complaint(conn, id)?
            .ok_or_else(|| EngineError::Store(anyhow::anyhow!("committed complaint {id} missing")))
    }

    /// Best-effort audit write. The submission outcome never depends on it.
    fn write_audit(
        &self,
        conn: &Connection,
        input: &NewComplaint,
        best: &ScoredCandidate,
        flagged: bool,
    ) {
        let percents = FactorPercents::from_factors(&best.factors);
        let record = query::NewAuditRecord {
            original_complaint_id: best.candidate.id,
            attempted_title: input.title.clone(),
            attempted_description: input.description.clone(),
            attempted_by: input.submitter.clone(),
            similarity_score: best.composite,
            text_score: percents.text_similarity,
            location_score: percents.location_match,
            category_score: percents.category_match,
            flagged,
            reasoning: policy::build_reasoning(best, flagged),
        };

        if let Err(audit_error) = query::insert_audit(conn, &record, db::now_us()) {
            error!(
                code = %ErrorCode::AuditLogFailure,
                "duplicate audit write failed: {audit_error:#}"
            );
        }
    }

    fn to_match(&self, best: &ScoredCandidate, flagged: bool) -> DuplicateMatch {
        DuplicateMatch {
            reference_id: best.candidate.reference_id.clone(),
            title: best.candidate.title.clone(),
            category: best.candidate.category.clone(),
            location: best.candidate.location.clone(),
            status: best.candidate.status,
            created_at_us: best.candidate.created_at_us,
            similarity_score: best.composite,
            reasoning: policy::build_reasoning(best, flagged),
            factor_scores: FactorPercents::from_factors(&best.factors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use griev_core::config::DetectionConfig;
    use griev_core::db::open_store;
    use griev_core::model::{Category, Priority, Status};
    use tempfile::TempDir;

    fn test_engine(config: ProjectConfig) -> DetectionEngine {
        DetectionEngine::new(config).expect("hash engine")
    }

    fn open_project() -> (TempDir, Connection) {
        let dir = tempfile::tempdir().expect("temp dir");
        let conn = open_store(&db::store_path(dir.path())).expect("open store");
        (dir, conn)
    }

    fn streetlight() -> NewComplaint {
        NewComplaint {
            title: "Broken streetlight on Main Street".to_string(),
            description: "The streetlight at the corner of Main Street and 2nd has been \
                          dark every night for a week."
                .to_string(),
            category: Category::Electricity,
            location: "Main Street".to_string(),
            priority: Priority::Medium,
            submitter: "citizen-1".to_string(),
        }
    }

    fn unrelated() -> NewComplaint {
        NewComplaint {
            title: "Garbage pickup missed on Route 9".to_string(),
            description: "The collection truck skipped our entire block on Tuesday and the \
                          bins are overflowing."
                .to_string(),
            category: Category::SanitationWaste,
            location: "Riverside Quarter".to_string(),
            priority: Priority::Medium,
            submitter: "citizen-2".to_string(),
        }
    }

    fn complaint_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM complaints", [], |row| row.get(0))
            .expect("count")
    }

    fn audit_rows(conn: &Connection) -> Vec<(bool, f64)> {
        let mut stmt = conn
            .prepare("SELECT flagged, similarity_score FROM duplicate_audit ORDER BY audit_id")
            .expect("prepare");
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)? != 0, row.get::<_, f64>(1)?))
            })
            .expect("query");
        rows.collect::<rusqlite::Result<Vec<_>>>().expect("rows")
    }

    // -----------------------------------------------------------------------
    // Accept / flag behavior
    // -----------------------------------------------------------------------

    #[test]
    fn first_submission_is_accepted_with_reference_id() {
        let engine = test_engine(ProjectConfig::default());
        let (dir, mut conn) = open_project();

        let outcome = engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("submit");
        match outcome {
            SubmitOutcome::Accepted(complaint) => {
                assert!(complaint.reference_id.starts_with("GRV-"));
                assert_eq!(complaint.status, Status::Registered);
            }
            SubmitOutcome::Flagged(other) => panic!("unexpected flag: {other:?}"),
        }
        assert_eq!(complaint_count(&conn), 1);
    }

    #[test]
    fn identical_resubmission_is_flagged_and_not_persisted() {
        let engine = test_engine(ProjectConfig::default());
        let (dir, mut conn) = open_project();

        engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("first submit");
        let outcome = engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("second submit");

        match outcome {
            SubmitOutcome::Flagged(found) => {
                assert!(found.similarity_score >= 75.0);
                assert!((found.factor_scores.category_match - 100.0).abs() < 1e-9);
                assert!((found.factor_scores.location_match - 100.0).abs() < 1e-9);
                assert!(found.reasoning.contains(&found.reference_id));
            }
            SubmitOutcome::Accepted(other) => panic!("unexpected accept: {other:?}"),
        }
        assert_eq!(complaint_count(&conn), 1);
    }

    #[test]
    fn unrelated_submission_is_accepted_with_low_composite() {
        let engine = test_engine(ProjectConfig::default());
        let (dir, mut conn) = open_project();

        engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("first submit");
        let report = engine.check(&conn, &unrelated()).expect("check");
        assert!(!report.is_duplicate);
        if let Some(best) = &report.best_match {
            assert!(
                best.similarity_score < 40.0,
                "unrelated pair scored {}",
                best.similarity_score
            );
        }

        let outcome = engine
            .submit(&mut conn, dir.path(), &unrelated())
            .expect("second submit");
        assert!(matches!(outcome, SubmitOutcome::Accepted(_)));
        assert_eq!(complaint_count(&conn), 2);
    }

    #[test]
    fn rejected_original_no_longer_blocks_resubmission() {
        let engine = test_engine(ProjectConfig::default());
        let (dir, mut conn) = open_project();

        let first = engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("first submit");
        let SubmitOutcome::Accepted(original) = first else {
            panic!("first submission should be accepted");
        };

        query::set_status(&conn, original.id, Status::Rejected, db::now_us()).expect("reject");

        let outcome = engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("resubmit");
        assert!(matches!(outcome, SubmitOutcome::Accepted(_)));
        assert_eq!(complaint_count(&conn), 2);
    }

    // -----------------------------------------------------------------------
    // Audit trail
    // -----------------------------------------------------------------------

    #[test]
    fn flagged_submission_writes_a_flagged_audit_row() {
        let engine = test_engine(ProjectConfig::default());
        let (dir, mut conn) = open_project();

        engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("first submit");
        engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("second submit");

        let rows = audit_rows(&conn);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].0, "row should be flagged");
        assert!(rows[0].1 >= 75.0);
    }

    #[test]
    fn accepted_near_miss_writes_unflagged_audit_above_floor() {
        let config = ProjectConfig {
            detection: DetectionConfig {
                audit_floor: 10.0,
                ..DetectionConfig::default()
            },
            ..ProjectConfig::default()
        };
        let engine = test_engine(config);
        let (dir, mut conn) = open_project();

        engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("first submit");
        engine
            .submit(&mut conn, dir.path(), &unrelated())
            .expect("second submit");

        let rows = audit_rows(&conn);
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].0, "near-miss row should not be flagged");
        assert!(rows[0].1 < 75.0);
    }

    #[test]
    fn audit_floor_suppresses_weak_matches() {
        let config = ProjectConfig {
            detection: DetectionConfig {
                audit_floor: 60.0,
                ..DetectionConfig::default()
            },
            ..ProjectConfig::default()
        };
        let engine = test_engine(config);
        let (dir, mut conn) = open_project();

        engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("first submit");
        engine
            .submit(&mut conn, dir.path(), &unrelated())
            .expect("second submit");

        assert!(audit_rows(&conn).is_empty());
    }

    // -----------------------------------------------------------------------
    // Failure modes
    // -----------------------------------------------------------------------

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Unavailable("backend offline".to_string()))
        }

        fn dimension(&self) -> usize {
            384
        }
    }

    #[test]
    fn failing_provider_aborts_without_persisting() {
        let engine =
            DetectionEngine::with_provider(ProjectConfig::default(), Box::new(FailingEmbedder));
        let (dir, mut conn) = open_project();

        let error = engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect_err("submit should fail");
        assert_eq!(error.code(), ErrorCode::EmbeddingUnavailable);
        assert_eq!(complaint_count(&conn), 0);
        assert!(audit_rows(&conn).is_empty());
    }

    #[test]
    fn dimension_mismatch_with_pinned_store_is_rejected() {
        let (dir, mut conn) = open_project();

        let engine_384 = test_engine(ProjectConfig::default());
        engine_384
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("first submit");

        let mut narrow = ProjectConfig::default();
        narrow.embedding.dimension = 128;
        let engine_128 = test_engine(narrow);

        let error = engine_128
            .submit(&mut conn, dir.path(), &unrelated())
            .expect_err("mismatched dimension should fail");
        assert_eq!(error.code(), ErrorCode::EmbeddingDimensionMismatch);
        assert_eq!(complaint_count(&conn), 1);
    }

    #[test]
    fn invalid_input_fails_before_any_store_work() {
        let engine = test_engine(ProjectConfig::default());
        let (dir, mut conn) = open_project();

        let mut input = streetlight();
        input.title = "Bad".to_string();
        let error = engine
            .submit(&mut conn, dir.path(), &input)
            .expect_err("short title should fail");
        assert_eq!(error.code(), ErrorCode::InvalidField);
        assert_eq!(complaint_count(&conn), 0);
    }

    #[test]
    fn check_is_side_effect_free() {
        let engine = test_engine(ProjectConfig::default());
        let (dir, mut conn) = open_project();

        engine
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("submit");

        let report = engine.check(&conn, &streetlight()).expect("check");
        assert!(report.is_duplicate);
        assert_eq!(report.candidates_considered, 1);
        assert!(report.best_match.is_some());

        assert_eq!(complaint_count(&conn), 1);
        assert!(audit_rows(&conn).is_empty());
    }

    #[test]
    fn check_on_a_fresh_store_leaves_the_dimension_unpinned() {
        let engine = test_engine(ProjectConfig::default());
        let (dir, mut conn) = open_project();

        let report = engine.check(&conn, &streetlight()).expect("check");
        assert!(!report.is_duplicate);
        assert_eq!(query::embedding_dim(&conn).expect("dim"), 0);

        // A differently sized backend can still claim the store afterwards.
        let mut narrow = ProjectConfig::default();
        narrow.embedding.dimension = 128;
        let engine_128 = test_engine(narrow);
        engine_128
            .submit(&mut conn, dir.path(), &streetlight())
            .expect("submit");
        assert_eq!(query::embedding_dim(&conn).expect("dim"), 128);

        let error = engine
            .check(&conn, &unrelated())
            .expect_err("pinned store should reject the wider backend");
        assert_eq!(error.code(), ErrorCode::EmbeddingDimensionMismatch);
    }
}
