//! Canonical SQLite schema for the grievance store.
//!
//! The schema is normalized for queryability and auditability:
//! - `complaints` keeps the registered aggregate for each grievance
//! - `complaint_embeddings` stores one vector per complaint, written in the
//!   same transaction as the complaint row
//! - `duplicate_audit` preserves the factor breakdown of every detection
//!   that had at least one candidate to compare against
//! - `complaint_comments` holds the human and system timeline
//! - `ref_sequences` backs per-year reference ID allocation
//! - `engine_meta` tracks schema version and the pinned embedding dimension

/// Migration v1: core normalized tables plus engine metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS complaints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT NOT NULL,
    category TEXT NOT NULL CHECK (category IN (
        'Electricity', 'Water Supply', 'Road & Infrastructure',
        'Sanitation & Waste', 'Public Safety', 'Public Transport',
        'Parks & Recreation', 'Other'
    )),
    location TEXT NOT NULL CHECK (length(trim(location)) > 0),
    priority TEXT NOT NULL DEFAULT 'medium'
        CHECK (priority IN ('low', 'medium', 'high')),
    status TEXT NOT NULL DEFAULT 'registered'
        CHECK (status IN (
            'registered', 'verified', 'assigned',
            'in_progress', 'resolved', 'rejected'
        )),
    submitter TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (reference_id LIKE 'GRV-%')
);

CREATE TABLE IF NOT EXISTS complaint_embeddings (
    complaint_id INTEGER PRIMARY KEY
        REFERENCES complaints(id) ON DELETE CASCADE,
    content_hash TEXT NOT NULL,
    embedding_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS duplicate_audit (
    audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_complaint_id INTEGER NOT NULL
        REFERENCES complaints(id) ON DELETE CASCADE,
    attempted_title TEXT NOT NULL,
    attempted_description TEXT NOT NULL,
    attempted_by TEXT NOT NULL,
    similarity_score REAL NOT NULL,
    text_score REAL NOT NULL,
    location_score REAL NOT NULL,
    category_score REAL NOT NULL,
    flagged INTEGER NOT NULL CHECK (flagged IN (0, 1)),
    reasoning TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS complaint_comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    complaint_id INTEGER NOT NULL
        REFERENCES complaints(id) ON DELETE CASCADE,
    author TEXT NOT NULL,
    body TEXT NOT NULL,
    is_system INTEGER NOT NULL DEFAULT 0 CHECK (is_system IN (0, 1)),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ref_sequences (
    year INTEGER PRIMARY KEY,
    next_seq INTEGER NOT NULL CHECK (next_seq >= 1)
);

CREATE TABLE IF NOT EXISTS engine_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    embedding_dim INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO engine_meta (id, schema_version, embedding_dim, created_at_us)
VALUES (1, 1, 0, 0);
";

/// Migration v2: read-path indexes for retrieval, listing, and audit pages.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_complaints_category_status
    ON complaints(category, status);

CREATE INDEX IF NOT EXISTS idx_complaints_status_created
    ON complaints(status, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_complaints_submitter_created
    ON complaints(submitter, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_complaints_created
    ON complaints(created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_duplicate_audit_created
    ON duplicate_audit(created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_duplicate_audit_original
    ON duplicate_audit(original_complaint_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_complaint_comments_complaint_created
    ON complaint_comments(complaint_id, created_at_us);

UPDATE engine_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by the retrieval/list/audit query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_complaints_category_status",
    "idx_complaints_status_created",
    "idx_complaints_submitter_created",
    "idx_complaints_created",
    "idx_duplicate_audit_created",
    "idx_duplicate_audit_original",
    "idx_complaint_comments_complaint_created",
];
