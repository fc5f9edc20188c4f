//! E2E tests for the intake surface: submit, check, and the JSON contract.
//!
//! Each test runs `grv` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the grv binary, rooted in `dir`.
fn grv_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("grv"));
    cmd.current_dir(dir);
    // Provide a default submitter so mutating commands don't fail
    cmd.env("GRV_SUBMITTER", "test-desk");
    // Suppress tracing output that goes to stderr
    cmd.env("GRV_LOG", "error");
    cmd
}

fn init_project(dir: &Path) {
    grv_cmd(dir).args(["init"]).assert().success();
}

const STREETLIGHT_DESC: &str = "The streetlight at the corner of Main Street and 2nd Avenue \
     has been dark every night for a week.";

fn submit_json(dir: &Path, title: &str, description: &str, category: &str, location: &str) -> Value {
    let output = grv_cmd(dir)
        .args([
            "submit",
            "--title",
            title,
            "--description",
            description,
            "--category",
            category,
            "--location",
            location,
            "--json",
        ])
        .output()
        .expect("submit should not crash");
    assert!(
        output.status.success(),
        "submit failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("submit --json should produce valid JSON")
}

fn submit_streetlight(dir: &Path) -> Value {
    submit_json(
        dir,
        "Broken streetlight on Main Street",
        STREETLIGHT_DESC,
        "Electricity",
        "Main Street",
    )
}

fn list_total(dir: &Path) -> u64 {
    let output = grv_cmd(dir)
        .args(["list", "--json"])
        .output()
        .expect("list should not crash");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    json["total"].as_u64().expect("total field")
}

fn assert_reference_id_shape(reference_id: &str) {
    let parts: Vec<&str> = reference_id.split('-').collect();
    assert_eq!(parts.len(), 3, "bad reference ID: {reference_id}");
    assert_eq!(parts[0], "GRV");
    assert_eq!(parts[1].len(), 4);
    assert_eq!(parts[2].len(), 5);
    assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
}

// ===========================================================================
// Accepting new complaints
// ===========================================================================

#[test]
fn first_submission_is_accepted_with_reference_id() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let json = submit_streetlight(dir.path());
    assert_eq!(json["is_duplicate"], Value::Bool(false));

    let complaint = &json["complaint"];
    let reference_id = complaint["reference_id"].as_str().expect("reference_id");
    assert_reference_id_shape(reference_id);
    assert_eq!(complaint["status"], "registered");
    assert_eq!(complaint["category"], "Electricity");
    assert_eq!(complaint["submitter"], "test-desk");
    assert!(
        complaint["created_at"].as_str().is_some(),
        "created_at should be RFC 3339, got {complaint:?}"
    );
    assert!(json.get("duplicate_match").is_none());
}

#[test]
fn human_output_names_the_reference_id() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    grv_cmd(dir.path())
        .args([
            "submit",
            "--title",
            "Broken streetlight on Main Street",
            "--description",
            STREETLIGHT_DESC,
            "--category",
            "Electricity",
            "--location",
            "Main Street",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("complaint registered: GRV-"));
}

#[test]
fn distinct_complaints_get_sequential_reference_ids() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let first = submit_streetlight(dir.path());
    let second = submit_json(
        dir.path(),
        "Deep pothole near the roundabout",
        "A wide pothole has opened up at the roundabout exit toward the market \
         and cars are swerving around it.",
        "roads",
        "Ring Road roundabout",
    );

    assert_eq!(second["is_duplicate"], Value::Bool(false));
    let first_ref = first["complaint"]["reference_id"].as_str().unwrap();
    let second_ref = second["complaint"]["reference_id"].as_str().unwrap();
    assert_ne!(first_ref, second_ref);
    assert!(first_ref.ends_with("00001"));
    assert!(second_ref.ends_with("00002"));
    // Category alias parsed to the canonical label.
    assert_eq!(second["complaint"]["category"], "Road & Infrastructure");
    assert_eq!(list_total(dir.path()), 2);
}

// ===========================================================================
// Flagging duplicates
// ===========================================================================

#[test]
fn near_identical_resubmission_is_flagged() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let first = submit_streetlight(dir.path());
    let original_ref = first["complaint"]["reference_id"].as_str().unwrap().to_string();

    // Same problem reported by someone else in slightly different words.
    let json = submit_json(
        dir.path(),
        "Streetlight broken on Main Street",
        "The streetlight at the corner of Main Street and 2nd Avenue has been \
         dark every single night for a week now.",
        "Electricity",
        "Main Street",
    );

    assert_eq!(json["is_duplicate"], Value::Bool(true));
    assert!(json.get("complaint").is_none());

    let found = &json["duplicate_match"];
    assert_eq!(found["reference_id"], Value::String(original_ref));
    assert_eq!(found["status"], "registered");

    let similarity = found["similarity_score"].as_f64().expect("similarity_score");
    assert!(similarity >= 75.0, "similarity was {similarity}");

    let factors = &found["factor_scores"];
    assert_eq!(factors["category_match"].as_f64(), Some(100.0));
    assert!(factors["location_match"].as_f64().expect("location_match") >= 60.0);
    assert!(factors["text_similarity"].as_f64().expect("text_similarity") > 50.0);

    let reasoning = found["reasoning"].as_str().expect("reasoning");
    assert!(reasoning.contains("similar to GRV-"), "reasoning: {reasoning}");

    // The flagged submission must not be persisted.
    assert_eq!(list_total(dir.path()), 1);
}

#[test]
fn unrelated_complaint_is_not_flagged() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    submit_streetlight(dir.path());
    let json = submit_json(
        dir.path(),
        "Garbage pickup missed on Route 9",
        "The collection truck skipped our entire block on Tuesday and the bins \
         are overflowing onto the pavement.",
        "Sanitation & Waste",
        "Riverside Quarter",
    );

    assert_eq!(json["is_duplicate"], Value::Bool(false));
    assert_eq!(list_total(dir.path()), 2);
}

// ===========================================================================
// Dry-run check
// ===========================================================================

#[test]
fn check_reports_duplicates_without_side_effects() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    submit_streetlight(dir.path());

    let output = grv_cmd(dir.path())
        .args([
            "check",
            "--title",
            "Broken streetlight on Main Street",
            "--description",
            STREETLIGHT_DESC,
            "--category",
            "Electricity",
            "--location",
            "Main Street",
            "--json",
        ])
        .output()
        .expect("check should not crash");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["is_duplicate"], Value::Bool(true));
    assert_eq!(json["candidates_considered"].as_u64(), Some(1));
    assert!(json["best_match"]["similarity_score"].as_f64().unwrap() >= 75.0);

    // No complaint, no audit row.
    assert_eq!(list_total(dir.path()), 1);
    let audit = grv_cmd(dir.path())
        .args(["duplicates", "--json"])
        .output()
        .expect("duplicates should not crash");
    let audit_json: Value = serde_json::from_slice(&audit.stdout).expect("valid JSON");
    assert_eq!(audit_json["total"].as_u64(), Some(0));
}

// ===========================================================================
// Error contract
// ===========================================================================

#[test]
fn submit_without_identity_fails_with_code() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let output = grv_cmd(dir.path())
        .env_remove("GRV_SUBMITTER")
        .env_remove("USER")
        .args([
            "submit",
            "--title",
            "Broken streetlight on Main Street",
            "--description",
            STREETLIGHT_DESC,
            "--category",
            "Electricity",
            "--location",
            "Main Street",
            "--json",
        ])
        .output()
        .expect("submit should not crash");
    assert!(!output.status.success());

    let json: Value = serde_json::from_slice(&output.stderr).expect("error JSON on stderr");
    assert_eq!(json["error"]["error_code"], "E2005");
    assert!(
        json["error"]["suggestion"]
            .as_str()
            .expect("suggestion")
            .contains("GRV_SUBMITTER")
    );
}

#[test]
fn invalid_category_is_rejected_with_code() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let output = grv_cmd(dir.path())
        .args([
            "submit",
            "--title",
            "Broken streetlight on Main Street",
            "--description",
            STREETLIGHT_DESC,
            "--category",
            "plumbing",
            "--location",
            "Main Street",
            "--json",
        ])
        .output()
        .expect("submit should not crash");
    assert!(!output.status.success());

    let json: Value = serde_json::from_slice(&output.stderr).expect("error JSON on stderr");
    assert_eq!(json["error"]["error_code"], "E2003");
}

#[test]
fn short_title_is_rejected_before_detection() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    let output = grv_cmd(dir.path())
        .args([
            "submit",
            "--title",
            "Bad",
            "--description",
            STREETLIGHT_DESC,
            "--category",
            "Electricity",
            "--location",
            "Main Street",
            "--json",
        ])
        .output()
        .expect("submit should not crash");
    assert!(!output.status.success());

    let json: Value = serde_json::from_slice(&output.stderr).expect("error JSON on stderr");
    assert_eq!(json["error"]["error_code"], "E2004");
    assert_eq!(list_total(dir.path()), 0);
}

#[test]
fn submit_before_init_reports_not_initialized() {
    let dir = TempDir::new().unwrap();

    let output = grv_cmd(dir.path())
        .args([
            "submit",
            "--title",
            "Broken streetlight on Main Street",
            "--description",
            STREETLIGHT_DESC,
            "--category",
            "Electricity",
            "--location",
            "Main Street",
            "--json",
        ])
        .output()
        .expect("submit should not crash");
    assert!(!output.status.success());

    let json: Value = serde_json::from_slice(&output.stderr).expect("error JSON on stderr");
    assert_eq!(json["error"]["error_code"], "E1001");
}
