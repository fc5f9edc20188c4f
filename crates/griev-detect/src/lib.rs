//! Duplicate detection for complaint submissions.
//!
//! The pipeline is: embed the submission text, retrieve candidate complaints
//! from the store, score each candidate on three factors (text, location,
//! category), combine them into a composite percentage, and decide whether
//! the submission is new or a duplicate of its best-matching candidate.
//!
//! [`engine::DetectionEngine`] ties the stages together and owns the commit
//! protocol (partition lock, reference ID allocation, audit trail).

pub mod candidates;
pub mod embed;
pub mod engine;
pub mod policy;
pub mod score;
