//! Embedding backends.
//!
//! All backends implement [`Embedder`]. The default is the deterministic
//! feature-hash backend in [`hash`], which needs no network and no model
//! files; the optional `remote-embed` feature adds an HTTP backend.

pub mod hash;
#[cfg(feature = "remote-embed")]
pub mod remote;

use griev_core::config::{EmbeddingConfig, EmbeddingProvider};
use sha2::{Digest, Sha256};

/// Why an embedding could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The backend could not produce a vector at all. A submission hitting
    /// this is aborted, never persisted with a placeholder vector.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
    /// The backend produced a vector of the wrong width for this store.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
}

/// Produces fixed-width embedding vectors for complaint text.
pub trait Embedder: Send + Sync {
    /// Embed one piece of text.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Unavailable`] when no vector can be produced.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Width of the vectors this backend produces.
    fn dimension(&self) -> usize;
}

/// The text that gets embedded for a complaint: title and description,
/// nothing else. Location and category are scored separately.
#[must_use]
pub fn embedded_text(title: &str, description: &str) -> String {
    format!("{} {}", title.trim(), description.trim())
}

/// Hex SHA-256 of the embedded text, stored next to the vector so a future
/// re-embedding pass can find stale rows.
#[must_use]
pub fn content_hash_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Serialize a vector to the JSON array form stored in
/// `complaint_embeddings.embedding_json` (also what `vec_f32()` parses).
///
/// # Errors
///
/// Returns an error only if JSON serialization itself fails.
pub fn encode_embedding_json(embedding: &[f32]) -> serde_json::Result<String> {
    serde_json::to_string(embedding)
}

/// Parse a stored embedding back into a vector.
///
/// # Errors
///
/// Returns an error if the stored text is not a JSON array of numbers.
pub fn decode_embedding_json(raw: &str) -> serde_json::Result<Vec<f32>> {
    serde_json::from_str(raw)
}

/// Build the configured embedding backend.
///
/// # Errors
///
/// Returns [`EmbedError::Unavailable`] when the config selects the remote
/// backend but this binary was built without the `remote-embed` feature, or
/// when the remote config is incomplete.
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>, EmbedError> {
    match config.provider {
        EmbeddingProvider::Hash => Ok(Box::new(hash::HashEmbedder::new(config.dimension))),
        #[cfg(feature = "remote-embed")]
        EmbeddingProvider::Remote => {
            let url = config.url.clone().ok_or_else(|| {
                EmbedError::Unavailable("embedding.url is not set for the remote provider".into())
            })?;
            Ok(Box::new(remote::RemoteEmbedder::new(
                url,
                config.dimension,
                std::time::Duration::from_secs(config.timeout_secs),
            )))
        }
        #[cfg(not(feature = "remote-embed"))]
        EmbeddingProvider::Remote => Err(EmbedError::Unavailable(
            "this binary was built without the remote-embed feature; \
             set embedding.provider = \"hash\" or rebuild with --features remote-embed"
                .into(),
        )),
    }
}
