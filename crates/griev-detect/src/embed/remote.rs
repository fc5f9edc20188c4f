//! HTTP embedding backend (`remote-embed` feature).
//!
//! POSTs `{"text": "..."}` to the configured endpoint and expects
//! `{"embedding": [f32, ...]}` back. Every transport or shape problem maps
//! to [`EmbedError::Unavailable`] so the submission aborts cleanly.

use super::{EmbedError, Embedder};
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Embedding backend backed by an HTTP service.
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    url: String,
    dimension: usize,
    agent: ureq::Agent,
}

impl RemoteEmbedder {
    #[must_use]
    pub fn new(url: String, dimension: usize, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self {
            url,
            dimension,
            agent,
        }
    }
}

impl Embedder for RemoteEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let response = self
            .agent
            .post(&self.url)
            .send_json(ureq::json!({ "text": text }))
            .map_err(|error| {
                EmbedError::Unavailable(format!("request to {} failed: {error}", self.url))
            })?;

        let parsed: EmbedResponse = response.into_json().map_err(|error| {
            EmbedError::Unavailable(format!("malformed response from {}: {error}", self.url))
        })?;

        if parsed.embedding.len() != self.dimension {
            return Err(EmbedError::Dimension {
                expected: self.dimension,
                got: parsed.embedding.len(),
            });
        }

        Ok(parsed.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
