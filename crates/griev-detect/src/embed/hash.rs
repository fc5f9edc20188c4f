//! Deterministic feature-hashed bag-of-words embedding.
//!
//! Tokens and adjacent-token bigrams are hashed into a fixed number of
//! buckets with a sign bit, then the vector is L2-normalized. The same text
//! always produces the same vector, on every machine, with no model files
//! and no network. Quality is far below a learned model, but it is stable
//! and honest: similar wording genuinely yields nearby vectors.

use super::{EmbedError, Embedder};
use sha2::{Digest, Sha256};

/// Feature-hash embedding backend.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn accumulate(&self, feature: &str, vector: &mut [f32]) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(raw);

        let bucket = usize::try_from(hash % self.dimension as u64).unwrap_or(0);
        let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0.0_f32; self.dimension];
        let tokens = tokenize(text);

        for token in &tokens {
            self.accumulate(token, &mut vector);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&format!("{} {}", pair[0], pair[1]), &mut vector);
        }

        let norm = vector.iter().map(|v| f64::from(*v) * f64::from(*v)).sum::<f64>();
        if norm > 0.0 {
            #[allow(clippy::cast_possible_truncation)]
            let inv = (1.0 / norm.sqrt()) as f32;
            for value in &mut vector {
                *value *= inv;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
