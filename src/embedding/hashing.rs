//! Model-free embedder based on signed feature hashing.

use sha2::{Digest, Sha256};

use super::text::tokenize;
use super::{Embedder, EmbeddingError};
use crate::math;

/// Relative weight of word bigrams against unigrams
const BIGRAM_WEIGHT: f32 = 0.5;

/// Hashes word unigrams and bigrams into a fixed number of signed buckets.
///
/// Texts sharing vocabulary land close together under cosine similarity,
/// which is enough for content matching without a neural model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn accumulate(&self, out: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        out[bucket] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimensions];

        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, &bigram, BIGRAM_WEIGHT);
        }

        math::normalize_in_place(&mut vector);
        if math::is_zero(&vector) {
            return Err(EmbeddingError::Degenerate);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "hashing-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{cosine_similarity, l2_norm};

    #[test]
    fn test_embedding_is_normalized_and_sized() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed("a quiet story about loss").unwrap();
        assert_eq!(v.len(), 64);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embedding_is_deterministic() {
        let embedder = HashingEmbedder::new(384);
        assert_eq!(
            embedder.embed("Heartbreaking drama").unwrap(),
            embedder.embed("Heartbreaking drama").unwrap()
        );
        // case and punctuation do not matter
        assert_eq!(
            embedder.embed("heartbreaking, DRAMA!").unwrap(),
            embedder.embed("Heartbreaking drama").unwrap()
        );
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::new(384);
        let base = embedder.embed("sad lonely grief drama about loss").unwrap();
        let near = embedder.embed("a sad drama about grief").unwrap();
        let far = embedder.embed("explosive car chase heist comedy").unwrap();
        assert!(cosine_similarity(&base, &near) > cosine_similarity(&base, &far));
    }

    #[test]
    fn test_empty_and_tokenless_input() {
        let embedder = HashingEmbedder::new(16);
        assert!(matches!(embedder.embed(""), Err(EmbeddingError::EmptyInput)));
        assert!(matches!(
            embedder.embed("?!"),
            Err(EmbeddingError::Degenerate)
        ));
    }
}
