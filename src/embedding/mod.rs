//! Text embedding for titles and mood queries.
//!
//! Title vectors and query vectors must come from the same embedder and the
//! same text template; the index snapshot records a fingerprint of both.

pub mod hashing;
#[cfg(feature = "inference")]
pub mod onnx;
pub mod text;

pub use hashing::HashingEmbedder;
#[cfg(feature = "inference")]
pub use onnx::OnnxEmbedder;
pub use text::{format_title_text, template_fingerprint, tokenize};

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{EmbedderKind, EmbeddingConfig};
use crate::math;

/// Errors produced while embedding text
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Text is empty")]
    EmptyInput,

    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Embedding is degenerate (zero or non-finite)")]
    Degenerate,
}

/// Deterministic text to fixed-length vector mapping.
pub trait Embedder: Send + Sync {
    /// Embed text into an L2-normalized vector of `dimensions()` components
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimensions(&self) -> usize;

    /// Identifies the model; part of the snapshot fingerprint
    fn model_id(&self) -> &str;
}

/// Reject vectors that cannot be indexed or compared.
pub fn validate_vector(vector: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::InvalidDimension {
            expected,
            got: vector.len(),
        });
    }
    if !math::is_finite(vector) || math::is_zero(vector) {
        return Err(EmbeddingError::Degenerate);
    }
    Ok(())
}

/// Build the configured embedder.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.provider {
        EmbedderKind::Hashing => {
            info!(dimensions = config.dimensions, "Using hashing embedder");
            Ok(Arc::new(HashingEmbedder::new(config.dimensions)))
        }
        #[cfg(feature = "inference")]
        EmbedderKind::Onnx => {
            let embedder = OnnxEmbedder::load(config.model_cache_dir.as_deref())?;
            if embedder.dimensions() != config.dimensions {
                return Err(EmbeddingError::InvalidDimension {
                    expected: config.dimensions,
                    got: embedder.dimensions(),
                });
            }
            Ok(Arc::new(embedder))
        }
        #[cfg(not(feature = "inference"))]
        EmbedderKind::Onnx => Err(EmbeddingError::ModelUnavailable(
            "ONNX embedder requires the inference feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_vector() {
        assert!(validate_vector(&[1.0, 0.0], 2).is_ok());
        assert!(matches!(
            validate_vector(&[1.0], 2),
            Err(EmbeddingError::InvalidDimension { expected: 2, got: 1 })
        ));
        assert!(matches!(
            validate_vector(&[0.0, 0.0], 2),
            Err(EmbeddingError::Degenerate)
        ));
        assert!(matches!(
            validate_vector(&[f32::NAN, 1.0], 2),
            Err(EmbeddingError::Degenerate)
        ));
    }

    #[test]
    fn test_build_default_embedder() {
        let embedder = build_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.model_id(), "hashing-v1");
    }

    #[cfg(not(feature = "inference"))]
    #[test]
    fn test_onnx_requires_feature() {
        let config = EmbeddingConfig {
            provider: EmbedderKind::Onnx,
            ..Default::default()
        };
        assert!(matches!(
            build_embedder(&config),
            Err(EmbeddingError::ModelUnavailable(_))
        ));
    }
}
