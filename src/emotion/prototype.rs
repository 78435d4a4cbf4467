//! Zero-shot emotion classifier over embedded category prompts.

use std::sync::Arc;

use super::{ClassificationError, Emotion, EmotionClassifier, EmotionVector, DEFINITIONS};
use crate::embedding::{Embedder, EmbeddingError};
use crate::math::cosine_similarity;

/// Scores text by similarity to each category's prompt embedding.
pub struct PrototypeClassifier {
    embedder: Arc<dyn Embedder>,
    prototypes: Vec<Vec<f32>>,
    temperature: f32,
    weights: [f32; Emotion::COUNT],
}

impl PrototypeClassifier {
    /// Embed every category prompt once.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        temperature: f32,
        weights: [f32; Emotion::COUNT],
    ) -> Result<Self, ClassificationError> {
        let prototypes = DEFINITIONS
            .iter()
            .map(|def| {
                embedder.embed(def.prompt).map_err(|e| {
                    ClassificationError::Unavailable(format!(
                        "failed to embed prompt for {}: {e}",
                        def.emotion
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            embedder,
            prototypes,
            temperature: temperature.max(f32::EPSILON),
            weights,
        })
    }
}

impl EmotionClassifier for PrototypeClassifier {
    fn classify(&self, text: &str) -> Result<EmotionVector, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyInput);
        }

        let embedding = self.embedder.embed(text).map_err(|e| match e {
            EmbeddingError::EmptyInput => ClassificationError::EmptyInput,
            EmbeddingError::Degenerate => ClassificationError::Unintelligible,
            other => ClassificationError::Unavailable(other.to_string()),
        })?;

        let sims: Vec<f32> = self
            .prototypes
            .iter()
            .map(|p| cosine_similarity(&embedding, p))
            .collect();

        // A text sharing nothing with any prompt carries no signal
        if sims.iter().all(|s| *s <= 0.0) {
            return Err(ClassificationError::Unintelligible);
        }

        let scores = softmax(&sims, self.temperature);
        let mut weighted = [0.0f32; Emotion::COUNT];
        for (i, score) in scores.iter().enumerate() {
            weighted[i] = score * self.weights[i];
        }

        let vector = EmotionVector::from_weights(weighted);
        if vector.total() <= 0.0 {
            return Err(ClassificationError::Unintelligible);
        }
        Ok(vector.normalized())
    }

    fn name(&self) -> &'static str {
        "prototype"
    }
}

/// Temperature softmax, shifted by the max for numerical stability
fn softmax(values: &[f32], temperature: f32) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values
        .iter()
        .map(|v| ((v - max) / temperature).exp())
        .collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    fn classifier() -> PrototypeClassifier {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(384));
        PrototypeClassifier::new(
            embedder,
            0.1,
            super::super::category_weights(&Default::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let out = softmax(&[0.1, 0.5, 0.2], 0.1);
        assert!((out.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(out[1] > out[0] && out[1] > out[2]);
    }

    #[test]
    fn test_prompt_words_pull_toward_category() {
        let v = classifier()
            .classify("a heartbreaking tearjerker about grief and sorrow")
            .unwrap();
        assert_eq!(v.dominant(), Some(Emotion::Sad));
        assert!((v.total() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_tokenless_text_is_unintelligible() {
        assert!(matches!(
            classifier().classify("!!! ..."),
            Err(ClassificationError::Unintelligible)
        ));
        assert!(matches!(
            classifier().classify(""),
            Err(ClassificationError::EmptyInput)
        ));
    }
}
