//! Weighted fusion of the per-candidate signals.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::config::FusionConfig;

/// Per-component scores of one candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// Similarity of the query emotion and the title affinity, in [0, 1]
    pub emotion: f32,
    /// Cosine similarity of the query vector and the title vector
    pub content: f32,
    /// Profile affinity blended with co-interaction, in [-1, 1]
    pub collaborative: f32,
}

/// Errors from invalid fusion weights
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    #[error("Fusion weight {name} is negative or not finite: {value}")]
    InvalidWeight { name: &'static str, value: f32 },

    #[error("Fusion weights must sum to 1, got {0}")]
    NotNormalized(f32),
}

/// Fusion weights; `emotion + content + collaborative == 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub emotion: f32,
    pub content: f32,
    pub collaborative: f32,
    /// Share of the collaborative component taken from co-interaction
    pub co_interaction: f32,
    pub tie_tolerance: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::from_config(&FusionConfig::default())
    }
}

impl FusionWeights {
    pub fn from_config(config: &FusionConfig) -> Self {
        Self {
            emotion: config.emotion,
            content: config.content,
            collaborative: config.collaborative,
            co_interaction: config.co_interaction.clamp(0.0, 1.0),
            tie_tolerance: config.tie_tolerance.max(f32::EPSILON),
        }
    }

    pub fn validate(&self) -> Result<(), FusionError> {
        for (name, value) in [
            ("emotion", self.emotion),
            ("content", self.content),
            ("collaborative", self.collaborative),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FusionError::InvalidWeight { name, value });
            }
        }
        let sum = self.emotion + self.content + self.collaborative;
        if (sum - 1.0).abs() > 0.01 {
            return Err(FusionError::NotNormalized(sum));
        }
        Ok(())
    }

    /// Collaborative component from the profile affinity and the
    /// co-interaction share. Both zero gives exactly zero.
    pub fn collaborative(&self, profile_affinity: f32, co_interaction: f32) -> f32 {
        (1.0 - self.co_interaction) * profile_affinity + self.co_interaction * co_interaction
    }

    pub fn fuse(&self, components: &ScoreComponents) -> f32 {
        self.emotion * components.emotion
            + self.content * components.content
            + self.collaborative * components.collaborative
    }

    /// Score bucket used for ordering; scores in one bucket are tied
    pub fn bucket(&self, score: f32) -> i64 {
        (f64::from(score) / f64::from(self.tie_tolerance)).round() as i64
    }

    /// Descending score, ties within tolerance broken by id ascending
    pub fn compare(&self, a: (f32, &str), b: (f32, &str)) -> Ordering {
        self.bucket(b.0)
            .cmp(&self.bucket(a.0))
            .then_with(|| a.1.cmp(b.1))
    }
}
