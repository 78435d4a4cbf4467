//! Emotion classification for free-text mood input.
//!
//! Mood text is mapped onto a closed set of emotion categories. Two
//! classifiers implement the same contract: a cue lexicon (default, no model
//! needed) and a zero-shot prototype classifier that compares the text
//! embedding against embedded category prompts.

pub mod categories;
pub mod lexicon;
pub mod prototype;

pub use categories::{definition, EmotionDefinition, DEFINITIONS};
pub use lexicon::LexiconClassifier;
pub use prototype::PrototypeClassifier;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ClassifierStrategy, EmotionConfig};
use crate::embedding::Embedder;
use crate::math;

/// The closed set of emotion categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Happy,
    Sad,
    Excited,
    Calm,
    Angry,
    Anxious,
    Romantic,
    Inspired,
    Lonely,
    Neutral,
}

impl Emotion {
    pub const COUNT: usize = 10;

    /// Every category in canonical order
    pub const ALL: [Emotion; Self::COUNT] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Excited,
        Emotion::Calm,
        Emotion::Angry,
        Emotion::Anxious,
        Emotion::Romantic,
        Emotion::Inspired,
        Emotion::Lonely,
        Emotion::Neutral,
    ];

    /// Position of this category in `ALL`
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable identifier used on the wire and in configuration
    pub fn id(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Excited => "excited",
            Emotion::Calm => "calm",
            Emotion::Angry => "angry",
            Emotion::Anxious => "anxious",
            Emotion::Romantic => "romantic",
            Emotion::Inspired => "inspired",
            Emotion::Lonely => "lonely",
            Emotion::Neutral => "neutral",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.id() == id)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Emotion {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(&s.trim().to_ascii_lowercase())
            .ok_or_else(|| ClassificationError::UnknownCategory(s.to_string()))
    }
}

/// Non-negative weights over every emotion category.
///
/// Always covers the full category set; categories missing from a serialized
/// map read as zero. Classifier output sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Emotion, f32>",
    into = "BTreeMap<Emotion, f32>"
)]
pub struct EmotionVector {
    weights: [f32; Emotion::COUNT],
}

impl EmotionVector {
    pub fn zero() -> Self {
        Self {
            weights: [0.0; Emotion::COUNT],
        }
    }

    /// All weight on a single category
    pub fn one_hot(emotion: Emotion) -> Self {
        let mut v = Self::zero();
        v.weights[emotion.index()] = 1.0;
        v
    }

    /// Build from raw weights, clamping negatives and non-finite values to zero
    pub fn from_weights(weights: [f32; Emotion::COUNT]) -> Self {
        let mut v = Self { weights };
        for w in &mut v.weights {
            if !w.is_finite() || *w < 0.0 {
                *w = 0.0;
            }
        }
        v
    }

    pub fn get(&self, emotion: Emotion) -> f32 {
        self.weights[emotion.index()]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        Emotion::ALL.into_iter().map(|e| (e, self.weights[e.index()]))
    }

    pub fn total(&self) -> f32 {
        self.weights.iter().sum()
    }

    pub fn is_zero(&self) -> bool {
        math::is_zero(&self.weights)
    }

    /// Rescaled to sum to 1; a zero vector stays zero
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return *self;
        }
        let mut v = *self;
        for w in &mut v.weights {
            *w /= total;
        }
        v
    }

    /// Category with the highest weight, earliest category on ties
    pub fn dominant(&self) -> Option<Emotion> {
        if self.is_zero() {
            return None;
        }
        let mut best = Emotion::ALL[0];
        for e in Emotion::ALL {
            if self.get(e) > self.get(best) {
                best = e;
            }
        }
        Some(best)
    }

    /// Cosine similarity between two emotion vectors, within [0, 1]
    pub fn similarity(&self, other: &EmotionVector) -> f32 {
        math::cosine_similarity(&self.weights, &other.weights).max(0.0)
    }

    /// Weighted valence hint (-1.0 negative to 1.0 positive)
    pub fn valence(&self) -> f32 {
        self.weighted_hint(|d| d.valence_hint)
    }

    /// Weighted arousal hint (-1.0 calm to 1.0 energetic)
    pub fn arousal(&self) -> f32 {
        self.weighted_hint(|d| d.arousal_hint)
    }

    fn weighted_hint(&self, hint: impl Fn(&EmotionDefinition) -> f32) -> f32 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        self.iter()
            .map(|(e, w)| w * hint(definition(e)))
            .sum::<f32>()
            / total
    }
}

impl Default for EmotionVector {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<EmotionVector> for BTreeMap<Emotion, f32> {
    fn from(v: EmotionVector) -> Self {
        v.iter().collect()
    }
}

impl TryFrom<BTreeMap<Emotion, f32>> for EmotionVector {
    type Error = ClassificationError;

    fn try_from(map: BTreeMap<Emotion, f32>) -> Result<Self, Self::Error> {
        let mut v = Self::zero();
        for (emotion, weight) in map {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ClassificationError::InvalidWeight {
                    emotion,
                    weight,
                });
            }
            v.weights[emotion.index()] = weight;
        }
        Ok(v)
    }
}

/// Errors produced by emotion classification
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("Mood text is empty")]
    EmptyInput,

    #[error("No emotional signal found in mood text")]
    Unintelligible,

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown emotion category: {0}")]
    UnknownCategory(String),

    #[error("Invalid weight {weight} for category {emotion}")]
    InvalidWeight { emotion: Emotion, weight: f32 },
}

/// Maps free text to an emotion distribution.
///
/// Implementations are deterministic and keep no per-call state.
pub trait EmotionClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<EmotionVector, ClassificationError>;

    /// Short identifier reported in health output
    fn name(&self) -> &'static str;
}

/// Category default weights with configured overrides applied
pub fn category_weights(overrides: &BTreeMap<Emotion, f32>) -> [f32; Emotion::COUNT] {
    let mut weights = [0.0; Emotion::COUNT];
    for def in &DEFINITIONS {
        weights[def.emotion.index()] = overrides
            .get(&def.emotion)
            .copied()
            .unwrap_or(def.default_weight);
    }
    weights
}

/// Build the configured classifier.
///
/// The prototype classifier embeds every category prompt up front, so it
/// fails here rather than per request when the embedder is unusable.
pub fn build_classifier(
    config: &EmotionConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<dyn EmotionClassifier>, ClassificationError> {
    let weights = category_weights(&config.category_weights);
    match config.strategy {
        ClassifierStrategy::Lexicon => Ok(Arc::new(LexiconClassifier::new(weights))),
        ClassifierStrategy::Prototype => Ok(Arc::new(PrototypeClassifier::new(
            embedder,
            config.temperature,
            weights,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_ids_round_trip() {
        for e in Emotion::ALL {
            assert_eq!(Emotion::from_id(e.id()), Some(e));
            assert_eq!(e.id().parse::<Emotion>().unwrap(), e);
        }
        assert!("bewildered".parse::<Emotion>().is_err());
    }

    #[test]
    fn test_dominant() {
        let even = EmotionVector::from_weights([0.1; Emotion::COUNT]);
        // ties resolve to the earliest category
        assert_eq!(even.dominant(), Some(Emotion::Happy));
        assert_eq!(EmotionVector::zero().dominant(), None);
        assert_eq!(
            EmotionVector::one_hot(Emotion::Lonely).dominant(),
            Some(Emotion::Lonely)
        );
    }

    #[test]
    fn test_similarity_bounds() {
        let sad = EmotionVector::one_hot(Emotion::Sad);
        let happy = EmotionVector::one_hot(Emotion::Happy);
        assert!((sad.similarity(&sad) - 1.0).abs() < 1e-6);
        assert_eq!(sad.similarity(&happy), 0.0);
        assert_eq!(sad.similarity(&EmotionVector::zero()), 0.0);
    }

    #[test]
    fn test_valence_and_arousal() {
        let happy = EmotionVector::one_hot(Emotion::Happy);
        let sad = EmotionVector::one_hot(Emotion::Sad);
        assert!(happy.valence() > 0.0);
        assert!(sad.valence() < 0.0);
        assert!(EmotionVector::one_hot(Emotion::Excited).arousal() > 0.0);
        assert!(EmotionVector::one_hot(Emotion::Calm).arousal() < 0.0);
        assert_eq!(EmotionVector::zero().valence(), 0.0);
    }

    #[test]
    fn test_from_weights_clamps_negative() {
        let mut raw = [0.0; Emotion::COUNT];
        raw[0] = -1.0;
        raw[1] = f32::NAN;
        raw[2] = 2.0;
        let v = EmotionVector::from_weights(raw);
        assert_eq!(v.get(Emotion::Happy), 0.0);
        assert_eq!(v.get(Emotion::Sad), 0.0);
        assert_eq!(v.normalized().get(Emotion::Excited), 1.0);
    }

    #[test]
    fn test_serializes_every_category() {
        let v = EmotionVector::one_hot(Emotion::Calm);
        let json = serde_json::to_value(v).unwrap();
        let map = json.as_object().unwrap();
        assert_eq!(map.len(), Emotion::COUNT);
        assert_eq!(map["calm"], 1.0);

        let partial: EmotionVector = serde_json::from_str(r#"{"sad": 0.5}"#).unwrap();
        assert_eq!(partial.get(Emotion::Sad), 0.5);
        assert_eq!(partial.get(Emotion::Happy), 0.0);

        assert!(serde_json::from_str::<EmotionVector>(r#"{"sad": -0.5}"#).is_err());
    }

    #[test]
    fn test_category_weight_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert(Emotion::Neutral, 0.5);
        let weights = category_weights(&overrides);
        assert_eq!(weights[Emotion::Neutral.index()], 0.5);
        assert_eq!(weights[Emotion::Happy.index()], 1.0);
    }
}
