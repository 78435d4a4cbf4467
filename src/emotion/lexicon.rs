//! Cue-lexicon emotion classifier.

use tracing::debug;

use super::categories::{INTENSIFIERS, MODIFIER_WINDOW, NEGATIONS};
use super::{ClassificationError, Emotion, EmotionClassifier, EmotionVector, DEFINITIONS};
use crate::embedding::text::tokenize;

/// Weight multiplier for a cue preceded by an intensifier
const INTENSIFIER_BOOST: f32 = 1.5;

/// Share of a negated cue's weight credited to its opposite category
const NEGATION_TRANSFER: f32 = 0.5;

/// Counts category cues in the text, honouring nearby intensifiers and negations.
pub struct LexiconClassifier {
    weights: [f32; Emotion::COUNT],
}

impl LexiconClassifier {
    pub fn new(weights: [f32; Emotion::COUNT]) -> Self {
        Self { weights }
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new(super::category_weights(&Default::default()))
    }
}

impl EmotionClassifier for LexiconClassifier {
    fn classify(&self, text: &str) -> Result<EmotionVector, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyInput);
        }

        let tokens = tokenize(text);
        let mut scores = [0.0f32; Emotion::COUNT];
        let mut cues = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            let window = &tokens[i.saturating_sub(MODIFIER_WINDOW)..i];
            let negated = window.iter().any(|t| NEGATIONS.contains(&t.as_str()));
            let intensified = window.iter().any(|t| INTENSIFIERS.contains(&t.as_str()));
            let strength = if intensified { INTENSIFIER_BOOST } else { 1.0 };

            for def in DEFINITIONS.iter().filter(|d| d.matches(token)) {
                cues += 1;
                if negated {
                    scores[def.opposite.index()] += NEGATION_TRANSFER * strength;
                } else {
                    scores[def.emotion.index()] += strength;
                }
            }
        }

        for (score, weight) in scores.iter_mut().zip(self.weights.iter()) {
            *score *= weight;
        }

        let vector = EmotionVector::from_weights(scores);
        if vector.total() <= 0.0 {
            return Err(ClassificationError::Unintelligible);
        }

        debug!(cues, tokens = tokens.len(), "Lexicon classification");
        Ok(vector.normalized())
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}
