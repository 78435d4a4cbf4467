//! The profile update rule: `(profile, event) -> profile`.
//!
//! The preference vector follows an exponential moving average toward the
//! title vector on positive signals and away from it on negative ones, with a
//! learning rate that decays with the number of updates already applied.
//! Negative steps are scaled down so one dislike never outweighs one like.

use chrono::{DateTime, Utc};

use super::UserTasteProfile;
use crate::catalog::Title;
use crate::config::{ActionWeights, FeedbackConfig};
use crate::emotion::{Emotion, EmotionVector};
use crate::history::{ActionKind, InteractionEvent};
use crate::math;

/// What a feedback event points at
#[derive(Debug, Clone, Copy)]
pub struct FeedbackTarget<'a> {
    pub embedding: &'a [f32],
    pub emotion_affinity: &'a EmotionVector,
    pub genres: &'a [String],
}

impl<'a> From<&'a Title> for FeedbackTarget<'a> {
    fn from(title: &'a Title) -> Self {
        Self {
            embedding: &title.embedding,
            emotion_affinity: &title.emotion_affinity,
            genres: &title.record.genres,
        }
    }
}

/// Parameters of the update rule
#[derive(Debug, Clone)]
pub struct FeedbackPolicy {
    pub base_rate: f32,
    pub min_rate: f32,
    pub half_life: f32,
    pub negative_scale: f32,
    pub weights: ActionWeights,
}

impl Default for FeedbackPolicy {
    fn default() -> Self {
        Self::from_config(&FeedbackConfig::default())
    }
}

impl FeedbackPolicy {
    pub fn from_config(config: &FeedbackConfig) -> Self {
        Self {
            base_rate: config.base_rate,
            min_rate: config.min_rate,
            half_life: config.half_life.max(f32::EPSILON),
            negative_scale: config.negative_scale,
            weights: config.action_weights.clone(),
        }
    }

    /// Learning rate after `update_count` updates; halves every `half_life`
    pub fn learning_rate(&self, update_count: u64) -> f32 {
        let decayed = self.base_rate / (1.0 + update_count as f32 / self.half_life);
        decayed.clamp(self.min_rate, 1.0)
    }

    /// Signed step size for the next update
    pub fn step(&self, update_count: u64, signal: f32) -> f32 {
        let mut step = self.learning_rate(update_count) * signal;
        if step < 0.0 {
            step *= self.negative_scale;
        }
        step.clamp(-1.0, 1.0)
    }

    pub fn signal(&self, action: ActionKind, strength: f32) -> f32 {
        action.signal(strength, &self.weights)
    }

    /// Apply one event and return the new profile; the input is untouched.
    pub fn apply(
        &self,
        profile: &UserTasteProfile,
        target: FeedbackTarget<'_>,
        action: ActionKind,
        strength: f32,
        timestamp: DateTime<Utc>,
    ) -> UserTasteProfile {
        let signal = self.signal(action, strength);
        let step = self.step(profile.update_count, signal);
        let mut next = profile.clone();

        if next.preference.len() == target.embedding.len() {
            math::step_toward(&mut next.preference, target.embedding, step);
            math::clamp_norm(&mut next.preference, 1.0);
        }

        let mut emotion = [0.0f32; Emotion::COUNT];
        emotion.copy_from_slice(next.emotion_affinity.as_slice());
        math::step_toward(&mut emotion, target.emotion_affinity.as_slice(), step);
        next.emotion_affinity = EmotionVector::from_weights(emotion);

        for genre in target.genres {
            let key = genre.trim().to_lowercase();
            if !key.is_empty() {
                *next.genre_affinity.entry(key).or_insert(0.0) += signal;
            }
        }

        next.update_count += 1;
        if signal > 0.0 {
            next.positive_count += 1;
        }
        next.version += 1;
        next.last_updated = Some(match profile.last_updated {
            Some(previous) => previous.max(timestamp),
            None => timestamp,
        });
        next
    }

    /// Rebuild a profile from scratch by replaying events in order.
    ///
    /// `lookup` resolves a title id to its target; events for titles that no
    /// longer exist are skipped.
    pub fn replay<'a, F>(
        &self,
        user_id: &str,
        dimensions: usize,
        events: &[InteractionEvent],
        mut lookup: F,
    ) -> UserTasteProfile
    where
        F: FnMut(&str) -> Option<&'a Title>,
    {
        events.iter().fold(
            UserTasteProfile::cold(user_id, dimensions),
            |profile, event| match lookup(&event.title_id) {
                Some(title) => self.apply(
                    &profile,
                    FeedbackTarget::from(title),
                    event.action,
                    event.strength,
                    event.timestamp,
                ),
                None => profile,
            },
        )
    }
}
