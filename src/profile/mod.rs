//! Per-user taste profiles.
//!
//! A profile is a compact summary of a user's history: a preference vector in
//! embedding space, an emotion affinity and per-genre preferences. Profiles
//! change only through the pure update rule in [`update`], so any profile can
//! be rebuilt by replaying the interaction log.

pub mod repository;
pub mod store;
pub mod update;

pub use repository::{ProfileRepository, RepositoryError};
pub use store::{ProfileStore, ProfileStoreError};
pub use update::{FeedbackPolicy, FeedbackTarget};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::emotion::EmotionVector;
use crate::math;

/// Positive interactions after which a profile is fully trusted
const CONFIDENCE_SATURATION: f32 = 20.0;

/// Number of genres reported in profile summaries
const SUMMARY_GENRES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTasteProfile {
    pub user_id: String,
    /// Preference vector, same dimensionality as title embeddings, norm <= 1
    pub preference: Vec<f32>,
    pub emotion_affinity: EmotionVector,
    pub genre_affinity: BTreeMap<String, f32>,
    pub update_count: u64,
    pub positive_count: u64,
    /// Incremented on every applied update
    pub version: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserTasteProfile {
    /// Profile for a user with no history
    pub fn cold(user_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            user_id: user_id.into(),
            preference: vec![0.0; dimensions],
            emotion_affinity: EmotionVector::zero(),
            genre_affinity: BTreeMap::new(),
            update_count: 0,
            positive_count: 0,
            version: 0,
            last_updated: None,
        }
    }

    pub fn is_cold(&self) -> bool {
        self.update_count == 0 || math::is_zero(&self.preference)
    }

    pub fn confidence(&self) -> f32 {
        (self.positive_count as f32 / CONFIDENCE_SATURATION).min(1.0)
    }

    /// Profile/title affinity; exactly 0.0 for a cold profile
    pub fn collaborative_score(&self, title_vector: &[f32]) -> f32 {
        if self.is_cold() || self.preference.len() != title_vector.len() {
            return 0.0;
        }
        math::dot_product(&self.preference, title_vector).clamp(-1.0, 1.0)
    }

    /// Genres ordered by descending affinity, ties by name
    pub fn top_genres(&self, n: usize) -> Vec<(String, f32)> {
        let mut genres: Vec<(String, f32)> = self
            .genre_affinity
            .iter()
            .map(|(g, w)| (g.clone(), *w))
            .collect();
        genres.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        genres.truncate(n);
        genres
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            user_id: self.user_id.clone(),
            emotion_affinity: self.emotion_affinity,
            dominant_emotion: self.emotion_affinity.dominant().map(|e| e.to_string()),
            top_genres: self.top_genres(SUMMARY_GENRES),
            update_count: self.update_count,
            positive_count: self.positive_count,
            confidence: self.confidence(),
            preference_norm: math::l2_norm(&self.preference),
            is_cold: self.is_cold(),
            version: self.version,
            last_updated: self.last_updated,
        }
    }
}

/// Profile view without the preference vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub user_id: String,
    pub emotion_affinity: EmotionVector,
    pub dominant_emotion: Option<String>,
    pub top_genres: Vec<(String, f32)>,
    pub update_count: u64,
    pub positive_count: u64,
    pub confidence: f32,
    pub preference_norm: f32,
    pub is_cold: bool,
    pub version: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_profile_scores_zero() {
        let profile = UserTasteProfile::cold("u", 4);
        assert!(profile.is_cold());
        assert_eq!(profile.collaborative_score(&[1.0, 0.0, 0.0, 0.0]), 0.0);
        assert_eq!(profile.confidence(), 0.0);
    }

    #[test]
    fn test_collaborative_score_is_dot_product() {
        let mut profile = UserTasteProfile::cold("u", 2);
        profile.preference = vec![0.6, 0.0];
        profile.update_count = 1;
        assert!((profile.collaborative_score(&[1.0, 0.0]) - 0.6).abs() < 1e-6);
        assert!((profile.collaborative_score(&[-1.0, 0.0]) + 0.6).abs() < 1e-6);
        // mismatched dimensions never score
        assert_eq!(profile.collaborative_score(&[1.0]), 0.0);
    }

    #[test]
    fn test_confidence_saturates() {
        let mut profile = UserTasteProfile::cold("u", 2);
        profile.positive_count = 10;
        assert!((profile.confidence() - 0.5).abs() < 1e-6);
        profile.positive_count = 50;
        assert_eq!(profile.confidence(), 1.0);
    }

    #[test]
    fn test_summary_orders_genres() {
        let mut profile = UserTasteProfile::cold("u", 2);
        profile.genre_affinity.insert("drama".to_string(), 2.0);
        profile.genre_affinity.insert("comedy".to_string(), -1.0);
        profile.genre_affinity.insert("action".to_string(), 2.0);
        let summary = profile.summary();
        assert_eq!(summary.top_genres[0].0, "action");
        assert_eq!(summary.top_genres[1].0, "drama");
        assert_eq!(summary.top_genres[2].0, "comedy");
        assert!(summary.is_cold);
        assert_eq!(summary.dominant_emotion, None);
    }
}
