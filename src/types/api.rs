//! API request and response bodies.

use serde::{Deserialize, Serialize};

use crate::catalog::{TitleKind, TitleRecord};
use crate::emotion::{Emotion, EmotionVector};
use crate::history::ActionKind;
use crate::profile::ProfileSummary;
use crate::ranker::RankRequest;

/// Request to classify mood text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyEmotionRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyEmotionResponse {
    pub emotion: EmotionVector,
    pub dominant: Option<Emotion>,
    pub valence: f32,
    pub arousal: f32,
}

impl From<EmotionVector> for ClassifyEmotionResponse {
    fn from(emotion: EmotionVector) -> Self {
        Self {
            dominant: emotion.dominant(),
            valence: emotion.valence(),
            arousal: emotion.arousal(),
            emotion,
        }
    }
}

/// One emotion category as exposed by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionCategoryInfo {
    pub id: Emotion,
    pub name: String,
    pub prompt: String,
    pub default_weight: f32,
    pub valence_hint: f32,
    pub arousal_hint: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionCategoriesResponse {
    pub categories: Vec<EmotionCategoryInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedTextRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedTextResponse {
    pub embedding: Vec<f32>,
    pub dimensions: usize,
    pub model_id: String,
}

/// Rebuild the index; without `titles` the stored catalog is re-indexed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebuildIndexRequest {
    #[serde(default)]
    pub titles: Option<Vec<TitleRecord>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTitleResponse {
    pub title_id: String,
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEffortRequest {
    pub effort: usize,
}

/// Recommendation request; the user comes from the path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub mood_text: Option<String>,
    #[serde(default)]
    pub seed_title_ids: Vec<String>,
    #[serde(default)]
    pub result_size: Option<usize>,
    #[serde(default)]
    pub candidate_pool_size: Option<usize>,
    #[serde(default)]
    pub exclude_watched: bool,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
    #[serde(default)]
    pub kind: Option<TitleKind>,
}

impl RecommendRequest {
    pub fn into_rank_request(self, user_id: String) -> RankRequest {
        RankRequest {
            user_id,
            mood_text: self.mood_text,
            seed_title_ids: self.seed_title_ids,
            result_size: self.result_size,
            candidate_pool_size: self.candidate_pool_size,
            exclude_watched: self.exclude_watched,
            exclude_ids: self.exclude_ids,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub title_id: String,
    pub action: ActionKind,
    /// In [0, 1]; for ratings the normalized rating
    #[serde(default = "default_strength")]
    pub strength: f32,
}

fn default_strength() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: ProfileSummary,
    /// Present when requested with `include_vector=true`
    #[serde(default)]
    pub preference: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileQuery {
    #[serde(default)]
    pub include_vector: bool,
}
