//! Hybrid ranking: emotion match, content similarity and collaborative
//! affinity fused into one score per candidate.
//!
//! Ranking only reads shared state. Each component that cannot be computed
//! falls back and is reported in `degraded`; the request fails only when no
//! component is usable.

pub mod fusion;

pub use fusion::{FusionError, FusionWeights, ScoreComponents};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{Title, TitleCatalog, TitleKind};
use crate::config::{IndexConfig, RankingConfig};
use crate::embedding::Embedder;
use crate::emotion::{EmotionClassifier, EmotionVector};
use crate::history::InteractionLog;
use crate::index::{IndexError, VectorIndex};
use crate::math;
use crate::profile::{ProfileStore, ProfileStoreError, UserTasteProfile};

/// Query vector share of the mood embedding when seeds are also given
const MOOD_QUERY_WEIGHT: f32 = 0.7;
const SEED_QUERY_WEIGHT: f32 = 0.3;

#[derive(Debug, Error)]
pub enum RankError {
    #[error("Invalid ranking request: {0}")]
    InvalidRequest(String),

    #[error("No recommendation signal available for user {0}")]
    RecommendationUnavailable(String),

    #[error("Ranking exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileStoreError),

    #[error("Ranking task aborted: {0}")]
    Aborted(String),
}

/// A ranking component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Emotion,
    Content,
    Collaborative,
}

/// Parameters of one ranking request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankRequest {
    pub user_id: String,
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

impl RankRequest {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_mood(mut self, text: impl Into<String>) -> Self {
        self.mood_text = Some(text.into());
        self
    }

    pub fn with_seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seed_title_ids = seeds.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_result_size(mut self, size: usize) -> Self {
        self.result_size = Some(size);
        self
    }

    pub fn excluding_watched(mut self) -> Self {
        self.exclude_watched = true;
        self
    }

    pub fn with_kind(mut self, kind: TitleKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedTitle {
    pub title_id: String,
    pub title: String,
    pub kind: TitleKind,
    pub score: f32,
    pub components: ScoreComponents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    pub user_id: String,
    pub results: Vec<RankedTitle>,
    /// Emotion vector the emotion component was matched against
    pub emotion: Option<EmotionVector>,
    /// Components that fell back during this request
    pub degraded: Vec<Component>,
    pub profile_confidence: f32,
    pub candidates_considered: usize,
}

/// Query-side signals resolved before candidate retrieval
struct QuerySignals {
    emotion: Option<EmotionVector>,
    vector: Option<Vec<f32>>,
    degraded: Vec<Component>,
}

struct Candidate {
    title: Arc<Title>,
    content: f32,
}

/// Everything the ranker reads
#[derive(Clone)]
pub struct Ranker {
    pub classifier: Arc<dyn EmotionClassifier>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub catalog: Arc<TitleCatalog>,
    pub profiles: Arc<ProfileStore>,
    pub log: Arc<dyn InteractionLog>,
    pub weights: FusionWeights,
    pub index_config: IndexConfig,
    pub config: RankingConfig,
}

impl Ranker {
    /// Rank titles for a user; `deadline` is checked between phases.
    pub fn rank(
        &self,
        request: &RankRequest,
        deadline: Option<Instant>,
    ) -> Result<Recommendations, RankError> {
        let started = Instant::now();
        let check_deadline = || match deadline {
            Some(d) if Instant::now() >= d => Err(RankError::Timeout(started.elapsed())),
            _ => Ok(()),
        };

        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(RankError::InvalidRequest("user id must not be empty".to_string()));
        }
        let result_size = request.result_size.unwrap_or(self.config.default_result_size);
        if result_size == 0 {
            return Err(RankError::InvalidRequest(
                "result size must be at least 1".to_string(),
            ));
        }

        let profile = self.profiles.get(user_id)?;
        let signals = self.query_signals(request, &profile);
        check_deadline()?;

        let co_available = self.weights.co_interaction > 0.0 && self.log.has_history(user_id);
        let collaborative_available = !profile.is_cold() || co_available;
        if signals.emotion.is_none() && signals.vector.is_none() && !collaborative_available {
            warn!(user_id, "No usable ranking signal");
            return Err(RankError::RecommendationUnavailable(user_id.to_string()));
        }

        let mut excluded: HashSet<String> = request.exclude_ids.iter().cloned().collect();
        excluded.extend(request.seed_title_ids.iter().cloned());
        if request.exclude_watched {
            excluded.extend(self.log.excluded_titles(user_id));
        }

        let pool = request
            .candidate_pool_size
            .unwrap_or_else(|| {
                (result_size * self.index_config.candidate_multiplier)
                    .max(self.index_config.min_candidates)
            })
            .max(result_size);

        let keep = |title: &Title| {
            !excluded.contains(title.id()) && request.kind.map_or(true, |k| title.kind() == k)
        };
        let candidates = match signals.vector.as_deref() {
            Some(vector) => self.nearest(vector, pool, pool + excluded.len(), keep)?,
            None => self.scan(signals.emotion.as_ref(), &profile, pool, keep),
        };
        check_deadline()?;
        let candidates_considered = candidates.len();

        let co_scores = if co_available {
            let ids: Vec<&str> = candidates.iter().map(|c| c.title.id()).collect();
            self.log.co_interaction_scores(user_id, &ids)
        } else {
            Default::default()
        };

        let mut results: Vec<RankedTitle> = candidates
            .into_iter()
            .map(|c| {
                let emotion = signals
                    .emotion
                    .as_ref()
                    .map_or(0.0, |e| e.similarity(&c.title.emotion_affinity));
                let co = co_scores.get(c.title.id()).copied().unwrap_or(0.0);
                let collaborative = self
                    .weights
                    .collaborative(profile.collaborative_score(&c.title.embedding), co);
                let components = ScoreComponents {
                    emotion,
                    content: c.content,
                    collaborative,
                };
                RankedTitle {
                    title_id: c.title.id().to_string(),
                    title: c.title.record.title.clone(),
                    kind: c.title.kind(),
                    score: self.weights.fuse(&components),
                    components,
                }
            })
            .collect();
        check_deadline()?;

        results.sort_by(|a, b| {
            self.weights
                .compare((a.score, a.title_id.as_str()), (b.score, b.title_id.as_str()))
        });
        results.truncate(result_size);

        debug!(
            user_id,
            results = results.len(),
            candidates = candidates_considered,
            degraded = ?signals.degraded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ranking complete"
        );

        Ok(Recommendations {
            user_id: user_id.to_string(),
            results,
            emotion: signals.emotion,
            degraded: signals.degraded,
            profile_confidence: profile.confidence(),
            candidates_considered,
        })
    }

    fn query_signals(&self, request: &RankRequest, profile: &UserTasteProfile) -> QuerySignals {
        let mut degraded = Vec::new();
        let mood = request
            .mood_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let emotion = match mood {
            Some(text) => match self.classifier.classify(text) {
                Ok(v) if !v.is_zero() => Some(v),
                Ok(_) => {
                    degraded.push(Component::Emotion);
                    None
                }
                Err(e) => {
                    warn!(user_id = %request.user_id, error = %e, "Emotion classification failed, matching disabled");
                    degraded.push(Component::Emotion);
                    None
                }
            },
            None if !profile.emotion_affinity.is_zero() => {
                Some(profile.emotion_affinity.normalized())
            }
            None => None,
        };

        let mut content_failed = false;
        let mood_vector = mood.and_then(|text| match self.embedder.embed(text) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(user_id = %request.user_id, error = %e, "Mood embedding failed, content matching disabled");
                degraded.push(Component::Content);
                content_failed = true;
                None
            }
        });

        let seeds: Vec<Arc<Title>> = request
            .seed_title_ids
            .iter()
            .filter_map(|id| {
                let title = self.catalog.get(id);
                if title.is_none() {
                    warn!(seed = %id, "Ignoring unknown seed title");
                }
                title
            })
            .collect();
        let seed_vector = math::centroid(seeds.iter().map(|t| t.embedding.as_slice()))
            .filter(|v| !math::is_zero(v));

        // a failed mood embedding leaves no content term at all
        let vector = match (mood_vector, seed_vector) {
            _ if content_failed => None,
            (Some(m), Some(s)) if m.len() == s.len() => {
                Some(math::blend(&m, MOOD_QUERY_WEIGHT, &s, SEED_QUERY_WEIGHT))
            }
            (Some(m), _) => Some(m),
            (None, Some(s)) => Some(s),
            (None, None) if mood.is_none() && !profile.is_cold() => {
                Some(math::normalize(&profile.preference))
            }
            (None, None) => None,
        };

        QuerySignals {
            emotion,
            vector,
            degraded,
        }
    }

    /// Nearest titles passing `keep`, widening the query until `pool` of them
    /// are found or the index is exhausted
    fn nearest<F>(
        &self,
        vector: &[f32],
        pool: usize,
        initial_k: usize,
        keep: F,
    ) -> Result<Vec<Candidate>, RankError>
    where
        F: Fn(&Title) -> bool,
    {
        let available = self.index.len();
        let mut k = initial_k.max(pool);
        loop {
            let hits = self.index.query(vector, k)?;
            let candidates: Vec<Candidate> = hits
                .into_iter()
                .filter_map(|hit| {
                    // entries removed after the query are skipped
                    let title = self.catalog.get(&hit.title_id)?;
                    if !keep(&title) {
                        return None;
                    }
                    Some(Candidate {
                        title,
                        content: hit.similarity.clamp(-1.0, 1.0),
                    })
                })
                .take(pool)
                .collect();

            if candidates.len() >= pool || k >= available {
                return Ok(candidates);
            }
            k = k.saturating_mul(2).min(available);
            debug!(k, kept = candidates.len(), "Widening candidate query");
        }
    }

    /// Catalog scan used when there is no query vector: every title passing
    /// `keep`, ordered by emotion match, then profile score, then id
    fn scan<F>(
        &self,
        emotion: Option<&EmotionVector>,
        profile: &UserTasteProfile,
        pool: usize,
        keep: F,
    ) -> Vec<Candidate>
    where
        F: Fn(&Title) -> bool,
    {
        let limit = self.config.fallback_scan_limit.max(pool);
        let mut scored: Vec<(f32, f32, Arc<Title>)> = self
            .catalog
            .all()
            .into_iter()
            .filter(|title| keep(title))
            .map(|title| {
                let matched = emotion.map_or(0.0, |e| e.similarity(&title.emotion_affinity));
                let preferred = profile.collaborative_score(&title.embedding);
                (matched, preferred, title)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| b.1.total_cmp(&a.1))
                .then_with(|| a.2.id().cmp(b.2.id()))
        });
        scored.truncate(limit);
        debug!(candidates = scored.len(), limit, "Ranking from catalog scan");

        scored
            .into_iter()
            .map(|(_, _, title)| Candidate {
                title,
                content: 0.0,
            })
            .collect()
    }
}
