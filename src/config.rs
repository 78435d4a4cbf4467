use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::emotion::Emotion;

/// Application configuration loaded from environment variables.
///
/// All settings can be configured via environment variables with the `RECO_` prefix.
/// For example: `RECO_SERVER__PORT=8097`, `RECO_FUSION__EMOTION=0.5`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Emotion classification configuration
    #[serde(default)]
    pub emotion: EmotionConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Score fusion weights
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Profile update rule
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Ranking defaults
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding dimensionality shared by titles, queries and profiles
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Number of leading cast members included in the title text
    #[serde(default = "default_leading_cast")]
    pub leading_cast: usize,

    /// Which embedder produces title and query vectors
    #[serde(default)]
    pub provider: EmbedderKind,

    /// Cache directory for downloaded ONNX models (inference feature only)
    #[serde(default)]
    pub model_cache_dir: Option<PathBuf>,
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Feature hashing, needs no model files
    #[default]
    Hashing,
    /// ONNX sentence-transformer (all-MiniLM-L6-v2, 384 dimensions)
    Onnx,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            leading_cast: default_leading_cast(),
            provider: EmbedderKind::default(),
            model_cache_dir: None,
        }
    }
}

fn default_dimensions() -> usize {
    384
}

fn default_leading_cast() -> usize {
    5
}

/// Which emotion classifier implementation to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStrategy {
    /// Cue lexicon with intensifiers and negation
    #[default]
    Lexicon,
    /// Zero-shot similarity against embedded category prompts
    Prototype,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmotionConfig {
    #[serde(default)]
    pub strategy: ClassifierStrategy,

    /// Softmax temperature for the prototype classifier
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-category default weight overrides, keyed by category id
    #[serde(default)]
    pub category_weights: BTreeMap<Emotion, f32>,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::default(),
            temperature: default_temperature(),
            category_weights: BTreeMap::new(),
        }
    }
}

fn default_temperature() -> f32 {
    0.1
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// HNSW graph connectivity (M)
    #[serde(default = "default_connectivity")]
    pub connectivity: usize,

    /// Search effort used while building the graph
    #[serde(default = "default_expansion_add")]
    pub expansion_add: usize,

    /// Search effort used at query time; higher means better recall
    #[serde(default = "default_expansion_search")]
    pub expansion_search: usize,

    /// Capacity growth step when the index fills up
    #[serde(default = "default_reserve_step")]
    pub reserve_step: usize,

    /// Candidate pool size as a multiple of the requested result size
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Lower bound on the candidate pool size
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            connectivity: default_connectivity(),
            expansion_add: default_expansion_add(),
            expansion_search: default_expansion_search(),
            reserve_step: default_reserve_step(),
            candidate_multiplier: default_candidate_multiplier(),
            min_candidates: default_min_candidates(),
        }
    }
}

fn default_connectivity() -> usize {
    16
}

fn default_expansion_add() -> usize {
    128
}

fn default_expansion_search() -> usize {
    64
}

fn default_reserve_step() -> usize {
    1024
}

fn default_candidate_multiplier() -> usize {
    4
}

fn default_min_candidates() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct FusionConfig {
    /// Weight of the emotion-match component
    #[serde(default = "default_emotion_weight")]
    pub emotion: f32,

    /// Weight of the content-similarity component
    #[serde(default = "default_content_weight")]
    pub content: f32,

    /// Weight of the collaborative component
    #[serde(default = "default_collaborative_weight")]
    pub collaborative: f32,

    /// Share of the collaborative component taken from co-interaction patterns
    #[serde(default = "default_co_interaction")]
    pub co_interaction: f32,

    /// Scores closer than this are treated as tied
    #[serde(default = "default_tie_tolerance")]
    pub tie_tolerance: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            emotion: default_emotion_weight(),
            content: default_content_weight(),
            collaborative: default_collaborative_weight(),
            co_interaction: default_co_interaction(),
            tie_tolerance: default_tie_tolerance(),
        }
    }
}

fn default_emotion_weight() -> f32 {
    0.4
}

fn default_content_weight() -> f32 {
    0.35
}

fn default_collaborative_weight() -> f32 {
    0.25
}

fn default_co_interaction() -> f32 {
    0.25
}

fn default_tie_tolerance() -> f32 {
    1e-6
}

/// Per-action multipliers applied to the feedback strength
#[derive(Debug, Clone, Deserialize)]
pub struct ActionWeights {
    #[serde(default = "default_viewed_weight")]
    pub viewed: f32,
    #[serde(default = "default_unit_weight")]
    pub rated: f32,
    #[serde(default = "default_added_to_list_weight")]
    pub added_to_list: f32,
    #[serde(default = "default_skipped_weight")]
    pub skipped: f32,
    #[serde(default = "default_unit_weight")]
    pub liked: f32,
    #[serde(default = "default_unit_weight")]
    pub disliked: f32,
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self {
            viewed: default_viewed_weight(),
            rated: default_unit_weight(),
            added_to_list: default_added_to_list_weight(),
            skipped: default_skipped_weight(),
            liked: default_unit_weight(),
            disliked: default_unit_weight(),
        }
    }
}

fn default_viewed_weight() -> f32 {
    0.5
}

fn default_unit_weight() -> f32 {
    1.0
}

fn default_added_to_list_weight() -> f32 {
    0.8
}

fn default_skipped_weight() -> f32 {
    0.3
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackConfig {
    /// Learning rate for the first update
    #[serde(default = "default_base_rate")]
    pub base_rate: f32,

    /// Floor the decayed learning rate never drops below
    #[serde(default = "default_min_rate")]
    pub min_rate: f32,

    /// Number of updates after which the rate has halved
    #[serde(default = "default_half_life")]
    pub half_life: f32,

    /// Multiplier applied to negative steps; must be below 1
    #[serde(default = "default_negative_scale")]
    pub negative_scale: f32,

    #[serde(default)]
    pub action_weights: ActionWeights,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            base_rate: default_base_rate(),
            min_rate: default_min_rate(),
            half_life: default_half_life(),
            negative_scale: default_negative_scale(),
            action_weights: ActionWeights::default(),
        }
    }
}

fn default_base_rate() -> f32 {
    0.5
}

fn default_min_rate() -> f32 {
    0.02
}

fn default_half_life() -> f32 {
    10.0
}

fn default_negative_scale() -> f32 {
    0.3
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    /// Result size when a request does not name one
    #[serde(default = "default_result_size")]
    pub default_result_size: usize,

    /// Deadline for a ranking request in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Candidates kept by the catalog-scan fallback after ordering by emotion match
    #[serde(default = "default_fallback_scan_limit")]
    pub fallback_scan_limit: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_result_size: default_result_size(),
            timeout_ms: default_timeout_ms(),
            fallback_scan_limit: default_fallback_scan_limit(),
        }
    }
}

fn default_result_size() -> usize {
    20
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_fallback_scan_limit() -> usize {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the index snapshot and the profile database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base file name of the index snapshot
    #[serde(default = "default_snapshot_name")]
    pub snapshot_name: String,

    /// File name of the profile database inside `data_dir`
    #[serde(default = "default_profile_db")]
    pub profile_db: String,

    /// Persist each profile right after it changes
    #[serde(default = "default_write_through")]
    pub write_through: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_name: default_snapshot_name(),
            profile_db: default_profile_db(),
            write_through: default_write_through(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_snapshot_name() -> String {
    "titles".to_string()
}

fn default_profile_db() -> String {
    "profiles.redb".to_string()
}

fn default_write_through() -> bool {
    true
}

impl StorageConfig {
    /// Path of the profile database file
    pub fn profile_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.profile_db)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8097
}

impl ServerConfig {
    /// Returns the socket address for binding the server
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Message(format!("invalid server address: {e}")))
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables should be prefixed with `RECO_` and use
    /// double underscores for nested values:
    /// - `RECO_EMBEDDING__DIMENSIONS` -> embedding.dimensions
    /// - `RECO_FUSION__CONTENT` -> fusion.content
    /// - `RECO_SERVER__PORT` -> server.port
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("RECO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fusion = &self.fusion;
        let weights = [fusion.emotion, fusion.content, fusion.collaborative];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Message(
                "fusion weights must be non-negative".to_string(),
            ));
        }
        let sum: f32 = weights.iter().sum();
        if (sum - 1.0).abs() > 0.01 {
            return Err(ConfigError::Message(format!(
                "fusion weights must sum to 1, got {sum:.3}"
            )));
        }
        if !(0.0..=1.0).contains(&fusion.co_interaction) {
            return Err(ConfigError::Message(
                "fusion.co_interaction must be within [0, 1]".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Message(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        if self.ranking.default_result_size == 0 {
            return Err(ConfigError::Message(
                "ranking.default_result_size must be positive".to_string(),
            ));
        }
        if self.emotion.temperature <= 0.0 {
            return Err(ConfigError::Message(
                "emotion.temperature must be positive".to_string(),
            ));
        }
        if self.emotion.category_weights.values().any(|w| *w < 0.0) {
            return Err(ConfigError::Message(
                "emotion.category_weights must be non-negative".to_string(),
            ));
        }
        let feedback = &self.feedback;
        if !(feedback.min_rate > 0.0 && feedback.min_rate <= feedback.base_rate) {
            return Err(ConfigError::Message(
                "feedback rates must satisfy 0 < min_rate <= base_rate".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&feedback.negative_scale) {
            return Err(ConfigError::Message(
                "feedback.negative_scale must be within [0, 1)".to_string(),
            ));
        }
        if feedback.half_life <= 0.0 {
            return Err(ConfigError::Message(
                "feedback.half_life must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
