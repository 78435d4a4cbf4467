//! The recommendation engine: owns every component and exposes the
//! operations the service surface maps onto.

use chrono::Utc;
use config::ConfigError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, Title, TitleCatalog, TitleRecord};
use crate::config::AppConfig;
use crate::embedding::text::affinity_text;
use crate::embedding::{
    build_embedder, format_title_text, template_fingerprint, validate_vector, Embedder,
    EmbeddingError,
};
use crate::emotion::{
    build_classifier, ClassificationError, Emotion, EmotionClassifier, EmotionVector,
};
use crate::history::{ActionKind, InteractionEvent, InteractionLog, MemoryInteractionLog};
use crate::index::snapshot::read_manifest;
use crate::index::{
    IndexError, IndexStats, SnapshotPaths, UpsertOutcome, UsearchIndex, VectorIndex,
};
use crate::profile::{
    FeedbackPolicy, FeedbackTarget, ProfileRepository, ProfileStore, ProfileStoreError,
    ProfileSummary, RepositoryError, UserTasteProfile,
};
use crate::ranker::{FusionError, FusionWeights, RankError, RankRequest, Ranker, Recommendations};

/// Errors building the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fusion configuration error: {0}")]
    Fusion(#[from] FusionError),

    #[error("Embedder error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Classifier error: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Profile repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Rebuild failed: {0}")]
    Ingest(#[from] IngestError),
}

/// Errors ingesting titles; these always surface to the caller
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid title record: {0}")]
    InvalidRecord(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Unknown title: {0}")]
    UnknownTitle(String),

    #[error("Feedback strength must be within [0, 1], got {0}")]
    InvalidStrength(f32),

    #[error("Invalid feedback: {0}")]
    InvalidRequest(String),

    #[error("Profile store error: {0}")]
    Store(#[from] ProfileStoreError),

    #[error("Interaction log error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors writing persisted state
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Profile store error: {0}")]
    Profiles(#[from] ProfileStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub title_id: String,
    pub outcome: IngestOutcome,
    /// Whether the emotion affinity was derived from the title text
    pub affinity_derived: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

impl From<UpsertOutcome> for IngestOutcome {
    fn from(outcome: UpsertOutcome) -> Self {
        match outcome {
            UpsertOutcome::Inserted => Self::Inserted,
            UpsertOutcome::Replaced => Self::Replaced,
            UpsertOutcome::Unchanged => Self::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildReport {
    pub titles: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistReport {
    pub titles: usize,
    pub index_entries: usize,
    pub profiles: usize,
}

/// How start-up state was restored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source", content = "titles")]
pub enum Restored {
    Snapshot(usize),
    Rebuilt(usize),
    Empty,
}

/// Engine-level counters for health output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub titles: usize,
    pub index: IndexStats,
    pub profiles_loaded: usize,
    /// Profiles in the database; `None` without one or when it cannot be read
    pub profiles_stored: Option<usize>,
    pub interactions: usize,
    pub classifier: String,
    pub embedder: String,
    pub fingerprint: String,
}

pub struct RecommendationEngine {
    config: AppConfig,
    embedder: Arc<dyn Embedder>,
    classifier: Arc<dyn EmotionClassifier>,
    index: Arc<dyn VectorIndex>,
    catalog: Arc<TitleCatalog>,
    profiles: Arc<ProfileStore>,
    log: Arc<MemoryInteractionLog>,
    repository: Option<Arc<ProfileRepository>>,
    policy: FeedbackPolicy,
    ranker: Ranker,
    fingerprint: String,
    snapshot: SnapshotPaths,
}

impl std::fmt::Debug for RecommendationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationEngine")
            .field("titles", &self.catalog.len())
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl RecommendationEngine {
    /// Engine with profiles and interactions persisted in the configured
    /// redb database. Stored interactions are replayed into the log.
    pub fn open(config: AppConfig) -> Result<Self, EngineError> {
        let repository = Arc::new(ProfileRepository::open(config.storage.profile_db_path())?);
        let engine = Self::build(config, Some(repository))?;
        if let Some(repo) = &engine.repository {
            let events = repo.load_events()?;
            let count = events.len();
            for event in events {
                engine.log.append(event);
            }
            info!(interactions = count, "Interaction log restored");
        }
        Ok(engine)
    }

    /// Engine keeping profiles and interactions in memory only
    pub fn in_memory(config: AppConfig) -> Result<Self, EngineError> {
        Self::build(config, None)
    }

    fn build(
        config: AppConfig,
        repository: Option<Arc<ProfileRepository>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let weights = FusionWeights::from_config(&config.fusion);
        weights.validate()?;

        let embedder = build_embedder(&config.embedding)?;
        let classifier = build_classifier(&config.emotion, Arc::clone(&embedder))?;
        let dimensions = embedder.dimensions();
        let index: Arc<dyn VectorIndex> = Arc::new(UsearchIndex::new(dimensions, &config.index)?);
        let catalog = Arc::new(TitleCatalog::new());
        let profiles = Arc::new(match &repository {
            Some(repo) => ProfileStore::with_repository(
                dimensions,
                Arc::clone(repo),
                config.storage.write_through,
            ),
            None => ProfileStore::in_memory(dimensions),
        });
        let log = Arc::new(MemoryInteractionLog::new(
            config.feedback.action_weights.clone(),
        ));

        let ranker = Ranker {
            classifier: Arc::clone(&classifier),
            embedder: Arc::clone(&embedder),
            index: Arc::clone(&index),
            catalog: Arc::clone(&catalog),
            profiles: Arc::clone(&profiles),
            log: log.clone(),
            weights,
            index_config: config.index.clone(),
            config: config.ranking.clone(),
        };

        let fingerprint = template_fingerprint(
            embedder.model_id(),
            dimensions,
            config.embedding.leading_cast,
        );
        let snapshot = SnapshotPaths::new(&config.storage.data_dir, &config.storage.snapshot_name);

        info!(
            embedder = embedder.model_id(),
            classifier = classifier.name(),
            dimensions,
            fingerprint = %fingerprint,
            "Recommendation engine ready"
        );

        Ok(Self {
            policy: FeedbackPolicy::from_config(&config.feedback),
            config,
            embedder,
            classifier,
            index,
            catalog,
            profiles,
            log,
            repository,
            ranker,
            fingerprint,
            snapshot,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Identifier of the embedding model
    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn catalog(&self) -> &TitleCatalog {
        &self.catalog
    }

    pub fn classify_emotion(&self, text: &str) -> Result<EmotionVector, ClassificationError> {
        self.classifier.classify(text)
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embedder.embed(text)
    }

    /// Embed a title and make it retrievable.
    ///
    /// The catalog entry is written before the index entry, so every index
    /// hit resolves to a title.
    pub fn ingest_title(&self, record: TitleRecord) -> Result<IngestReport, IngestError> {
        let (title, affinity_derived) = self.prepare(record)?;
        let title_id = title.id().to_string();
        let embedding = title.embedding.clone();

        let previous = self.catalog.insert(title);
        let outcome = match self.index.upsert(&title_id, &embedding) {
            Ok(outcome) => outcome,
            Err(e) => {
                match previous {
                    Some(prev) => {
                        self.catalog.insert(Title::clone(&prev));
                    }
                    None => {
                        self.catalog.remove(&title_id);
                    }
                }
                return Err(e.into());
            }
        };

        debug!(title_id = %title_id, outcome = ?outcome, "Title ingested");
        Ok(IngestReport {
            title_id,
            outcome: outcome.into(),
            affinity_derived,
        })
    }

    /// Embed a record and resolve its emotion affinity
    fn prepare(&self, record: TitleRecord) -> Result<(Title, bool), IngestError> {
        record.validate().map_err(IngestError::InvalidRecord)?;

        let text = format_title_text(&record, self.config.embedding.leading_cast);
        let embedding = self.embedder.embed(&text)?;
        validate_vector(&embedding, self.embedder.dimensions())?;

        let supplied = record
            .emotion_affinity
            .filter(|a| !a.is_zero())
            .map(|a| a.normalized());
        let (emotion_affinity, derived) = match supplied {
            Some(affinity) => (affinity, false),
            None => {
                let affinity = match self.classifier.classify(&affinity_text(&record)) {
                    Ok(v) if !v.is_zero() => v,
                    Ok(_) => EmotionVector::one_hot(Emotion::Neutral),
                    Err(e) => {
                        warn!(title_id = %record.id, error = %e, "No emotion affinity derived, using neutral");
                        EmotionVector::one_hot(Emotion::Neutral)
                    }
                };
                (affinity, true)
            }
        };

        let title = Title {
            record,
            embedding,
            emotion_affinity,
            text_digest: hex::encode(Sha256::digest(text.as_bytes())),
            ingested_at: Utc::now(),
        };
        Ok((title, derived))
    }

    /// Remove a title from the index and the catalog
    pub fn remove_title(&self, title_id: &str) -> Result<bool, IndexError> {
        let in_index = self.index.remove(title_id)?;
        let in_catalog = self.catalog.remove(title_id).is_some();
        if in_index || in_catalog {
            info!(title_id, "Title removed");
        }
        Ok(in_index || in_catalog)
    }

    /// Re-embed every record and replace the catalog and index together
    pub fn rebuild_index(&self, records: Vec<TitleRecord>) -> Result<RebuildReport, IngestError> {
        let started = Instant::now();
        let mut titles: HashMap<String, Title> = HashMap::with_capacity(records.len());
        for record in records {
            let (title, _) = self.prepare(record)?;
            titles.insert(title.id().to_string(), title);
        }

        let entries: Vec<(String, Vec<f32>)> = titles
            .values()
            .map(|t| (t.id().to_string(), t.embedding.clone()))
            .collect();
        self.index.rebuild(&entries)?;
        let count = titles.len();
        self.catalog.replace_all(titles.into_values());

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(titles = count, elapsed_ms, "Index rebuilt from title records");
        Ok(RebuildReport {
            titles: count,
            elapsed_ms,
        })
    }

    /// Rebuild the index from the stored title vectors in the catalog
    pub fn rebuild_from_catalog(&self) -> Result<RebuildReport, IndexError> {
        let started = Instant::now();
        let dimensions = self.index.dimensions();
        let entries: Vec<(String, Vec<f32>)> = self
            .catalog
            .all()
            .iter()
            .filter(|t| t.embedding.len() == dimensions)
            .map(|t| (t.id().to_string(), t.embedding.clone()))
            .collect();
        self.index.rebuild(&entries)?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(titles = entries.len(), elapsed_ms, "Index rebuilt from catalog");
        Ok(RebuildReport {
            titles: entries.len(),
            elapsed_ms,
        })
    }

    pub fn rank(&self, request: &RankRequest) -> Result<Recommendations, RankError> {
        self.ranker.rank(request, None)
    }

    /// Rank on the blocking pool with the configured deadline
    pub async fn rank_with_timeout(
        &self,
        request: RankRequest,
    ) -> Result<Recommendations, RankError> {
        self.rank_within(request, Duration::from_millis(self.config.ranking.timeout_ms))
            .await
    }

    pub async fn rank_within(
        &self,
        request: RankRequest,
        timeout: Duration,
    ) -> Result<Recommendations, RankError> {
        let ranker = self.ranker.clone();
        let deadline = Instant::now() + timeout;
        let task = tokio::task::spawn_blocking(move || ranker.rank(&request, Some(deadline)));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RankError::Aborted(e.to_string())),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Ranking timed out");
                Err(RankError::Timeout(timeout))
            }
        }
    }

    /// Record an interaction and fold it into the user's profile.
    ///
    /// Stamping, the durable append, the log append and the profile update all
    /// happen under the user's gate, so the order profiles see events in is the
    /// timestamp order a replay uses. Timestamps are strictly increasing per
    /// user.
    pub fn apply_feedback(
        &self,
        user_id: &str,
        title_id: &str,
        action: ActionKind,
        strength: f32,
    ) -> Result<ProfileSummary, FeedbackError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(FeedbackError::InvalidRequest(
                "user id must not be empty".to_string(),
            ));
        }
        if !strength.is_finite() || !(0.0..=1.0).contains(&strength) {
            return Err(FeedbackError::InvalidStrength(strength));
        }
        let title = self
            .catalog
            .get(title_id)
            .ok_or_else(|| FeedbackError::UnknownTitle(title_id.to_string()))?;

        let profile = self.profiles.try_update(user_id, |current| {
            let mut event = InteractionEvent::new(user_id, title_id, action, strength);
            if let Some(last) = current.last_updated {
                if event.timestamp <= last {
                    event = event.at(last + chrono::Duration::microseconds(1));
                }
            }
            if let Some(repo) = &self.repository {
                repo.append_event(&event)?;
            }

            let timestamp = event.timestamp;
            self.log.append(event);
            Ok::<_, FeedbackError>(self.policy.apply(
                current,
                FeedbackTarget::from(&*title),
                action,
                strength,
                timestamp,
            ))
        })?;

        info!(
            user_id,
            title_id,
            action = %action,
            strength,
            version = profile.version,
            "Feedback applied"
        );
        Ok(profile.summary())
    }

    /// Rebuild a profile by replaying the user's full history
    pub fn recompute_profile(&self, user_id: &str) -> Result<ProfileSummary, FeedbackError> {
        let dimensions = self.profiles.dimensions();
        let profile = self.profiles.update(user_id, |_| {
            let events = self.log.events_for(user_id);
            let titles: HashMap<String, Arc<Title>> = events
                .iter()
                .filter_map(|e| self.catalog.get(&e.title_id).map(|t| (e.title_id.clone(), t)))
                .collect();
            self.policy.replay(user_id, dimensions, &events, |id| {
                titles.get(id).map(Arc::as_ref)
            })
        })?;

        info!(user_id, updates = profile.update_count, "Profile recomputed");
        Ok(profile.summary())
    }

    pub fn profile(&self, user_id: &str) -> Result<Arc<UserTasteProfile>, ProfileStoreError> {
        self.profiles.get(user_id)
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    pub fn set_search_effort(&self, effort: usize) {
        self.index.set_search_effort(effort);
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            titles: self.catalog.len(),
            index: self.index.stats(),
            profiles_loaded: self.profiles.loaded(),
            profiles_stored: self
                .repository
                .as_ref()
                .and_then(|repo| repo.profile_count().ok()),
            interactions: self.log.len(),
            classifier: self.classifier.name().to_string(),
            embedder: self.embedder.model_id().to_string(),
            fingerprint: self.fingerprint.clone(),
        }
    }

    /// Write the catalog, the index snapshot and all loaded profiles
    pub fn persist(&self) -> Result<PersistReport, StorageError> {
        fs::create_dir_all(&self.config.storage.data_dir)?;
        let titles = self.catalog.save_to(&self.snapshot.catalog)?;
        self.index.persist(&self.snapshot, &self.fingerprint)?;
        let profiles = self.profiles.persist_all()?;

        let report = PersistReport {
            titles,
            index_entries: self.index.len(),
            profiles,
        };
        info!(
            titles = report.titles,
            entries = report.index_entries,
            profiles = report.profiles,
            "State persisted"
        );
        Ok(report)
    }

    /// Restore the catalog and index from the snapshot.
    ///
    /// The manifest is checked against the catalog before anything is
    /// swapped in; on any error the live catalog and index are untouched.
    pub fn load(&self) -> Result<usize, IndexError> {
        let titles = self.read_catalog_snapshot()?;
        let manifest = read_manifest(&self.snapshot.manifest).map_err(|e| match e {
            IndexError::SnapshotMissing(path) => IndexError::Corruption(format!(
                "catalog snapshot has no index manifest at {}",
                path.display()
            )),
            other => other,
        })?;

        let indexed: HashSet<&str> = manifest
            .entries
            .iter()
            .map(|e| e.title_id.as_str())
            .collect();
        if indexed.len() != titles.len() || titles.iter().any(|t| !indexed.contains(t.id())) {
            return Err(IndexError::Corruption(format!(
                "index snapshot lists {} titles but catalog has {}",
                indexed.len(),
                titles.len()
            )));
        }

        let loaded = self.index.load(&self.snapshot, &self.fingerprint)?;
        self.catalog.replace_all(titles);
        info!(titles = loaded, "Snapshot loaded");
        Ok(loaded)
    }

    fn read_catalog_snapshot(&self) -> Result<Vec<Title>, IndexError> {
        if !self.snapshot.catalog.exists() {
            return Err(IndexError::SnapshotMissing(self.snapshot.catalog.clone()));
        }
        TitleCatalog::read_snapshot(&self.snapshot.catalog)
            .map_err(|e| IndexError::Corruption(format!("catalog snapshot unreadable: {e}")))
    }

    /// Load the snapshot; when it is unusable, re-embed the titles of the
    /// stored catalog and rebuild the index from them
    pub fn restore(&self) -> Result<Restored, EngineError> {
        match self.load() {
            Ok(n) => Ok(Restored::Snapshot(n)),
            Err(IndexError::SnapshotMissing(path)) => {
                info!(path = %path.display(), "No snapshot found, starting empty");
                Ok(Restored::Empty)
            }
            Err(e) => {
                warn!(error = %e, "Snapshot unusable, rebuilding index");
                let titles = match self.read_catalog_snapshot() {
                    Ok(titles) => titles,
                    Err(catalog_err) => {
                        warn!(error = %catalog_err, "Catalog snapshot unusable, starting empty");
                        self.index.rebuild(&[])?;
                        self.catalog.replace_all(Vec::new());
                        return Ok(Restored::Empty);
                    }
                };
                let records = titles.into_iter().map(|t| t.record).collect();
                let report = self.rebuild_index(records)?;
                Ok(Restored::Rebuilt(report.titles))
            }
        }
    }
}
