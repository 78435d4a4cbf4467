//! Title records and the in-memory catalog of embedded titles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

use crate::emotion::EmotionVector;
use crate::sync::RecoverableLock;

/// Whether a title is a film or a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleKind {
    Movie,
    Series,
}

impl fmt::Display for TitleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Series => write!(f, "series"),
        }
    }
}

impl FromStr for TitleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" | "film" => Ok(Self::Movie),
            "series" | "tv" | "show" => Ok(Self::Series),
            other => Err(format!("unknown title kind: {other}")),
        }
    }
}

/// Descriptive metadata for a title as supplied by the catalog owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleRecord {
    pub id: String,
    pub kind: TitleKind,
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Cast in billing order
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub release_year: Option<u16>,
    /// Precomputed emotion affinity; derived at ingestion when absent
    #[serde(default)]
    pub emotion_affinity: Option<EmotionVector>,
}

impl TitleRecord {
    pub fn new(id: impl Into<String>, kind: TitleKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            synopsis: String::new(),
            genres: Vec::new(),
            cast: Vec::new(),
            keywords: Vec::new(),
            networks: Vec::new(),
            release_year: None,
            emotion_affinity: None,
        }
    }

    pub fn with_synopsis(mut self, synopsis: impl Into<String>) -> Self {
        self.synopsis = synopsis.into();
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cast<I, S>(mut self, cast: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cast = cast.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_networks<I, S>(mut self, networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.networks = networks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_release_year(mut self, year: u16) -> Self {
        self.release_year = Some(year);
        self
    }

    pub fn with_emotion_affinity(mut self, affinity: EmotionVector) -> Self {
        self.emotion_affinity = Some(affinity);
        self
    }

    /// Check the fields every title must carry
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("title id must not be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err(format!("title {} has no name", self.id));
        }
        Ok(())
    }
}

/// An ingested title: record plus its derived vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Title {
    pub record: TitleRecord,
    /// Normalized embedding of the formatted title text
    pub embedding: Vec<f32>,
    /// Affinity used for emotion matching (supplied or derived)
    pub emotion_affinity: EmotionVector,
    /// SHA-256 of the formatted text the embedding was computed from
    pub text_digest: String,
    pub ingested_at: DateTime<Utc>,
}

impl Title {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn kind(&self) -> TitleKind {
        self.record.kind
    }
}

/// Errors reading or writing the catalog snapshot
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// All embedded titles keyed by id.
///
/// Entries are immutable `Arc<Title>`s replaced wholesale, so readers never
/// observe a partially updated title.
#[derive(Debug, Default)]
pub struct TitleCatalog {
    titles: RwLock<HashMap<String, Arc<Title>>>,
}

impl TitleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the previous entry
    pub fn insert(&self, title: Title) -> Option<Arc<Title>> {
        let id = title.record.id.clone();
        self.titles.write_or_recover().insert(id, Arc::new(title))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Title>> {
        self.titles.read_or_recover().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Title>> {
        self.titles.write_or_recover().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.titles.read_or_recover().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.titles.read_or_recover().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every title, ordered by id
    pub fn all(&self) -> Vec<Arc<Title>> {
        let mut titles: Vec<Arc<Title>> = self.titles.read_or_recover().values().cloned().collect();
        titles.sort_by(|a, b| a.id().cmp(b.id()));
        titles
    }

    /// Swap the whole catalog in one step
    pub fn replace_all(&self, titles: impl IntoIterator<Item = Title>) {
        let map: HashMap<String, Arc<Title>> = titles
            .into_iter()
            .map(|t| (t.record.id.clone(), Arc::new(t)))
            .collect();
        *self.titles.write_or_recover() = map;
    }

    /// Write all titles as MessagePack via a temp file and rename
    pub fn save_to(&self, path: &Path) -> Result<usize, CatalogError> {
        let titles: Vec<Title> = self.all().iter().map(|t| Title::clone(t)).collect();
        let bytes = rmp_serde::to_vec_named(&titles)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), titles = titles.len(), "Catalog saved");
        Ok(titles.len())
    }

    /// Read titles written by `save_to`
    pub fn read_snapshot(path: &Path) -> Result<Vec<Title>, CatalogError> {
        let bytes = fs::read(path)?;
        Ok(rmp_serde::from_slice(&bytes)?)
    }
}
