//! Approximate nearest-neighbour index over title embeddings.
//!
//! The ranker only sees the `VectorIndex` contract, so the HNSW backend can be
//! swapped without touching ranking code.

pub mod snapshot;
pub mod usearch_index;

pub use snapshot::{SnapshotManifest, SnapshotPaths};
pub use usearch_index::UsearchIndex;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Invalid vector dimension: expected {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Index snapshot is corrupted: {0}")]
    Corruption(String),

    #[error("Index snapshot not found at {0}")]
    SnapshotMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index operation failed: {0}")]
    Operation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// One query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    pub title_id: String,
    /// Cosine similarity, 1.0 for identical direction
    pub similarity: f32,
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// The stored vector was already identical
    Unchanged,
}

/// Index statistics for maintenance endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub entries: usize,
    pub dimensions: usize,
    pub capacity: usize,
    pub search_effort: usize,
}

/// Vector index contract.
///
/// `upsert` and `remove` are mutually exclusive with `persist`, `load` and
/// `rebuild`; queries run concurrently with each other and see every entry
/// either fully present or absent.
pub trait VectorIndex: Send + Sync {
    fn dimensions(&self) -> usize;

    /// Insert or replace the vector for `id`; never creates duplicates
    fn upsert(&self, id: &str, vector: &[f32]) -> Result<UpsertOutcome, IndexError>;

    /// Remove `id`, returning whether it was present
    fn remove(&self, id: &str) -> Result<bool, IndexError>;

    /// Up to `k` hits ordered by descending similarity, ties by id ascending
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError>;

    fn contains(&self, id: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Query-time search effort; higher values trade latency for recall
    fn set_search_effort(&self, effort: usize);

    fn search_effort(&self) -> usize;

    /// Replace every entry with `entries` in one atomic swap
    fn rebuild(&self, entries: &[(String, Vec<f32>)]) -> Result<(), IndexError>;

    fn persist(&self, paths: &SnapshotPaths, fingerprint: &str) -> Result<(), IndexError>;

    /// Restore a snapshot, returning the number of entries loaded
    fn load(&self, paths: &SnapshotPaths, fingerprint: &str) -> Result<usize, IndexError>;

    fn stats(&self) -> IndexStats;
}
