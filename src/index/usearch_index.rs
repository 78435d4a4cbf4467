//! usearch-backed HNSW index.
//!
//! Every upsert adds the vector under a fresh usearch key and only then drops
//! the old key, so a failed add leaves the previous entry intact. Queries map
//! keys back through the id map and skip anything not in it.

use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::{debug, info, warn};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use super::snapshot::{
    file_sha256, read_manifest, temp_path, vector_digest, write_manifest, ManifestEntry,
    SnapshotManifest, SnapshotPaths, SNAPSHOT_FORMAT_VERSION,
};
use super::{IndexError, IndexHit, IndexStats, UpsertOutcome, VectorIndex};
use crate::config::IndexConfig;
use crate::math;
use crate::sync::RecoverableLock;

/// Index plus the id bookkeeping that must change together with it
struct Inner {
    index: Index,
    keys: HashMap<String, u64>,
    ids: HashMap<u64, String>,
    digests: HashMap<String, String>,
    next_key: u64,
    /// Slots consumed since this usearch index was created or loaded
    slots: usize,
}

impl Inner {
    fn empty(index: Index) -> Self {
        Self {
            index,
            keys: HashMap::new(),
            ids: HashMap::new(),
            digests: HashMap::new(),
            next_key: 0,
            slots: 0,
        }
    }

    fn ensure_capacity(&mut self, step: usize) -> Result<(), IndexError> {
        let capacity = self.index.capacity();
        if self.slots.max(self.index.size()) >= capacity {
            self.index
                .reserve(capacity + step)
                .map_err(|e| IndexError::Operation(format!("Failed to reserve: {e}")))?;
        }
        Ok(())
    }

    /// Add under a fresh key, growing once and retrying if the index is full
    fn add_fresh(&mut self, vector: &[f32], step: usize) -> Result<u64, IndexError> {
        self.ensure_capacity(step)?;
        let key = self.next_key;
        if let Err(first) = self.index.add(key, vector) {
            debug!(error = %first, "usearch add failed, growing capacity and retrying");
            let capacity = self.index.capacity();
            self.index
                .reserve(capacity + step)
                .map_err(|e| IndexError::Operation(format!("Failed to reserve: {e}")))?;
            self.index
                .add(key, vector)
                .map_err(|e| IndexError::Operation(e.to_string()))?;
        }
        self.next_key += 1;
        self.slots += 1;
        Ok(key)
    }

    fn forget(&mut self, key: u64) {
        self.ids.remove(&key);
        if let Err(e) = self.index.remove(key) {
            warn!(key, error = %e, "Failed to drop stale usearch key");
        }
    }
}

/// HNSW index with cosine metric over f32 vectors
pub struct UsearchIndex {
    dimensions: usize,
    connectivity: usize,
    expansion_add: usize,
    reserve_step: usize,
    search_effort: AtomicUsize,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for UsearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsearchIndex")
            .field("dimensions", &self.dimensions)
            .field("entries", &self.len())
            .field("search_effort", &self.search_effort())
            .finish()
    }
}

impl UsearchIndex {
    pub fn new(dimensions: usize, config: &IndexConfig) -> Result<Self, IndexError> {
        let reserve_step = config.reserve_step.max(1);
        let expansion_search = config.expansion_search.max(1);
        let index = Index::new(&IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search,
            multi: false,
        })
        .map_err(|e| IndexError::Operation(e.to_string()))?;
        index
            .reserve(reserve_step)
            .map_err(|e| IndexError::Operation(format!("Failed to reserve: {e}")))?;

        info!(dimensions, connectivity = config.connectivity, "Vector index initialized");
        Ok(Self {
            dimensions,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            reserve_step,
            search_effort: AtomicUsize::new(expansion_search),
            inner: RwLock::new(Inner::empty(index)),
        })
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.search_effort(),
            multi: false,
        }
    }

    fn new_usearch(&self) -> Result<Index, IndexError> {
        Index::new(&self.options()).map_err(|e| IndexError::Operation(e.to_string()))
    }

    fn empty_inner(&self) -> Result<Inner, IndexError> {
        let index = self.new_usearch()?;
        index
            .reserve(self.reserve_step)
            .map_err(|e| IndexError::Operation(format!("Failed to reserve: {e}")))?;
        Ok(Inner::empty(index))
    }

    fn check_vector(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::InvalidDimension {
                expected: self.dimensions,
                got: vector.len(),
            });
        }
        if !math::is_finite(vector) {
            return Err(IndexError::InvalidVector("non-finite component".to_string()));
        }
        if math::is_zero(vector) {
            return Err(IndexError::InvalidVector("zero vector".to_string()));
        }
        Ok(())
    }
}

impl VectorIndex for UsearchIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn upsert(&self, id: &str, vector: &[f32]) -> Result<UpsertOutcome, IndexError> {
        self.check_vector(vector)?;
        let digest = vector_digest(vector);

        let mut guard = self.inner.write_or_recover();
        let inner = &mut *guard;

        if inner.digests.get(id) == Some(&digest) {
            return Ok(UpsertOutcome::Unchanged);
        }

        let previous = inner.keys.get(id).copied();
        let key = inner.add_fresh(vector, self.reserve_step)?;
        if let Some(old) = previous {
            inner.forget(old);
        }
        inner.keys.insert(id.to_string(), key);
        inner.ids.insert(key, id.to_string());
        inner.digests.insert(id.to_string(), digest);

        Ok(if previous.is_some() {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn remove(&self, id: &str) -> Result<bool, IndexError> {
        let mut guard = self.inner.write_or_recover();
        let inner = &mut *guard;
        match inner.keys.remove(id) {
            Some(key) => {
                inner.digests.remove(id);
                inner.forget(key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError> {
        self.check_vector(vector)?;

        let inner = self.inner.read_or_recover();
        if k == 0 || inner.keys.is_empty() {
            return Ok(Vec::new());
        }

        let limit = k.min(inner.index.size());
        let matches = inner
            .index
            .search(vector, limit)
            .map_err(|e| IndexError::Operation(e.to_string()))?;

        let mut hits: Vec<IndexHit> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .filter_map(|(key, distance)| {
                inner.ids.get(key).map(|id| IndexHit {
                    title_id: id.clone(),
                    similarity: (1.0 - distance).clamp(-1.0, 1.0),
                })
            })
            .collect();
        drop(inner);

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.title_id.cmp(&b.title_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn contains(&self, id: &str) -> bool {
        self.inner.read_or_recover().keys.contains_key(id)
    }

    fn len(&self) -> usize {
        self.inner.read_or_recover().keys.len()
    }

    fn set_search_effort(&self, effort: usize) {
        let effort = effort.max(1);
        self.search_effort.store(effort, Ordering::Relaxed);
        self.inner
            .read_or_recover()
            .index
            .change_expansion_search(effort);
        debug!(effort, "Search effort changed");
    }

    fn search_effort(&self) -> usize {
        self.search_effort.load(Ordering::Relaxed)
    }

    fn rebuild(&self, entries: &[(String, Vec<f32>)]) -> Result<(), IndexError> {
        for (_, vector) in entries {
            self.check_vector(vector)?;
        }

        // Later duplicates win, matching repeated upserts
        let mut latest: HashMap<&str, &[f32]> = HashMap::with_capacity(entries.len());
        for (id, vector) in entries {
            latest.insert(id.as_str(), vector.as_slice());
        }
        let mut ordered: Vec<(&str, &[f32])> = latest.into_iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(b.0));

        let mut fresh = self.empty_inner()?;
        fresh
            .index
            .reserve(ordered.len().max(self.reserve_step))
            .map_err(|e| IndexError::Operation(format!("Failed to reserve: {e}")))?;
        for (id, vector) in ordered {
            let key = fresh.add_fresh(vector, self.reserve_step)?;
            fresh.keys.insert(id.to_string(), key);
            fresh.ids.insert(key, id.to_string());
            fresh.digests.insert(id.to_string(), vector_digest(vector));
        }

        let count = fresh.keys.len();
        *self.inner.write_or_recover() = fresh;
        info!(entries = count, "Vector index rebuilt");
        Ok(())
    }

    fn persist(&self, paths: &SnapshotPaths, fingerprint: &str) -> Result<(), IndexError> {
        if let Some(parent) = paths.index.parent() {
            fs::create_dir_all(parent)?;
        }

        // Read lock keeps upserts out for the whole snapshot
        let inner = self.inner.read_or_recover();

        let tmp_index = temp_path(&paths.index);
        let tmp_index_str = tmp_index.to_string_lossy().into_owned();
        inner
            .index
            .save(&tmp_index_str)
            .map_err(|e| IndexError::Operation(format!("Failed to save index: {e}")))?;
        let index_sha256 = file_sha256(&tmp_index)?;

        let mut entries: Vec<ManifestEntry> = inner
            .keys
            .iter()
            .map(|(id, key)| ManifestEntry {
                title_id: id.clone(),
                key: *key,
                vector_digest: inner.digests.get(id).cloned().unwrap_or_default(),
            })
            .collect();
        entries.sort_by(|a, b| a.title_id.cmp(&b.title_id));

        let manifest = SnapshotManifest {
            format_version: SNAPSHOT_FORMAT_VERSION,
            dimensions: self.dimensions,
            fingerprint: fingerprint.to_string(),
            entries,
            next_key: inner.next_key,
            index_sha256,
        };

        fs::rename(&tmp_index, &paths.index)?;
        write_manifest(&paths.manifest, &manifest)?;

        info!(
            entries = manifest.entries.len(),
            path = %paths.index.display(),
            "Index snapshot persisted"
        );
        Ok(())
    }

    fn load(&self, paths: &SnapshotPaths, fingerprint: &str) -> Result<usize, IndexError> {
        let manifest = read_manifest(&paths.manifest)?;
        manifest.verify(self.dimensions, fingerprint)?;

        if !paths.index.exists() {
            return Err(IndexError::Corruption(format!(
                "index file {} is missing",
                paths.index.display()
            )));
        }
        let checksum = file_sha256(&paths.index)
            .map_err(|e| IndexError::Corruption(format!("unreadable index file: {e}")))?;
        if checksum != manifest.index_sha256 {
            return Err(IndexError::Corruption(
                "index file checksum does not match manifest".to_string(),
            ));
        }

        let index = self.new_usearch()?;
        index
            .load(paths.index.to_string_lossy().as_ref())
            .map_err(|e| IndexError::Corruption(format!("Failed to load index: {e}")))?;
        if index.dimensions() != self.dimensions {
            return Err(IndexError::Corruption(format!(
                "index file has {} dimensions",
                index.dimensions()
            )));
        }
        if index.size() != manifest.entries.len() {
            return Err(IndexError::Corruption(format!(
                "index holds {} vectors but manifest lists {}",
                index.size(),
                manifest.entries.len()
            )));
        }
        index.change_expansion_search(self.search_effort());

        let mut keys = HashMap::with_capacity(manifest.entries.len());
        let mut ids = HashMap::with_capacity(manifest.entries.len());
        let mut digests = HashMap::with_capacity(manifest.entries.len());
        for entry in manifest.entries {
            if keys.insert(entry.title_id.clone(), entry.key).is_some()
                || ids.insert(entry.key, entry.title_id.clone()).is_some()
            {
                return Err(IndexError::Corruption(format!(
                    "duplicate manifest entry for {}",
                    entry.title_id
                )));
            }
            digests.insert(entry.title_id, entry.vector_digest);
        }

        let count = keys.len();
        let slots = index.size();
        *self.inner.write_or_recover() = Inner {
            index,
            keys,
            ids,
            digests,
            next_key: manifest.next_key,
            slots,
        };

        info!(entries = count, path = %paths.index.display(), "Index snapshot loaded");
        Ok(count)
    }

    fn stats(&self) -> IndexStats {
        let inner = self.inner.read_or_recover();
        IndexStats {
            entries: inner.keys.len(),
            dimensions: self.dimensions,
            capacity: inner.index.capacity(),
            search_effort: self.search_effort(),
        }
    }
}
