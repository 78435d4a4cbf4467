//! Concurrent profile store.
//!
//! Each user gets a slot holding the current profile behind an `ArcSwap`, so
//! rankers read a consistent snapshot without locking. Updates for one user
//! are serialized by that user's gate; different users never contend.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use super::repository::{ProfileRepository, RepositoryError};
use super::UserTasteProfile;
use crate::sync::RecoverableMutex;

#[derive(Debug, Error)]
pub enum ProfileStoreError {
    #[error("Profile repository error: {0}")]
    Repository(#[from] RepositoryError),
}

struct ProfileSlot {
    gate: Mutex<()>,
    current: ArcSwap<UserTasteProfile>,
}

pub struct ProfileStore {
    dimensions: usize,
    slots: DashMap<String, Arc<ProfileSlot>>,
    repository: Option<Arc<ProfileRepository>>,
    write_through: bool,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("dimensions", &self.dimensions)
            .field("loaded", &self.slots.len())
            .field("persistent", &self.repository.is_some())
            .finish()
    }
}

impl ProfileStore {
    /// Store without durable backing
    pub fn in_memory(dimensions: usize) -> Self {
        Self {
            dimensions,
            slots: DashMap::new(),
            repository: None,
            write_through: false,
        }
    }

    /// Store backed by a repository; profiles load lazily on first access
    pub fn with_repository(
        dimensions: usize,
        repository: Arc<ProfileRepository>,
        write_through: bool,
    ) -> Self {
        Self {
            dimensions,
            slots: DashMap::new(),
            repository: Some(repository),
            write_through,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of profiles currently held in memory
    pub fn loaded(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, user_id: &str) -> Result<Arc<ProfileSlot>, ProfileStoreError> {
        if let Some(slot) = self.slots.get(user_id) {
            return Ok(Arc::clone(slot.value()));
        }

        // Load outside the map shard lock; a racing loader's slot wins
        let initial = self.load_or_cold(user_id)?;
        let slot = self
            .slots
            .entry(user_id.to_string())
            .or_insert_with(|| {
                Arc::new(ProfileSlot {
                    gate: Mutex::new(()),
                    current: ArcSwap::from_pointee(initial),
                })
            })
            .value()
            .clone();
        Ok(slot)
    }

    fn load_or_cold(&self, user_id: &str) -> Result<UserTasteProfile, ProfileStoreError> {
        let stored = match &self.repository {
            Some(repo) => repo.get(user_id)?,
            None => None,
        };
        Ok(match stored {
            Some(profile) if profile.preference.len() == self.dimensions => profile,
            Some(profile) => {
                warn!(
                    user_id,
                    stored = profile.preference.len(),
                    expected = self.dimensions,
                    "Stored profile has a different dimensionality, starting cold"
                );
                UserTasteProfile::cold(user_id, self.dimensions)
            }
            None => UserTasteProfile::cold(user_id, self.dimensions),
        })
    }

    /// Current profile; cold if the user has none
    pub fn get(&self, user_id: &str) -> Result<Arc<UserTasteProfile>, ProfileStoreError> {
        Ok(self.slot(user_id)?.current.load_full())
    }

    /// Apply `update` under the user's gate and publish the result.
    ///
    /// With write-through enabled the new profile is saved before it becomes
    /// visible; a failed save leaves the previous profile in place.
    pub fn update<F>(&self, user_id: &str, update: F) -> Result<Arc<UserTasteProfile>, ProfileStoreError>
    where
        F: FnOnce(&UserTasteProfile) -> UserTasteProfile,
    {
        self.try_update(user_id, |current| Ok::<_, ProfileStoreError>(update(current)))
    }

    /// Fallible `update`; when `update` fails nothing is published.
    pub fn try_update<F, E>(&self, user_id: &str, update: F) -> Result<Arc<UserTasteProfile>, E>
    where
        F: FnOnce(&UserTasteProfile) -> Result<UserTasteProfile, E>,
        E: From<ProfileStoreError>,
    {
        let slot = self.slot(user_id)?;
        let _gate = slot.gate.lock_or_recover();

        let current = slot.current.load_full();
        let next = update(&current)?;

        if self.write_through {
            if let Some(repo) = &self.repository {
                repo.save(&next).map_err(ProfileStoreError::from)?;
            }
        }

        let next = Arc::new(next);
        slot.current.store(Arc::clone(&next));
        debug!(user_id, version = next.version, "Profile updated");
        Ok(next)
    }

    /// Save every in-memory profile; returns how many were written
    pub fn persist_all(&self) -> Result<usize, ProfileStoreError> {
        let Some(repo) = &self.repository else {
            return Ok(0);
        };
        let profiles: Vec<Arc<UserTasteProfile>> = self
            .slots
            .iter()
            .map(|entry| entry.value().current.load_full())
            .filter(|p| p.version > 0)
            .collect();
        Ok(repo.save_all(profiles.iter().map(|p| p.as_ref()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bump(profile: &UserTasteProfile) -> UserTasteProfile {
        let mut next = profile.clone();
        next.update_count += 1;
        next.version += 1;
        next.preference[0] += 0.1;
        next
    }

    #[test]
    fn test_unknown_user_is_cold() {
        let store = ProfileStore::in_memory(3);
        let profile = store.get("nobody").unwrap();
        assert!(profile.is_cold());
        assert_eq!(profile.preference.len(), 3);
    }

    #[test]
    fn test_update_publishes_new_snapshot() {
        let store = ProfileStore::in_memory(2);
        let before = store.get("u").unwrap();
        let after = store.update("u", bump).unwrap();
        assert_eq!(before.version, 0);
        assert_eq!(after.version, 1);
        assert_eq!(store.get("u").unwrap().version, 1);
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let store = Arc::new(ProfileStore::in_memory(2));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.update("u", bump).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("u").unwrap().version, 200);
    }

    #[test]
    fn test_write_through_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.redb");
        {
            let repo = Arc::new(ProfileRepository::open(&path).unwrap());
            let store = ProfileStore::with_repository(2, repo, true);
            store.update("u", bump).unwrap();
        }
        let repo = Arc::new(ProfileRepository::open(&path).unwrap());
        let store = ProfileStore::with_repository(2, repo, true);
        assert_eq!(store.get("u").unwrap().version, 1);
    }

    #[test]
    fn test_persist_all_without_write_through() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(ProfileRepository::open(dir.path().join("p.redb")).unwrap());
        let store = ProfileStore::with_repository(2, Arc::clone(&repo), false);
        store.update("a", bump).unwrap();
        store.get("cold").unwrap();
        assert!(repo.get("a").unwrap().is_none());

        assert_eq!(store.persist_all().unwrap(), 1);
        assert_eq!(repo.get("a").unwrap().unwrap().version, 1);
        assert!(repo.get("cold").unwrap().is_none());
    }

    #[test]
    fn test_mismatched_dimensions_start_cold() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(ProfileRepository::open(dir.path().join("p.redb")).unwrap());
        let mut old = UserTasteProfile::cold("u", 4);
        old.update_count = 3;
        repo.save(&old).unwrap();

        let store = ProfileStore::with_repository(2, repo, true);
        let profile = store.get("u").unwrap();
        assert_eq!(profile.preference.len(), 2);
        assert_eq!(profile.update_count, 0);
    }
}
