//! Durable profile and interaction storage using redb.
//!
//! Profiles are stored one record per user, MessagePack-encoded. Interaction
//! events are appended under a monotonically increasing sequence number so the
//! log can be replayed in arrival order after a restart.

use std::path::Path;

use redb::{Database, DatabaseError, ReadableTable, ReadableTableMetadata, TableDefinition};
use thiserror::Error;
use tracing::{debug, info};

use super::UserTasteProfile;
use crate::history::InteractionEvent;

/// Table of profiles keyed by user id
const PROFILES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("profiles");

/// Append-only table of interaction events keyed by sequence number
const INTERACTIONS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("interactions");

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Database creation error: {0}")]
    DatabaseCreation(#[from] DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// redb-backed store for profiles and the interaction log
pub struct ProfileRepository {
    db: Database,
}

impl std::fmt::Debug for ProfileRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileRepository").finish_non_exhaustive()
    }
}

impl ProfileRepository {
    /// Create or open the profile database
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(db_path)?;

        // Ensure tables exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PROFILES_TABLE)?;
            let _ = write_txn.open_table(INTERACTIONS_TABLE)?;
        }
        write_txn.commit()?;

        info!(db_path = %db_path.display(), "Profile repository opened");
        Ok(Self { db })
    }

    pub fn save(&self, profile: &UserTasteProfile) -> Result<(), RepositoryError> {
        let data = rmp_serde::to_vec_named(profile)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROFILES_TABLE)?;
            table.insert(profile.user_id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;

        debug!(user_id = %profile.user_id, version = profile.version, "Profile saved");
        Ok(())
    }

    /// Save many profiles in one transaction
    pub fn save_all<'a>(
        &self,
        profiles: impl IntoIterator<Item = &'a UserTasteProfile>,
    ) -> Result<usize, RepositoryError> {
        let write_txn = self.db.begin_write()?;
        let mut count = 0;
        {
            let mut table = write_txn.open_table(PROFILES_TABLE)?;
            for profile in profiles {
                let data = rmp_serde::to_vec_named(profile)
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
                table.insert(profile.user_id.as_str(), data.as_slice())?;
                count += 1;
            }
        }
        write_txn.commit()?;
        Ok(count)
    }

    pub fn get(&self, user_id: &str) -> Result<Option<UserTasteProfile>, RepositoryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROFILES_TABLE)?;

        match table.get(user_id)? {
            Some(data) => {
                let profile: UserTasteProfile = rmp_serde::from_slice(data.value())
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    pub fn profile_count(&self) -> Result<usize, RepositoryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROFILES_TABLE)?;
        Ok(table.len()? as usize)
    }

    /// Append an interaction event after the last stored one
    pub fn append_event(&self, event: &InteractionEvent) -> Result<u64, RepositoryError> {
        let data = rmp_serde::to_vec_named(event)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let write_txn = self.db.begin_write()?;
        let seq;
        {
            let mut table = write_txn.open_table(INTERACTIONS_TABLE)?;
            seq = match table.last()? {
                Some((key, _)) => key.value() + 1,
                None => 0,
            };
            table.insert(seq, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(seq)
    }

    /// All stored events in arrival order
    pub fn load_events(&self) -> Result<Vec<InteractionEvent>, RepositoryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(INTERACTIONS_TABLE)?;

        let mut events = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let event: InteractionEvent = rmp_serde::from_slice(value.value())
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            events.push(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ActionKind;
    use tempfile::TempDir;

    fn create_test_repository() -> (ProfileRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let repo = ProfileRepository::open(temp_dir.path().join("profiles.redb")).unwrap();
        (repo, temp_dir)
    }

    #[test]
    fn test_save_and_get() {
        let (repo, _temp) = create_test_repository();
        let mut profile = UserTasteProfile::cold("u1", 3);
        profile.preference = vec![0.1, 0.2, 0.3];
        profile.genre_affinity.insert("drama".to_string(), 1.5);
        profile.update_count = 4;

        repo.save(&profile).unwrap();
        assert_eq!(repo.get("u1").unwrap(), Some(profile));
        assert_eq!(repo.get("missing").unwrap(), None);
        assert_eq!(repo.profile_count().unwrap(), 1);
    }

    #[test]
    fn test_save_all_overwrites() {
        let (repo, _temp) = create_test_repository();
        let profiles = [UserTasteProfile::cold("a", 2), UserTasteProfile::cold("b", 2)];
        assert_eq!(repo.save_all(profiles.iter()).unwrap(), 2);
        assert_eq!(repo.save_all(profiles.iter().take(1)).unwrap(), 1);
        assert_eq!(repo.profile_count().unwrap(), 2);
    }

    #[test]
    fn test_events_keep_arrival_order() {
        let (repo, _temp) = create_test_repository();
        let first = InteractionEvent::new("u", "t1", ActionKind::Liked, 1.0);
        let second = InteractionEvent::new("u", "t0", ActionKind::Viewed, 0.5);
        assert_eq!(repo.append_event(&first).unwrap(), 0);
        assert_eq!(repo.append_event(&second).unwrap(), 1);
        assert_eq!(repo.load_events().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("profiles.redb");
        {
            let repo = ProfileRepository::open(&path).unwrap();
            repo.save(&UserTasteProfile::cold("u", 2)).unwrap();
            repo.append_event(&InteractionEvent::new("u", "t", ActionKind::Skipped, 1.0))
                .unwrap();
        }
        let repo = ProfileRepository::open(&path).unwrap();
        assert!(repo.get("u").unwrap().is_some());
        assert_eq!(repo.load_events().unwrap().len(), 1);
    }
}
