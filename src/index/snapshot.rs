//! On-disk snapshot layout for the vector index.
//!
//! A snapshot is the usearch index file plus a bincode manifest carrying the
//! id map and a checksum of the index file. Both are written to temporary
//! files first and renamed into place, manifest last.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::IndexError;

/// Bumped whenever the manifest layout changes
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// File locations for one named snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub index: PathBuf,
    pub manifest: PathBuf,
    pub catalog: PathBuf,
}

impl SnapshotPaths {
    pub fn new(data_dir: &Path, name: &str) -> Self {
        Self {
            index: data_dir.join(format!("{name}.usearch")),
            manifest: data_dir.join(format!("{name}.manifest.bin")),
            catalog: data_dir.join(format!("{name}.catalog.msgpack")),
        }
    }

    /// True when both index files are present
    pub fn exists(&self) -> bool {
        self.index.exists() && self.manifest.exists()
    }
}

/// One indexed title as recorded in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub title_id: String,
    pub key: u64,
    /// Digest of the stored vector, used to skip identical upserts
    pub vector_digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: u32,
    pub dimensions: usize,
    /// Embedding template/model fingerprint the vectors were built with
    pub fingerprint: String,
    pub entries: Vec<ManifestEntry>,
    pub next_key: u64,
    /// SHA-256 of the usearch index file
    pub index_sha256: String,
}

impl SnapshotManifest {
    /// Check the manifest against the running configuration
    pub fn verify(&self, dimensions: usize, fingerprint: &str) -> Result<(), IndexError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(IndexError::Corruption(format!(
                "unsupported snapshot format version {}",
                self.format_version
            )));
        }
        if self.dimensions != dimensions {
            return Err(IndexError::Corruption(format!(
                "snapshot has {} dimensions, index expects {dimensions}",
                self.dimensions
            )));
        }
        if self.fingerprint != fingerprint {
            return Err(IndexError::Corruption(
                "snapshot was built with a different embedding template or model".to_string(),
            ));
        }
        if self.entries.iter().any(|e| e.key >= self.next_key) {
            return Err(IndexError::Corruption(
                "manifest key exceeds next key".to_string(),
            ));
        }
        Ok(())
    }
}

/// Hex SHA-256 of a file's contents
pub fn file_sha256(path: &Path) -> Result<String, IndexError> {
    let bytes = fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Hex SHA-256 of a vector's little-endian bytes
pub fn vector_digest(vector: &[f32]) -> String {
    let mut hasher = Sha256::new();
    for x in vector {
        hasher.update(x.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

pub fn write_manifest(path: &Path, manifest: &SnapshotManifest) -> Result<(), IndexError> {
    let bytes = bincode::serialize(manifest)
        .map_err(|e| IndexError::Serialization(e.to_string()))?;
    let tmp = temp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a manifest; anything unreadable counts as corruption
pub fn read_manifest(path: &Path) -> Result<SnapshotManifest, IndexError> {
    if !path.exists() {
        return Err(IndexError::SnapshotMissing(path.to_path_buf()));
    }
    let bytes = fs::read(path)
        .map_err(|e| IndexError::Corruption(format!("unreadable manifest: {e}")))?;
    bincode::deserialize(&bytes)
        .map_err(|e| IndexError::Corruption(format!("undecodable manifest: {e}")))
}

/// Sibling path used while a file is being written
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest() -> SnapshotManifest {
        SnapshotManifest {
            format_version: SNAPSHOT_FORMAT_VERSION,
            dimensions: 4,
            fingerprint: "fp".to_string(),
            entries: vec![ManifestEntry {
                title_id: "a".to_string(),
                key: 0,
                vector_digest: vector_digest(&[1.0, 0.0, 0.0, 0.0]),
            }],
            next_key: 1,
            index_sha256: String::new(),
        }
    }

    #[test]
    fn test_paths() {
        let paths = SnapshotPaths::new(Path::new("/data"), "titles");
        assert_eq!(paths.index, PathBuf::from("/data/titles.usearch"));
        assert_eq!(paths.manifest, PathBuf::from("/data/titles.manifest.bin"));
        assert_eq!(temp_path(&paths.index), PathBuf::from("/data/titles.usearch.tmp"));
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.bin");
        write_manifest(&path, &manifest()).unwrap();
        assert_eq!(read_manifest(&path).unwrap(), manifest());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_missing_and_garbage_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.bin");
        assert!(matches!(
            read_manifest(&path),
            Err(IndexError::SnapshotMissing(_))
        ));

        fs::write(&path, b"\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();
        assert!(matches!(read_manifest(&path), Err(IndexError::Corruption(_))));
    }

    #[test]
    fn test_verify_rejects_mismatch() {
        let m = manifest();
        assert!(m.verify(4, "fp").is_ok());
        assert!(matches!(m.verify(8, "fp"), Err(IndexError::Corruption(_))));
        assert!(matches!(m.verify(4, "other"), Err(IndexError::Corruption(_))));

        let mut bad_key = manifest();
        bad_key.next_key = 0;
        assert!(matches!(bad_key.verify(4, "fp"), Err(IndexError::Corruption(_))));
    }

    #[test]
    fn test_vector_digest_is_stable() {
        assert_eq!(vector_digest(&[1.0, 2.0]), vector_digest(&[1.0, 2.0]));
        assert_ne!(vector_digest(&[1.0, 2.0]), vector_digest(&[2.0, 1.0]));
    }
}
