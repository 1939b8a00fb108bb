use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::cache::key::QuerySignature;
use crate::utils::validation::validate_dataset_id;

/// Name of the per-dataset index file
pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to persist cache file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Dataset id '{0}' cannot be used as a cache key")]
    InvalidDatasetId(String),

    #[error("Cache lock poisoned")]
    Poisoned,
}

/// Key → blob store with a key → location index
pub trait CacheStore: Send + Sync {
    /// Fetch the blob stored for a signature, if any.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store cannot be read.
    fn get(&self, dataset_id: &str, signature: &QuerySignature)
        -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a blob, replacing any previous one for the signature.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store cannot be written.
    fn put(&self, dataset_id: &str, signature: &QuerySignature, blob: &[u8])
        -> Result<(), CacheError>;
}

/// Index entry pointing a signature at its blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Blob path relative to the cache root
    pub location: String,
    pub created_at: DateTime<Utc>,
}

/// Per-dataset index: signature → entry
pub type CacheIndex = BTreeMap<String, IndexEntry>;

/// Directory-backed cache.
///
/// ```text
/// <root>/<dataset_id>/index.json
/// <root>/<dataset_id>/<md5(signature)>.json
/// ```
///
/// Files are replaced atomically. Concurrent writers of the same signature
/// resolve as last-write-wins.
#[derive(Debug)]
pub struct FileCacheStore {
    root: PathBuf,
    index_lock: Mutex<()>,
}

impl FileCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_dir(&self, dataset_id: &str) -> Result<PathBuf, CacheError> {
        validate_dataset_id(dataset_id)
            .map_err(|_| CacheError::InvalidDatasetId(dataset_id.to_string()))?;
        Ok(self.root.join(dataset_id))
    }

    /// Load a dataset's index; a missing index is empty.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the index exists but cannot be read or parsed.
    pub fn load_index(&self, dataset_id: &str) -> Result<CacheIndex, CacheError> {
        let path = self.dataset_dir(dataset_id)?.join(INDEX_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CacheIndex::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path)?;
    Ok(())
}

impl CacheStore for FileCacheStore {
    fn get(
        &self,
        dataset_id: &str,
        signature: &QuerySignature,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let index = self.load_index(dataset_id)?;
        let Some(entry) = index.get(signature.as_str()) else {
            return Ok(None);
        };
        debug!(
            "Cache entry for {} created {}",
            signature, entry.created_at
        );
        Ok(Some(std::fs::read(self.root.join(&entry.location))?))
    }

    fn put(
        &self,
        dataset_id: &str,
        signature: &QuerySignature,
        blob: &[u8],
    ) -> Result<(), CacheError> {
        let dir = self.dataset_dir(dataset_id)?;
        std::fs::create_dir_all(&dir)?;

        let blob_name = signature.blob_name();
        write_atomic(&dir.join(&blob_name), blob)?;

        let _guard = self.index_lock.lock().map_err(|_| CacheError::Poisoned)?;
        let mut index = self.load_index(dataset_id)?;
        index.insert(
            signature.as_str().to_string(),
            IndexEntry {
                location: format!("{dataset_id}/{blob_name}"),
                created_at: Utc::now(),
            },
        );
        write_atomic(&dir.join(INDEX_FILE), &serde_json::to_vec_pretty(&index)?)
    }
}

/// In-process cache, mainly for tests and single-shot runs
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    blobs: Mutex<HashMap<(String, QuerySignature), Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(
        &self,
        dataset_id: &str,
        signature: &QuerySignature,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let blobs = self.blobs.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(blobs
            .get(&(dataset_id.to_string(), signature.clone()))
            .cloned())
    }

    fn put(
        &self,
        dataset_id: &str,
        signature: &QuerySignature,
        blob: &[u8],
    ) -> Result<(), CacheError> {
        let mut blobs = self.blobs.lock().map_err(|_| CacheError::Poisoned)?;
        blobs.insert((dataset_id.to_string(), signature.clone()), blob.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        let signature = QuerySignature::from("1&10&1&10&A&T&&HIT");

        assert!(store.get("ds1", &signature).unwrap().is_none());
        store.put("ds1", &signature, b"{\"exists\":true}").unwrap();

        let blob = store.get("ds1", &signature).unwrap().unwrap();
        assert_eq!(blob, b"{\"exists\":true}");

        // Scoped per dataset
        assert!(store.get("ds2", &signature).unwrap().is_none());

        let index = store.load_index("ds1").unwrap();
        let entry = &index[signature.as_str()];
        assert_eq!(entry.location, format!("ds1/{}", signature.blob_name()));
        assert!(dir.path().join(&entry.location).exists());
    }

    #[test]
    fn test_file_store_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        let signature = QuerySignature::from("sig");

        store.put("ds1", &signature, b"first").unwrap();
        store.put("ds1", &signature, b"second").unwrap();
        store.put("ds1", &QuerySignature::from("other"), b"third").unwrap();

        assert_eq!(store.get("ds1", &signature).unwrap().unwrap(), b"second");
        assert_eq!(store.load_index("ds1").unwrap().len(), 2);
    }

    #[test]
    fn test_file_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        let result = store.put("../escape", &QuerySignature::from("sig"), b"x");
        assert!(matches!(result, Err(CacheError::InvalidDatasetId(_))));
    }

    #[test]
    fn test_file_store_corrupt_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ds1")).unwrap();
        std::fs::write(dir.path().join("ds1").join(INDEX_FILE), "not json").unwrap();

        let store = FileCacheStore::new(dir.path());
        assert!(matches!(
            store.get("ds1", &QuerySignature::from("sig")),
            Err(CacheError::Serialization(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCacheStore::new();
        let signature = QuerySignature::from("sig");
        assert!(store.is_empty());
        store.put("ds1", &signature, b"blob").unwrap();
        assert_eq!(store.get("ds1", &signature).unwrap().unwrap(), b"blob");
        assert!(store.get("ds2", &signature).unwrap().is_none());
        assert_eq!(store.len(), 1);
    }
}
