//! Persistent key-value tier behind the list cache.
//!
//! Any medium with synchronous get/set semantics can back the cache. Two are
//! provided: [`MemoryKvStore`] for tests and ephemeral runs, and
//! [`FileKvStore`], one JSON document per key inside a directory.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::persist";
const FILE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),
    #[error("storage quota exceeded writing `{key}`: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { key: String, needed: u64, quota: u64 },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Heap-backed store with an optional byte quota.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<u64>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push keys plus values past `quota_bytes`.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "memory_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(rw_read(&self.entries, SOURCE, "memory_get").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "memory_set");

        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            let needed = (others + key.len() + value.len()) as u64;
            if needed > quota {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "memory_remove").remove(key);
        Ok(())
    }
}

/// Directory-backed store: each key maps to `<hex(key)>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written document.
pub struct FileKvStore {
    directory: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileKvStore {
    /// Open (creating if needed) a store rooted at `directory`.
    pub fn open(directory: impl Into<PathBuf>, quota_bytes: Option<u64>) -> Result<Self, StoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            quota_bytes,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{FILE_EXTENSION}", hex::encode(key.as_bytes())))
    }

    fn used_bytes_excluding(&self, skip: &Path) -> Result<u64, StoreError> {
        let mut total = 0;
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            let path = entry.path();
            if path == skip || path.extension().is_none_or(|ext| ext != FILE_EXTENSION) {
                continue;
            }
            total += entry.metadata()?.len();
        }
        Ok(total)
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);

        if let Some(quota) = self.quota_bytes {
            let needed = self.used_bytes_excluding(&path)? + value.len() as u64;
            if needed > quota {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota,
                });
            }
        }

        let staging = path.with_extension("tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}
