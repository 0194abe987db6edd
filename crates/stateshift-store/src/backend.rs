//! Storage backends for serialized store envelopes

use crate::error::StoreError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key-value storage for serialized snapshots
///
/// Values are opaque strings; the store owns their encoding.
pub trait StorageBackend: Send + Sync + Debug {
    /// Read the value for `key`, `None` when absent
    ///
    /// # Errors
    /// Returns error if the backend cannot be read
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write the value for `key`
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`; absent keys are not an error
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process storage
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create empty storage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if storage is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.write().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per store under a directory
///
/// Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `dir`; the directory is created on first write
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a key
    ///
    /// # Errors
    /// Returns error if the key is empty or could escape the directory
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let invalid = key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\', '\0']);
        if invalid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl StorageBackend for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(key, err)),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(key, e))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| StoreError::io(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(key, e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io(key, err)),
        }
    }
}
