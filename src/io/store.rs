//! Local key-value persistence
//!
//! A small typed key-value store holding strings, numbers and string sets.
//! Writes are batched into `Edit` lists so that related keys (payload plus
//! timestamp) land together. At most one writer per store at a time;
//! last write wins.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Number(i64),
    Text(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Put(String, StoredValue),
    Remove(String),
}

impl Edit {
    pub fn put(key: &str, value: StoredValue) -> Self {
        Self::Put(key.to_string(), value)
    }

    pub fn remove(key: &str) -> Self {
        Self::Remove(key.to_string())
    }
}

fn apply_edits(map: &mut BTreeMap<String, StoredValue>, edits: Vec<Edit>) {
    for edit in edits {
        match edit {
            Edit::Put(key, value) => {
                map.insert(key, value);
            }
            Edit::Remove(key) => {
                map.remove(&key);
            }
        }
    }
}

/// Storage abstraction so the cache, alert and favorites paths can be
/// exercised against memory or disk.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;

    /// Apply all edits as one write
    fn apply(&self, edits: Vec<Edit>) -> Result<(), StoreError>;

    fn put(&self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        self.apply(vec![Edit::put(key, value)])
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.apply(vec![Edit::remove(key)])
    }

    /// `None` when absent or stored with another type
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(match self.get(key)? {
            Some(StoredValue::Text(s)) => Some(s),
            _ => None,
        })
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(match self.get(key)? {
            Some(StoredValue::Number(n)) => Some(n),
            _ => None,
        })
    }

    /// Empty when absent or stored with another type
    fn get_string_set(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(match self.get(key)? {
            Some(StoredValue::Set(set)) => set,
            _ => BTreeSet::new(),
        })
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn apply(&self, edits: Vec<Edit>) -> Result<(), StoreError> {
        apply_edits(&mut self.entries.lock(), edits);
        Ok(())
    }
}

/// Store backed by one JSON document on disk.
///
/// Every read goes to the file so separate processes (CLI and `watch`)
/// observe each other's writes. Writes go to a sibling temp file which is
/// then renamed over the document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "file_store_initialized");
        Self { path, write_lock: Mutex::new(()) }
    }

    fn read_all(&self) -> Result<BTreeMap<String, StoredValue>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                // An unreadable document is treated as empty; the next write replaces it
                warn!(path = %self.path.display(), error = %e, "file_store_unreadable");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, map: &BTreeMap<String, StoredValue>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(map)?;
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), bytes = %json.len(), "file_store_written");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn apply(&self, edits: Vec<Edit>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut map = self.read_all()?;
        apply_edits(&mut map, edits);
        self.write_all(&map)
    }
}
