//! Last-good wait-time list, persisted in the key-value store
//!
//! Exactly one entry exists at a time: payload JSON under `cached_wait_times`
//! and the write time (epoch ms) under `cache_timestamp`. Each write
//! overwrites both keys in one batch.

use crate::domain::attraction::AttractionWaitTime;
use crate::io::store::{Edit, KeyValueStore, StoreError, StoredValue};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub const CACHE_KEY: &str = "cached_wait_times";
pub const CACHE_TIMESTAMP_KEY: &str = "cache_timestamp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub payload: Vec<AttractionWaitTime>,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cached payload is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct WaitTimeCache {
    store: Arc<dyn KeyValueStore>,
    /// Newest timestamp written by this process
    last_stored: Mutex<Option<DateTime<Utc>>>,
}

impl WaitTimeCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, last_stored: Mutex::new(None) }
    }

    /// Overwrite the entry with `items`, stamped now
    pub fn store(&self, items: &[AttractionWaitTime]) -> Result<DateTime<Utc>, CacheError> {
        self.store_at(items, Utc::now())
    }

    /// Overwrite the entry with `items`. The stamp is kept at millisecond
    /// precision (what the store holds) and never goes backwards within one
    /// process, even if the wall clock does.
    pub fn store_at(&self, items: &[AttractionWaitTime], now: DateTime<Utc>) -> Result<DateTime<Utc>, CacheError> {
        let now = now.trunc_subsecs(3);
        let mut last_stored = self.last_stored.lock();
        let stored_at = match *last_stored {
            Some(last) if last > now => last,
            _ => now,
        };

        let payload = serde_json::to_string(items).map_err(StoreError::from)?;
        self.store.apply(vec![
            Edit::put(CACHE_KEY, StoredValue::Text(payload)),
            Edit::put(CACHE_TIMESTAMP_KEY, StoredValue::Number(stored_at.timestamp_millis())),
        ])?;

        *last_stored = Some(stored_at);
        debug!(count = %items.len(), stored_at = %stored_at, "cache_stored");
        Ok(stored_at)
    }

    /// `Ok(None)` when nothing was ever stored
    pub fn load(&self) -> Result<Option<CacheEntry>, CacheError> {
        let Some(payload) = self.store.get_string(CACHE_KEY)? else {
            return Ok(None);
        };

        let payload: Vec<AttractionWaitTime> =
            serde_json::from_str(&payload).map_err(|e| CacheError::Corrupt(e.to_string()))?;

        // A payload without a stamp is as old as it gets
        let millis = self.store.get_i64(CACHE_TIMESTAMP_KEY)?.unwrap_or(0);
        let stored_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| CacheError::Corrupt(format!("invalid timestamp {}", millis)))?;

        Ok(Some(CacheEntry { payload, stored_at }))
    }

    /// Drop the entry (both keys)
    pub fn clear(&self) -> Result<(), CacheError> {
        self.store.apply(vec![Edit::remove(CACHE_KEY), Edit::remove(CACHE_TIMESTAMP_KEY)])?;
        debug!("cache_cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::MemoryStore;
    use chrono::Duration;

    fn items() -> Vec<AttractionWaitTime> {
        vec![
            AttractionWaitTime::new("34", "Taron", 80, "opened"),
            AttractionWaitTime::new("12", "Black Mamba", 35, "opened"),
        ]
    }

    #[test]
    fn test_load_empty() {
        let cache = WaitTimeCache::new(Arc::new(MemoryStore::new()));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_store_then_load() {
        let cache = WaitTimeCache::new(Arc::new(MemoryStore::new()));
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let stored_at = cache.store_at(&items(), now).unwrap();
        assert_eq!(stored_at, now);

        let entry = cache.load().unwrap().unwrap();
        assert_eq!(entry.payload, items());
        assert_eq!(entry.stored_at, now);
    }

    #[test]
    fn test_returned_stamp_matches_loaded_stamp() {
        let cache = WaitTimeCache::new(Arc::new(MemoryStore::new()));
        let stored_at = cache.store(&items()).unwrap();
        assert_eq!(cache.load().unwrap().unwrap().stored_at, stored_at);
    }

    #[test]
    fn test_store_overwrites_previous_entry() {
        let cache = WaitTimeCache::new(Arc::new(MemoryStore::new()));
        cache.store(&items()).unwrap();
        let replacement = vec![AttractionWaitTime::new("7", "Chiapas", 5, "opened")];
        cache.store(&replacement).unwrap();
        assert_eq!(cache.load().unwrap().unwrap().payload, replacement);
    }

    #[test]
    fn test_stored_at_is_monotonic() {
        let cache = WaitTimeCache::new(Arc::new(MemoryStore::new()));
        let later = Utc.timestamp_millis_opt(1_700_000_100_000).unwrap();
        let earlier = later - Duration::minutes(10);

        cache.store_at(&items(), later).unwrap();
        let stamped = cache.store_at(&items(), earlier).unwrap();
        assert_eq!(stamped, later);
        assert_eq!(cache.load().unwrap().unwrap().stored_at, later);
    }

    #[test]
    fn test_corrupt_payload() {
        let store = Arc::new(MemoryStore::new());
        store.put(CACHE_KEY, StoredValue::Text("{broken".to_string())).unwrap();
        let cache = WaitTimeCache::new(store);
        assert!(matches!(cache.load(), Err(CacheError::Corrupt(_))));
    }

    #[test]
    fn test_clear_removes_both_keys() {
        let store = Arc::new(MemoryStore::new());
        let cache = WaitTimeCache::new(store.clone());
        cache.store(&items()).unwrap();
        cache.clear().unwrap();
        assert!(store.get(CACHE_KEY).unwrap().is_none());
        assert!(store.get(CACHE_TIMESTAMP_KEY).unwrap().is_none());
        assert!(cache.load().unwrap().is_none());
    }
}
