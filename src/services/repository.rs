//! Wait-time repository: network first, last-good cache as fallback
//!
//! - A successful fetch is cached (best effort) and returned name-sorted.
//! - A failed fetch falls back to whatever cache entry exists, regardless
//!   of age. A corrupt entry is cleared and treated as absent.
//! - Without a usable entry the original network error is returned.
//!
//! Optionally, non-forced fetches may be answered from a cache entry
//! younger than `cache_ttl` without touching the network.

use crate::domain::attraction::{sort_by_name, AttractionWaitTime};
use crate::infra::metrics::Metrics;
use crate::io::api::{SourceError, WaitTimeSource};
use crate::services::cache::{CacheEntry, CacheError, WaitTimeCache};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where a returned list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Fresh from the API
    Network,
    /// API failed; last-good cache served instead
    CacheFallback,
    /// Non-forced fetch answered by a cache entry within the TTL
    CacheFresh,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Network => "network",
            DataSource::CacheFallback => "cache_fallback",
            DataSource::CacheFresh => "cache_fresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Sorted by name ascending (case-insensitive)
    pub items: Vec<AttractionWaitTime>,
    pub source: DataSource,
    /// Fetch time for network data, cache stamp otherwise
    pub stored_at: DateTime<Utc>,
}

impl FetchOutcome {
    pub fn from_cache(&self) -> bool {
        self.source != DataSource::Network
    }

    fn from_entry(entry: CacheEntry, source: DataSource) -> Self {
        let mut items = entry.payload;
        sort_by_name(&mut items);
        Self { items, source, stored_at: entry.stored_at }
    }
}

/// Log a swallowed cache write failure (cold path)
#[cold]
fn log_cache_write_failed(e: &CacheError) {
    error!(error = %e, "cache_write_failed");
}

pub struct WaitTimeRepository {
    source: Arc<dyn WaitTimeSource>,
    cache: WaitTimeCache,
    cache_ttl: Option<Duration>,
    metrics: Arc<Metrics>,
}

impl WaitTimeRepository {
    pub fn new(source: Arc<dyn WaitTimeSource>, cache: WaitTimeCache, metrics: Arc<Metrics>) -> Self {
        Self { source, cache, cache_ttl: None, metrics }
    }

    /// Enable the freshness window for non-forced fetches
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn cache(&self) -> &WaitTimeCache {
        &self.cache
    }

    /// Network first; cache only as a fallback
    pub async fn fetch(&self) -> Result<FetchOutcome, SourceError> {
        let start = Instant::now();

        match self.source.fetch().await {
            Ok(mut items) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                self.metrics.record_fetch_ok(latency_ms);

                let stored_at = match self.cache.store(&items) {
                    Ok(stored_at) => stored_at,
                    Err(e) => {
                        self.metrics.record_cache_write_failure();
                        log_cache_write_failed(&e);
                        Utc::now()
                    }
                };

                sort_by_name(&mut items);
                info!(count = %items.len(), latency_ms = %latency_ms, "waittimes_fetched");
                Ok(FetchOutcome { items, source: DataSource::Network, stored_at })
            }
            Err(network_error) => {
                self.metrics.record_fetch_failed(start.elapsed().as_millis() as u64);

                match self.load_usable_entry() {
                    Some(entry) => {
                        self.metrics.record_cache_fallback();
                        warn!(
                            error = %network_error,
                            count = %entry.payload.len(),
                            stored_at = %entry.stored_at,
                            "waittimes_served_from_cache"
                        );
                        Ok(FetchOutcome::from_entry(entry, DataSource::CacheFallback))
                    }
                    None => Err(network_error),
                }
            }
        }
    }

    /// Like `fetch`, but a non-forced call may be answered by a cache
    /// entry younger than the configured TTL
    pub async fn fetch_with(&self, force_refresh: bool) -> Result<FetchOutcome, SourceError> {
        if !force_refresh {
            if let Some(outcome) = self.fresh_entry(Utc::now()) {
                return Ok(outcome);
            }
        }
        self.fetch().await
    }

    fn fresh_entry(&self, now: DateTime<Utc>) -> Option<FetchOutcome> {
        let ttl = self.cache_ttl?;
        let entry = self.load_usable_entry()?;

        let age = now.signed_duration_since(entry.stored_at).to_std().unwrap_or(Duration::ZERO);
        if age > ttl {
            debug!(age_secs = %age.as_secs(), ttl_secs = %ttl.as_secs(), "cache_stale");
            return None;
        }

        self.metrics.record_cache_fresh_hit();
        debug!(age_secs = %age.as_secs(), count = %entry.payload.len(), "cache_fresh_hit");
        Some(FetchOutcome::from_entry(entry, DataSource::CacheFresh))
    }

    /// Read the cache entry; a corrupt one is cleared and reads as absent
    fn load_usable_entry(&self) -> Option<CacheEntry> {
        match self.cache.load() {
            Ok(entry) => entry,
            Err(CacheError::Corrupt(reason)) => {
                self.metrics.record_cache_corrupt();
                warn!(reason = %reason, "cache_corrupt_cleared");
                if let Err(e) = self.cache.clear() {
                    error!(error = %e, "cache_clear_failed");
                }
                None
            }
            Err(e) => {
                error!(error = %e, "cache_read_failed");
                None
            }
        }
    }
}
