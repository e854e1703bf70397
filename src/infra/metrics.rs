//! Lock-free metrics collection and periodic reporting
//!
//! Counters are plain atomics updated from the fetch and alert paths.
//! All atomics use Relaxed ordering; these are statistical counters only
//! and must not be used for coordination.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Fetch latency bucket boundaries (milliseconds)
/// Buckets: ≤50, ≤100, ≤250, ≤500, ≤1000, ≤2500, ≤5000, ≤10000, >10000
pub const FETCH_BUCKET_BOUNDS: [u64; 8] = [50, 100, 250, 500, 1000, 2500, 5000, 10000];
pub const FETCH_NUM_BUCKETS: usize = 9;

#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    FETCH_BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    /// Network fetches that returned a decoded list
    fetches_ok: AtomicU64,
    /// Network fetches that failed (timeout, status, decode)
    fetches_failed: AtomicU64,
    /// Failed fetches answered from the cache
    cache_fallbacks: AtomicU64,
    /// Non-forced fetches answered from a fresh cache entry
    cache_fresh_hits: AtomicU64,
    /// Best-effort cache writes that failed
    cache_write_failures: AtomicU64,
    /// Corrupt cache entries that were cleared
    cache_corrupt: AtomicU64,
    /// Alert checks started
    checks_run: AtomicU64,
    /// Alert checks that could not obtain wait times
    checks_failed: AtomicU64,
    /// Alerts dispatched and removed
    alerts_fired: AtomicU64,
    fetch_latency_buckets: [AtomicU64; FETCH_NUM_BUCKETS],
    fetch_latency_sum_ms: AtomicU64,
    fetch_latency_max_ms: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_fetch_ok(&self, latency_ms: u64) {
        self.fetches_ok.fetch_add(1, Ordering::Relaxed);
        self.record_fetch_latency(latency_ms);
    }

    #[inline]
    pub fn record_fetch_failed(&self, latency_ms: u64) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
        self.record_fetch_latency(latency_ms);
    }

    fn record_fetch_latency(&self, latency_ms: u64) {
        self.fetch_latency_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
        self.fetch_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.fetch_latency_max_ms, latency_ms);
    }

    #[inline]
    pub fn record_cache_fallback(&self) {
        self.cache_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_fresh_hit(&self) {
        self.cache_fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_write_failure(&self) {
        self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_corrupt(&self) {
        self.cache_corrupt.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_check(&self) {
        self.checks_run.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_check_failed(&self) {
        self.checks_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alerts_fired(&self, count: u64) {
        self.alerts_fired.fetch_add(count, Ordering::Relaxed);
    }

    /// Snapshot of all counters (cumulative, nothing is reset)
    pub fn report(&self) -> MetricsSummary {
        let fetches_ok = self.fetches_ok.load(Ordering::Relaxed);
        let fetches_failed = self.fetches_failed.load(Ordering::Relaxed);
        let total = fetches_ok + fetches_failed;
        let sum = self.fetch_latency_sum_ms.load(Ordering::Relaxed);
        let mut fetch_latency_buckets = [0u64; FETCH_NUM_BUCKETS];
        for (slot, bucket) in fetch_latency_buckets.iter_mut().zip(self.fetch_latency_buckets.iter()) {
            *slot = bucket.load(Ordering::Relaxed);
        }

        MetricsSummary {
            fetches_ok,
            fetches_failed,
            cache_fallbacks: self.cache_fallbacks.load(Ordering::Relaxed),
            cache_fresh_hits: self.cache_fresh_hits.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            cache_corrupt: self.cache_corrupt.load(Ordering::Relaxed),
            checks_run: self.checks_run.load(Ordering::Relaxed),
            checks_failed: self.checks_failed.load(Ordering::Relaxed),
            alerts_fired: self.alerts_fired.load(Ordering::Relaxed),
            avg_fetch_latency_ms: if total > 0 { sum / total } else { 0 },
            max_fetch_latency_ms: self.fetch_latency_max_ms.load(Ordering::Relaxed),
            fetch_latency_sum_ms: sum,
            fetch_latency_buckets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub fetches_ok: u64,
    pub fetches_failed: u64,
    pub cache_fallbacks: u64,
    pub cache_fresh_hits: u64,
    pub cache_write_failures: u64,
    pub cache_corrupt: u64,
    pub checks_run: u64,
    pub checks_failed: u64,
    pub alerts_fired: u64,
    pub avg_fetch_latency_ms: u64,
    pub max_fetch_latency_ms: u64,
    pub fetch_latency_sum_ms: u64,
    pub fetch_latency_buckets: [u64; FETCH_NUM_BUCKETS],
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            fetches_ok = %self.fetches_ok,
            fetches_failed = %self.fetches_failed,
            cache_fallbacks = %self.cache_fallbacks,
            cache_fresh_hits = %self.cache_fresh_hits,
            cache_write_failures = %self.cache_write_failures,
            cache_corrupt = %self.cache_corrupt,
            checks_run = %self.checks_run,
            checks_failed = %self.checks_failed,
            alerts_fired = %self.alerts_fired,
            avg_fetch_ms = %self.avg_fetch_latency_ms,
            max_fetch_ms = %self.max_fetch_latency_ms,
            "metrics"
        );
    }
}
