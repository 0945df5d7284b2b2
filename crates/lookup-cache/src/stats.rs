//! Cache statistics tracking

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Statistics for cache performance monitoring
///
/// Callers get a read-only view; only the cache records events.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of valid cache hits
    hits: AtomicU64,
    /// Number of resolves that had to run the real query (or failed)
    misses: AtomicU64,
    /// Entries pushed out by the capacity bound
    evictions: AtomicU64,
    /// Entries removed by mutation-driven invalidation
    invalidations: AtomicU64,
    /// Debounced invalidation passes run
    invalidation_passes: AtomicU64,
    /// Entries found invalid on read
    stale_reads: AtomicU64,
    /// Completed sweeps
    sweeps: AtomicU64,
    /// Entries removed by sweeps
    swept: AtomicU64,
    /// Real queries that raised
    query_errors: AtomicU64,
    /// Current number of entries
    entry_count: AtomicU64,
    /// Unix time of the last completed sweep in milliseconds, 0 if none
    last_sweep_ms: AtomicU64,
}

impl CacheStats {
    /// Create new cache statistics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidation_pass(&self) {
        self.invalidation_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_read(&self) {
        self.stale_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_query_error(&self) {
        self.query_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep(&self, removed: u64) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.swept.fetch_add(removed, Ordering::Relaxed);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        // 0 means "never"; a clock before the epoch still counts as swept
        self.last_sweep_ms.store(now.max(1), Ordering::Relaxed);
    }

    pub(crate) fn set_entry_count(&self, count: u64) {
        self.entry_count.store(count, Ordering::Relaxed);
    }

    /// Get hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn invalidation_passes(&self) -> u64 {
        self.invalidation_passes.load(Ordering::Relaxed)
    }

    pub fn stale_reads(&self) -> u64 {
        self.stale_reads.load(Ordering::Relaxed)
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub fn swept(&self) -> u64 {
        self.swept.load(Ordering::Relaxed)
    }

    pub fn query_errors(&self) -> u64 {
        self.query_errors.load(Ordering::Relaxed)
    }

    /// Get current entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Time of the last completed sweep
    pub fn last_sweep(&self) -> Option<SystemTime> {
        match self.last_sweep_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(UNIX_EPOCH + Duration::from_millis(ms)),
        }
    }

    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Get total requests (hits + misses)
    pub fn total_requests(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Point-in-time copy for reporting
    pub fn snapshot(&self) -> StatsSnapshot {
        let last_sweep_ms = self.last_sweep_ms.load(Ordering::Relaxed);
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            hit_rate: self.hit_rate(),
            evictions: self.evictions(),
            invalidations: self.invalidations(),
            invalidation_passes: self.invalidation_passes(),
            stale_reads: self.stale_reads(),
            sweeps: self.sweeps(),
            swept: self.swept(),
            query_errors: self.query_errors(),
            entry_count: self.entry_count(),
            last_sweep_unix_ms: (last_sweep_ms != 0).then_some(last_sweep_ms),
        }
    }
}

/// Serializable copy of [`CacheStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub invalidations: u64,
    pub invalidation_passes: u64,
    pub stale_reads: u64,
    pub sweeps: u64,
    pub swept: u64,
    pub query_errors: u64,
    pub entry_count: u64,
    pub last_sweep_unix_ms: Option<u64>,
}
