//! Lookup cache engine

use crate::config::CacheConfig;
use crate::debounce::Debouncer;
use crate::invalidation::{self, CacheInvalidator, InvalidationOutcome};
use crate::key::CacheKey;
use crate::metadata::{MetadataRecord, WeakMetadataStore};
use crate::observer::{AffectedIdentifiers, ChangeObserver, MutationSink};
use crate::result::CachedResult;
use crate::stats::{CacheStats, StatsSnapshot};
use crate::store::PrimaryStore;
use crate::sweeper::{SweepTarget, Sweeper, SWEEP_CHUNK};
use crate::validator;
use async_trait::async_trait;
use lookup_core::{Element, MutationRecord, QueryKind, QueryOutput, TreeHost};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;

/// Without a runtime to debounce on, a passive cache flushes once this many
/// records are waiting
pub const PENDING_FLUSH_THRESHOLD: usize = 1024;

/// Lifecycle of a [`QueryCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Active,
    /// Terminal: every operation is a no-op or returns empty
    Destroyed,
}

/// Memoizing front for the lookups of one tree
///
/// Results are demand-filled from the host and kept until a mutation that
/// may affect them arrives, a liveness check on read fails, or a sweep finds
/// them detached. Dropping the cache destroys it.
pub struct QueryCache {
    shared: Arc<Shared>,
}

struct Shared {
    host: Arc<dyn TreeHost>,
    config: CacheConfig,
    store: Mutex<PrimaryStore>,
    metadata: Mutex<WeakMetadataStore>,
    stats: Arc<CacheStats>,
    /// Records received since the last invalidation pass
    pending: Mutex<Vec<MutationRecord>>,
    /// Bumped whenever entries may have gone stale; a miss whose query
    /// straddles a bump is returned but not stored
    epoch: AtomicU64,
    destroyed: AtomicBool,
    sweeping: AtomicBool,
    debouncer: Debouncer,
    sweeper: Sweeper,
    observer: ChangeObserver,
    this: Weak<Shared>,
}

impl QueryCache {
    /// Create a passive cache: no observer and no sweeper until
    /// [`attach`](Self::attach) is called
    pub fn new(host: Arc<dyn TreeHost>, config: CacheConfig) -> Self {
        let shared = Arc::new_cyclic(|this| Shared {
            host,
            store: Mutex::new(PrimaryStore::new(config.capacity())),
            metadata: Mutex::new(WeakMetadataStore::new()),
            stats: Arc::new(CacheStats::new()),
            pending: Mutex::new(Vec::new()),
            epoch: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
            sweeping: AtomicBool::new(false),
            debouncer: Debouncer::new(config.debounce_delay),
            sweeper: Sweeper::new(),
            observer: ChangeObserver::new(),
            this: this.clone(),
            config,
        });
        Self { shared }
    }

    /// Create a cache and attach it to the running tokio runtime
    pub fn start(host: Arc<dyn TreeHost>, config: CacheConfig) -> Self {
        let cache = Self::new(host, config);
        cache.attach();
        cache
    }

    /// Subscribe to host mutations and start the sweeper. Returns `false`
    /// when the cache is destroyed, disabled, or there is no tokio runtime.
    pub fn attach(&self) -> bool {
        let shared = &self.shared;
        if shared.is_destroyed() || !shared.config.enabled {
            return false;
        }
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("No tokio runtime; cache stays passive (use notify/flush/sweep)");
                return false;
            }
        };

        shared
            .observer
            .attach(&runtime, Arc::clone(&shared.host), shared.this.clone());
        if shared.config.auto_sweep {
            shared
                .sweeper
                .start(&runtime, shared.config.sweep_interval, shared.this.clone());
        }
        tracing::info!(
            "Lookup cache attached (max_size={}, debounce={:?}, sweep={:?})",
            shared.config.max_size,
            shared.config.debounce_delay,
            shared.config.sweep_interval
        );
        true
    }

    /// Resolve `query`, serving a cached result when it is still valid.
    /// Errors are logged and come back as `None`.
    pub fn resolve(&self, kind: QueryKind, query: &str) -> Option<CachedResult> {
        self.shared.resolve(kind, query)
    }

    /// Drop the entry for one query. Returns whether it was present.
    pub fn invalidate(&self, kind: QueryKind, query: &str) -> bool {
        match CacheKey::new(kind, query) {
            Ok(key) => self.invalidate_keys(std::slice::from_ref(&key)) == 1,
            Err(_) => false,
        }
    }

    /// Drop the entries for `keys`, returning how many were present
    pub fn invalidate_keys(&self, keys: &[CacheKey]) -> usize {
        let shared = &self.shared;
        if shared.is_destroyed() {
            return 0;
        }
        let (removed, len) = {
            let mut store = shared.store.lock();
            let removed = keys.iter().filter(|key| store.remove(key).is_some()).count();
            (removed, store.len())
        };
        shared.stats.record_invalidations(removed as u64);
        shared.stats.set_entry_count(len as u64);
        removed
    }

    /// Drop every entry
    pub fn invalidate_all(&self) -> usize {
        let shared = &self.shared;
        if shared.is_destroyed() {
            return 0;
        }
        let removed = {
            let mut store = shared.store.lock();
            shared.bump_epoch();
            store.clear()
        };
        shared.stats.record_invalidations(removed as u64);
        shared.stats.set_entry_count(0);
        tracing::debug!("Invalidated all {} entries", removed);
        removed
    }

    /// Feed mutation records by hand; they are processed on the next
    /// debounce fire or [`flush`](Self::flush)
    pub fn notify(&self, records: Vec<MutationRecord>) {
        self.shared.deliver(records);
    }

    /// Run the pending invalidation pass now, including records the host has
    /// sent that the observer has not picked up yet. `None` when nothing was
    /// pending.
    pub fn flush(&self) -> Option<InvalidationOutcome> {
        self.shared.debouncer.cancel();
        self.shared.flush()
    }

    /// Validate every entry now, returning how many were removed
    pub fn sweep(&self) -> usize {
        self.shared.sweep()
    }

    /// Same as [`sweep`](Self::sweep), yielding to the runtime between chunks
    pub async fn sweep_incremental(&self) -> usize {
        self.shared.sweep_incremental().await
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.shared.stats)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Bookkeeping the cache holds for `element`, if any
    pub fn metadata(&self, element: &Element) -> Option<MetadataRecord> {
        self.shared.metadata.lock().lookup(element)
    }

    pub fn contains_key(&self, kind: QueryKind, query: &str) -> bool {
        CacheKey::new(kind, query)
            .map(|key| self.shared.store.lock().contains(&key))
            .unwrap_or(false)
    }

    /// Cached keys, newest first
    pub fn keys(&self) -> Vec<CacheKey> {
        self.shared.store.lock().keys()
    }

    pub fn len(&self) -> usize {
        self.shared.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.store.lock().is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    pub fn host(&self) -> &Arc<dyn TreeHost> {
        &self.shared.host
    }

    pub fn state(&self) -> CacheState {
        if self.shared.is_destroyed() {
            CacheState::Destroyed
        } else {
            CacheState::Active
        }
    }

    /// Whether mutation notifications are currently arriving
    pub fn is_observing(&self) -> bool {
        self.shared.observer.is_attached()
    }

    pub fn is_sweeping(&self) -> bool {
        self.shared.sweeper.is_running()
    }

    /// Stop timers, detach the observer and empty the cache. Idempotent.
    pub fn destroy(&self) {
        self.shared.destroy();
    }
}

impl Drop for QueryCache {
    fn drop(&mut self) {
        self.shared.destroy();
    }
}

impl CacheInvalidator for QueryCache {
    fn invalidate_key(&self, kind: QueryKind, query: &str) -> bool {
        self.invalidate(kind, query)
    }

    fn invalidate_all(&self) -> usize {
        QueryCache::invalidate_all(self)
    }

    fn is_enabled(&self) -> bool {
        self.shared.config.enabled && !self.shared.is_destroyed()
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("state", &self.state())
            .field("enabled", &self.shared.config.enabled)
            .field("max_size", &self.shared.config.max_size)
            .field("current_entries", &self.len())
            .field("observing", &self.is_observing())
            .finish()
    }
}

impl Shared {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn resolve(&self, kind: QueryKind, query: &str) -> Option<CachedResult> {
        if self.is_destroyed() {
            return None;
        }
        if !self.config.enabled {
            self.stats.record_miss();
            return self.execute(kind, query);
        }

        let key = match CacheKey::new(kind, query) {
            Ok(key) => key,
            Err(err) => {
                tracing::debug!("Rejected lookup: {}", err);
                self.stats.record_miss();
                return None;
            }
        };

        let cached = self.store.lock().get(&key).map(|entry| entry.result.clone());
        if let Some(result) = cached {
            if validator::is_valid(&result, kind, self.host.as_ref()) {
                self.store.lock().touch(&key);
                if let CachedResult::Element(element) = &result {
                    self.metadata.lock().touch(element);
                }
                self.stats.record_hit();
                tracing::debug!("Cache hit for {}", key);
                return Some(result);
            }
            let len = {
                let mut store = self.store.lock();
                store.remove_if_same(&key, &result);
                store.len()
            };
            self.stats.record_stale_read();
            self.stats.set_entry_count(len as u64);
            tracing::debug!("Dropped stale entry for {}", key);
        }

        self.stats.record_miss();
        tracing::debug!("Cache miss for {}", key);
        let epoch = self.epoch.load(Ordering::Acquire);
        let result = self.execute(kind, query)?;
        if !result.fits(kind) {
            tracing::warn!("Host returned the wrong result shape for {}", key);
            return None;
        }

        let (evicted, len) = {
            let mut store = self.store.lock();
            // Flushes bump the epoch under this lock, so a pass that ran while
            // the query executed is seen here
            if self.epoch.load(Ordering::Acquire) != epoch {
                drop(store);
                tracing::debug!("Not caching {}: invalidated while resolving", key);
                return Some(result);
            }
            let evicted = store.put(key.clone(), result.clone());
            (evicted, store.len())
        };

        {
            let mut metadata = self.metadata.lock();
            for element in result.elements() {
                metadata.record(&element, &key);
            }
        }

        if let Some((evicted_key, _)) = evicted {
            self.stats.record_eviction();
            tracing::debug!("Evicted {}", evicted_key);
        }
        self.stats.set_entry_count(len as u64);
        Some(result)
    }

    /// Run the real query. A single lookup that found nothing is `None`.
    fn execute(&self, kind: QueryKind, query: &str) -> Option<CachedResult> {
        match self.host.execute_query(kind, query) {
            Ok(QueryOutput::Element(element)) => element.map(CachedResult::Element),
            Ok(QueryOutput::Collection(collection)) => Some(CachedResult::Collection(collection)),
            Err(err) => {
                if err.is_query_error() {
                    tracing::debug!("Lookup {} '{}' failed: {}", kind, query, err);
                } else {
                    tracing::warn!("Lookup {} '{}' failed: {}", kind, query, err);
                }
                self.stats.record_query_error();
                None
            }
        }
    }

    fn flush(&self) -> Option<InvalidationOutcome> {
        if self.is_destroyed() {
            return None;
        }
        let queued = self.observer.take_queued();
        let records = {
            let mut pending = self.pending.lock();
            pending.extend(queued);
            std::mem::take(&mut *pending)
        };
        if records.is_empty() {
            return None;
        }

        let affected = AffectedIdentifiers::classify(&records);
        let (outcome, len) = {
            let mut store = self.store.lock();
            self.bump_epoch();
            let outcome = invalidation::apply(&mut store, &affected);
            (outcome, store.len())
        };

        self.stats.record_invalidation_pass();
        self.stats.record_invalidations(outcome.removed() as u64);
        self.stats.set_entry_count(len as u64);
        tracing::debug!(
            "Invalidation pass over {} records: {:?}",
            affected.records,
            outcome
        );
        Some(outcome)
    }

    /// Prune dead metadata and record the sweep
    fn finish_sweep(&self, removed: usize) -> usize {
        let pruned = self.metadata.lock().prune();
        let len = self.store.lock().len();
        self.stats.record_sweep(removed as u64);
        self.stats.set_entry_count(len as u64);
        tracing::debug!(
            "Sweep removed {} entries and {} metadata records",
            removed,
            pruned
        );
        removed
    }

    /// Remove the invalid entries of `chunk` that were not replaced meanwhile
    fn remove_invalid(&self, chunk: &[(CacheKey, CachedResult)]) -> usize {
        let invalid: Vec<&(CacheKey, CachedResult)> = chunk
            .iter()
            .filter(|(key, result)| !validator::is_valid(result, key.kind(), self.host.as_ref()))
            .collect();
        if invalid.is_empty() {
            return 0;
        }
        let mut store = self.store.lock();
        invalid
            .into_iter()
            .filter(|(key, result)| store.remove_if_same(key, result))
            .count()
    }

    fn begin_sweep(&self) -> Option<(SweepGuard<'_>, Vec<(CacheKey, CachedResult)>)> {
        if self.is_destroyed() || self.sweeping.swap(true, Ordering::AcqRel) {
            return None;
        }
        let guard = SweepGuard(&self.sweeping);
        Some((guard, self.store.lock().snapshot()))
    }

    fn sweep(&self) -> usize {
        let Some((_guard, entries)) = self.begin_sweep() else {
            return 0;
        };
        let removed = self.remove_invalid(&entries);
        self.finish_sweep(removed)
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.debouncer.cancel();
        self.sweeper.stop();
        self.observer.detach();
        self.pending.lock().clear();
        let dropped = self.store.lock().clear();
        self.metadata.lock().clear();
        self.stats.set_entry_count(0);
        tracing::info!("Lookup cache destroyed ({} entries dropped)", dropped);
    }
}

/// Clears the in-progress flag when a sweep ends, including a cancelled one
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MutationSink for Shared {
    fn deliver(&self, batch: Vec<MutationRecord>) {
        if self.is_destroyed() || batch.is_empty() {
            return;
        }
        let waiting = {
            let mut pending = self.pending.lock();
            pending.extend(batch);
            pending.len()
        };
        self.bump_epoch();

        let this = self.this.clone();
        let scheduled = self.debouncer.schedule(move || {
            if let Some(shared) = this.upgrade() {
                shared.flush();
            }
        });
        if !scheduled {
            if waiting >= PENDING_FLUSH_THRESHOLD {
                tracing::debug!("{} records waiting without a runtime; flushing", waiting);
                self.flush();
            } else {
                tracing::debug!("No runtime to debounce on; records wait for flush()");
            }
        }
    }
}

#[async_trait]
impl SweepTarget for Shared {
    async fn sweep_incremental(&self) -> usize {
        let Some((_guard, entries)) = self.begin_sweep() else {
            return 0;
        };
        let mut removed = 0;
        for chunk in entries.chunks(SWEEP_CHUNK) {
            if self.is_destroyed() {
                break;
            }
            removed += self.remove_invalid(chunk);
            tokio::task::yield_now().await;
        }
        self.finish_sweep(removed)
    }
}
