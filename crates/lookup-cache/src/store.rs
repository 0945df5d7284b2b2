//! Primary cache store
//!
//! Bounded map ordered by insertion. Reads use `peek`, which leaves the
//! order untouched, so the entry evicted at capacity is always the one
//! inserted longest ago rather than the one read longest ago.

use crate::key::CacheKey;
use crate::result::CachedResult;
use ahash::RandomState;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Entry stored in the cache
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cached lookup result
    pub result: CachedResult,
    /// When this entry was created
    pub created_at: Instant,
    /// Number of valid hits served from this entry
    pub hit_count: u64,
}

impl CacheEntry {
    /// Create a new cache entry
    pub fn new(result: CachedResult) -> Self {
        Self {
            result,
            created_at: Instant::now(),
            hit_count: 0,
        }
    }

    /// Get the age of this entry
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Insertion-ordered, capacity-bounded key → result map
pub struct PrimaryStore {
    entries: LruCache<CacheKey, CacheEntry, RandomState>,
}

impl PrimaryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::with_hasher(capacity, RandomState::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.peek(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    /// Count a hit against `key`
    pub fn touch(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.peek_mut(key) {
            entry.hit_count += 1;
        }
    }

    /// Insert `result` under `key` as the newest entry. Returns the entry
    /// evicted to make room, if any; replacing an existing key evicts nothing.
    pub fn put(&mut self, key: CacheKey, result: CachedResult) -> Option<(CacheKey, CacheEntry)> {
        let replacing = self.entries.pop(&key).is_some();
        let evicted = self.entries.push(key, CacheEntry::new(result));
        if replacing {
            None
        } else {
            evicted
        }
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.pop(key)
    }

    /// Remove `key` only if it still maps to `result`
    pub fn remove_if_same(&mut self, key: &CacheKey, result: &CachedResult) -> bool {
        let same = self
            .entries
            .peek(key)
            .map(|entry| entry.result.same_as(result))
            .unwrap_or(false);
        if same {
            self.entries.pop(key);
        }
        same
    }

    /// Remove every entry whose key satisfies `predicate`
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&CacheKey) -> bool) -> usize {
        let doomed: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.entries.pop(key);
        }
        doomed.len()
    }

    /// Remove everything, returning how many entries were dropped
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Keys from newest to oldest
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Copy of every (key, result) pair, newest first
    pub fn snapshot(&self) -> Vec<(CacheKey, CachedResult)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.result.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl std::fmt::Debug for PrimaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryStore")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
