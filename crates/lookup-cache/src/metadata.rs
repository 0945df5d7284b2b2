//! Weak metadata store
//!
//! Side table keyed by element identity. It holds only [`WeakElement`]s, so
//! recording metadata never keeps an element alive; records for reclaimed
//! elements read as absent and are pruned periodically.

use crate::key::CacheKey;
use ahash::AHashMap;
use lookup_core::{Element, ElementId, WeakElement};
use std::time::Instant;

/// Writes between opportunistic prunes of dead records
const PRUNE_EVERY: usize = 256;

/// Bookkeeping attached to an element by the cache
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    /// Key whose result most recently contained the element
    pub key: CacheKey,
    /// When the record was last written
    pub created_at: Instant,
    /// Writes plus cache hits involving the element
    pub access_count: u64,
}

#[derive(Debug, Default)]
pub struct WeakMetadataStore {
    records: AHashMap<ElementId, (WeakElement, MetadataRecord)>,
    writes_since_prune: usize,
}

impl WeakMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the record for `element`; an existing live record is
    /// overwritten and its access count carried forward plus one
    pub fn record(&mut self, element: &Element, key: &CacheKey) {
        let access_count = self
            .records
            .get(&element.uid())
            .filter(|(weak, _)| !weak.is_dead())
            .map(|(_, record)| record.access_count + 1)
            .unwrap_or(1);

        self.records.insert(
            element.uid(),
            (
                element.downgrade(),
                MetadataRecord {
                    key: key.clone(),
                    created_at: Instant::now(),
                    access_count,
                },
            ),
        );

        self.writes_since_prune += 1;
        if self.writes_since_prune >= PRUNE_EVERY {
            self.prune();
        }
    }

    /// Count an access without rewriting the record
    pub fn touch(&mut self, element: &Element) {
        if let Some((_, record)) = self.records.get_mut(&element.uid()) {
            record.access_count += 1;
        }
    }

    pub fn lookup(&self, element: &Element) -> Option<MetadataRecord> {
        self.records
            .get(&element.uid())
            .filter(|(weak, _)| !weak.is_dead())
            .map(|(_, record)| record.clone())
    }

    /// Drop records whose element has been reclaimed
    pub fn prune(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, (weak, _)| !weak.is_dead());
        self.writes_since_prune = 0;
        before - self.records.len()
    }

    /// Records still attached to a live element
    pub fn live_len(&self) -> usize {
        self.records
            .values()
            .filter(|(weak, _)| !weak.is_dead())
            .count()
    }

    /// Records held, including not yet pruned dead ones
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.writes_since_prune = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookup_core::{Document, QueryKind};

    fn key(q: &str) -> CacheKey {
        CacheKey::new(QueryKind::Single, q).unwrap()
    }

    #[test]
    fn test_record_and_overwrite() {
        let doc = Document::new();
        let el = doc.create_element("div");
        let mut store = WeakMetadataStore::new();

        assert!(store.lookup(&el).is_none());
        store.record(&el, &key("#a"));
        assert_eq!(store.lookup(&el).unwrap().access_count, 1);

        store.touch(&el);
        store.record(&el, &key("#b"));
        let record = store.lookup(&el).unwrap();
        assert_eq!(record.key, key("#b"));
        assert_eq!(record.access_count, 3);
    }

    #[test]
    fn test_does_not_extend_lifetime() {
        let doc = Document::new();
        let el = doc.create_element("div");
        let weak = el.downgrade();
        let mut store = WeakMetadataStore::new();

        store.record(&el, &key("#a"));
        drop(el);

        assert!(weak.upgrade().is_none());
        assert_eq!(store.live_len(), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.prune(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_prunes_opportunistically() {
        let doc = Document::new();
        let mut store = WeakMetadataStore::new();
        for _ in 0..PRUNE_EVERY {
            let el = doc.create_element("span");
            store.record(&el, &key("#x"));
        }
        // The last write triggered a prune of every reclaimed element
        assert!(store.len() < PRUNE_EVERY);
    }
}
