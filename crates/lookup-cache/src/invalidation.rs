//! Cache invalidation support
//!
//! Maps the identifiers affected by a batch of mutations onto the cache
//! keys whose raw query references them. Matching is textual and errs on
//! the side of removing too much: a key that might be affected is dropped.

use crate::observer::AffectedIdentifiers;
use crate::store::PrimaryStore;
use lookup_core::{class_tokens, single_target, QueryKind};

/// Trait for components that can trigger cache invalidation
pub trait CacheInvalidator: Send + Sync {
    /// Invalidate the entry for one query. Returns whether it was present.
    fn invalidate_key(&self, kind: QueryKind, query: &str) -> bool;

    /// Invalidate all cache entries, returning how many were dropped
    fn invalidate_all(&self) -> usize;

    /// Check if the invalidator is enabled
    fn is_enabled(&self) -> bool;
}

/// What one invalidation pass did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationOutcome {
    /// A structural change emptied the store
    Cleared(usize),
    /// Only keys referencing an affected identifier were removed
    Selective(usize),
}

impl InvalidationOutcome {
    pub fn removed(&self) -> usize {
        match self {
            InvalidationOutcome::Cleared(n) | InvalidationOutcome::Selective(n) => *n,
        }
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, InvalidationOutcome::Cleared(_))
    }
}

/// Whether a cached `query` of `kind` may depend on any affected identifier
pub fn references(kind: QueryKind, query: &str, affected: &AffectedIdentifiers) -> bool {
    match kind {
        // An id we cannot parse cannot be matched, so drop it
        QueryKind::Single => match single_target(query) {
            Ok(id) => affected.ids.contains(id),
            Err(_) => true,
        },
        QueryKind::CollectionByClass => class_tokens(query)
            .map(|token| token.strip_prefix('.').unwrap_or(token))
            .any(|token| affected.classes.contains(token)),
        QueryKind::CollectionByTag => {
            let tag = query.trim().to_ascii_lowercase();
            (tag == "*" && !affected.tags.is_empty()) || affected.tags.contains(&tag)
        }
        QueryKind::CollectionByName => affected.names.contains(query),
        QueryKind::FreeSelector => affected
            .tokens()
            .any(|token| !token.is_empty() && query.contains(token)),
    }
}

/// Run one invalidation pass over `store`
pub fn apply(store: &mut PrimaryStore, affected: &AffectedIdentifiers) -> InvalidationOutcome {
    if affected.structural {
        return InvalidationOutcome::Cleared(store.clear());
    }
    if affected.is_empty() {
        return InvalidationOutcome::Selective(0);
    }
    InvalidationOutcome::Selective(
        store.remove_where(|key| references(key.kind(), key.query(), affected)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKey;
    use crate::result::CachedResult;
    use lookup_core::Document;

    fn affected(ids: &[&str], classes: &[&str], names: &[&str]) -> AffectedIdentifiers {
        let mut set = AffectedIdentifiers::new();
        set.ids.extend(ids.iter().map(|s| s.to_string()));
        set.classes.extend(classes.iter().map(|s| s.to_string()));
        set.names.extend(names.iter().map(|s| s.to_string()));
        set
    }

    #[test]
    fn test_single_references() {
        let set = affected(&["a", "b"], &[], &[]);
        assert!(references(QueryKind::Single, "#a", &set));
        assert!(references(QueryKind::Single, "b", &set));
        assert!(!references(QueryKind::Single, "#c", &set));
        // Unparseable ids are dropped
        assert!(references(QueryKind::Single, "# c", &set));
    }

    #[test]
    fn test_class_references() {
        let set = affected(&[], &["active"], &[]);
        assert!(references(QueryKind::CollectionByClass, "active", &set));
        assert!(references(QueryKind::CollectionByClass, "item .active", &set));
        assert!(!references(QueryKind::CollectionByClass, "inactive", &set));
    }

    #[test]
    fn test_tag_and_name_references() {
        let mut set = affected(&[], &[], &["email"]);
        set.tags.insert("li".to_string());
        assert!(references(QueryKind::CollectionByTag, "LI", &set));
        assert!(references(QueryKind::CollectionByTag, "*", &set));
        assert!(!references(QueryKind::CollectionByTag, "ul", &set));
        assert!(references(QueryKind::CollectionByName, "email", &set));
        assert!(!references(QueryKind::CollectionByName, "phone", &set));
    }

    #[test]
    fn test_selector_references_any_token() {
        let set = affected(&["main"], &["open"], &[]);
        assert!(references(QueryKind::FreeSelector, "#main > li", &set));
        assert!(references(QueryKind::FreeSelector, "ul li.open", &set));
        assert!(!references(QueryKind::FreeSelector, "ul li", &set));
    }

    fn store_with(doc: &Document, keys: &[(QueryKind, &str)]) -> PrimaryStore {
        let mut store = PrimaryStore::new(16);
        for (kind, query) in keys {
            let result = if kind.is_collection() {
                CachedResult::Collection(
                    lookup_core::LiveCollection::new(doc.clone(), *kind, query).unwrap(),
                )
            } else {
                CachedResult::Element(doc.root())
            };
            store.put(CacheKey::new(*kind, query).unwrap(), result);
        }
        store
    }

    #[test]
    fn test_apply_selective() {
        let doc = Document::new();
        let mut store = store_with(
            &doc,
            &[
                (QueryKind::Single, "#a"),
                (QueryKind::Single, "#b"),
                (QueryKind::CollectionByClass, "item"),
            ],
        );

        let outcome = apply(&mut store, &affected(&["a"], &[], &[]));
        assert_eq!(outcome, InvalidationOutcome::Selective(1));
        assert_eq!(store.len(), 2);

        // Idempotent
        let outcome = apply(&mut store, &affected(&["a"], &[], &[]));
        assert_eq!(outcome.removed(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_apply_structural_clears() {
        let doc = Document::new();
        let mut store = store_with(&doc, &[(QueryKind::Single, "#a"), (QueryKind::Single, "#b")]);

        let mut set = AffectedIdentifiers::new();
        set.structural = true;
        let outcome = apply(&mut store, &set);
        assert!(outcome.is_cleared());
        assert_eq!(outcome.removed(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_apply_empty_set_is_noop() {
        let doc = Document::new();
        let mut store = store_with(&doc, &[(QueryKind::FreeSelector, "div")]);
        assert_eq!(
            apply(&mut store, &AffectedIdentifiers::new()),
            InvalidationOutcome::Selective(0)
        );
        assert_eq!(store.len(), 1);
    }
}
