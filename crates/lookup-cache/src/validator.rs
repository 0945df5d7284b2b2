//! Result validation
//!
//! Decides whether a cached result may still be served. Single results must
//! still be attached. Collections are checked by sampling: an empty
//! collection is always valid, otherwise only its first member (as of the
//! last read) is tested. A collection whose later members were removed while
//! the first stayed attached passes; the change observer and the live
//! collection itself cover that case.

use crate::result::CachedResult;
use lookup_core::{QueryKind, TreeHost};

pub fn is_valid(result: &CachedResult, kind: QueryKind, host: &dyn TreeHost) -> bool {
    if !result.fits(kind) {
        return false;
    }
    match result {
        CachedResult::Element(element) => host.is_attached(element),
        CachedResult::Collection(collection) => match collection.peek_first() {
            None => true,
            Some(first) => host.is_attached(&first),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookup_core::Document;

    fn doc_with(ids: &[&str]) -> Document {
        let doc = Document::new();
        for id in ids {
            let el = doc.create_element("li");
            doc.set_attribute(&el, "id", id);
            doc.set_attribute(&el, "class", "item");
            doc.append_child(&doc.root(), &el).unwrap();
        }
        doc
    }

    #[test]
    fn test_single_requires_attachment() {
        let doc = doc_with(&["a"]);
        let a = doc.get_element_by_id("a").unwrap();
        let result = CachedResult::Element(a.clone());

        assert!(is_valid(&result, QueryKind::Single, &doc));
        doc.remove(&a).unwrap();
        assert!(!is_valid(&result, QueryKind::Single, &doc));
    }

    #[test]
    fn test_shape_mismatch_is_invalid() {
        let doc = doc_with(&["a"]);
        let result = CachedResult::Element(doc.get_element_by_id("a").unwrap());
        assert!(!is_valid(&result, QueryKind::CollectionByClass, &doc));
    }

    #[test]
    fn test_empty_collection_is_valid() {
        let doc = doc_with(&[]);
        let result = CachedResult::Collection(doc.elements_by_class("item").unwrap());
        assert!(is_valid(&result, QueryKind::CollectionByClass, &doc));
    }

    #[test]
    fn test_collection_samples_first_member() {
        let doc = doc_with(&["a", "b"]);
        let items = doc.elements_by_class("item").unwrap();
        let result = CachedResult::Collection(items.clone());

        // Removing a later member is not detected
        doc.remove(&doc.get_element_by_id("b").unwrap()).unwrap();
        assert!(is_valid(&result, QueryKind::CollectionByClass, &doc));

        // Removing the sampled member is, until the collection is read again
        let a = doc.get_element_by_id("a").unwrap();
        assert_eq!(items.len(), 1);
        doc.remove(&a).unwrap();
        assert!(!is_valid(&result, QueryKind::CollectionByClass, &doc));
    }
}
