//! Typed lookups
//!
//! Thin wrappers over [`QueryCache::resolve`] that return the concrete
//! result type of each query kind.

use crate::cache::QueryCache;
use lookup_core::{Element, LiveCollection, QueryKind};

impl QueryCache {
    /// Element with the given id (`"main"` or `"#main"`)
    pub fn by_id(&self, id: &str) -> Option<Element> {
        self.resolve(QueryKind::Single, id)?.into_element()
    }

    /// Elements carrying every class in `classes` (whitespace separated)
    pub fn by_class(&self, classes: &str) -> Option<LiveCollection> {
        self.resolve(QueryKind::CollectionByClass, classes)?
            .into_collection()
    }

    /// Elements with the given tag name; `"*"` matches all
    pub fn by_tag(&self, tag: &str) -> Option<LiveCollection> {
        self.resolve(QueryKind::CollectionByTag, tag)?.into_collection()
    }

    pub fn by_name(&self, name: &str) -> Option<LiveCollection> {
        self.resolve(QueryKind::CollectionByName, name)?
            .into_collection()
    }

    /// Elements matching a selector list
    pub fn select(&self, selector: &str) -> Option<LiveCollection> {
        self.resolve(QueryKind::FreeSelector, selector)?
            .into_collection()
    }

    /// First element matching a selector list
    pub fn select_first(&self, selector: &str) -> Option<Element> {
        self.select(selector)?.first()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CacheConfig;
    use crate::QueryCache;
    use lookup_core::{Document, NodeTemplate};
    use std::sync::Arc;

    fn form() -> Document {
        let template = NodeTemplate::new("form")
            .with_id("signup")
            .with_child(
                NodeTemplate::new("input")
                    .with_name("email")
                    .with_class("field required"),
            )
            .with_child(NodeTemplate::new("input").with_name("phone").with_class("field"))
            .with_child(NodeTemplate::new("button").with_id("submit"));
        Document::from_template(&template).unwrap()
    }

    #[test]
    fn test_typed_lookups() {
        let doc = form();
        let cache = QueryCache::new(Arc::new(doc.clone()), CacheConfig::default());

        assert_eq!(cache.by_id("#submit").unwrap().tag_name(), "button");
        assert_eq!(cache.by_class("field").unwrap().len(), 2);
        assert_eq!(cache.by_class("field required").unwrap().len(), 1);
        assert_eq!(cache.by_tag("INPUT").unwrap().len(), 2);
        assert_eq!(cache.by_name("phone").unwrap().len(), 1);
        assert_eq!(cache.select("form > input.required").unwrap().len(), 1);
        assert_eq!(
            cache.select_first("#signup button").unwrap().id().as_deref(),
            Some("submit")
        );
        assert!(cache.by_id("missing").is_none());
    }

    #[test]
    fn test_typed_lookups_share_entries() {
        let doc = form();
        let cache = QueryCache::new(Arc::new(doc), CacheConfig::default());

        let first = cache.by_class("field").unwrap();
        let second = cache.by_class("field").unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(cache.stats().hits(), 1);
    }
}
