//! Values held by the primary store

use lookup_core::{Element, LiveCollection, QueryKind};

/// A cached lookup result: one element, or a live collection handle
#[derive(Debug, Clone)]
pub enum CachedResult {
    Element(Element),
    Collection(LiveCollection),
}

impl CachedResult {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            CachedResult::Element(el) => Some(el),
            CachedResult::Collection(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&LiveCollection> {
        match self {
            CachedResult::Element(_) => None,
            CachedResult::Collection(c) => Some(c),
        }
    }

    pub fn into_element(self) -> Option<Element> {
        match self {
            CachedResult::Element(el) => Some(el),
            CachedResult::Collection(_) => None,
        }
    }

    pub fn into_collection(self) -> Option<LiveCollection> {
        match self {
            CachedResult::Element(_) => None,
            CachedResult::Collection(c) => Some(c),
        }
    }

    /// Whether the result has the shape `kind` produces
    pub fn fits(&self, kind: QueryKind) -> bool {
        match self {
            CachedResult::Element(_) => !kind.is_collection(),
            CachedResult::Collection(_) => kind.is_collection(),
        }
    }

    /// Current members: the element itself, or the live collection contents
    pub fn elements(&self) -> Vec<Element> {
        match self {
            CachedResult::Element(el) => vec![el.clone()],
            CachedResult::Collection(c) => c.to_vec(),
        }
    }

    /// Same element, or same collection handle
    pub fn same_as(&self, other: &CachedResult) -> bool {
        match (self, other) {
            (CachedResult::Element(a), CachedResult::Element(b)) => a.ptr_eq(b),
            (CachedResult::Collection(a), CachedResult::Collection(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}
