//! Live collections
//!
//! A [`LiveCollection`] is a handle, not a snapshot: every read checks the
//! document's structure version and re-runs its matcher when the tree has
//! changed since the last read.

use crate::document::Document;
use crate::element::Element;
use crate::error::{LookupError, Result};
use crate::selector::Selector;
use crate::types::{class_tokens, QueryKind};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a collection picks its members
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Elements carrying every listed class token
    Class(Vec<String>),
    /// Elements with the tag name; `None` matches every element
    Tag(Option<String>),
    /// Elements whose `name` attribute equals the value
    Name(String),
    Selector(Selector),
}

impl Matcher {
    /// Build the matcher for a collection query
    pub fn for_query(kind: QueryKind, query: &str) -> Result<Self> {
        match kind {
            QueryKind::Single => Err(LookupError::InvalidQuery(
                "single-element lookups do not produce collections".to_string(),
            )),
            QueryKind::CollectionByClass => {
                let tokens: Vec<String> = class_tokens(query)
                    .map(|t| t.strip_prefix('.').unwrap_or(t).to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                if tokens.is_empty() {
                    return Err(LookupError::InvalidQuery(format!(
                        "no class tokens in '{}'",
                        query
                    )));
                }
                Ok(Matcher::Class(tokens))
            }
            QueryKind::CollectionByTag => match query.trim() {
                "" => Err(LookupError::InvalidQuery("empty tag name".to_string())),
                "*" => Ok(Matcher::Tag(None)),
                tag => Ok(Matcher::Tag(Some(tag.to_ascii_lowercase()))),
            },
            QueryKind::CollectionByName => {
                if query.is_empty() {
                    return Err(LookupError::InvalidQuery("empty name".to_string()));
                }
                Ok(Matcher::Name(query.to_string()))
            }
            QueryKind::FreeSelector => Ok(Matcher::Selector(Selector::parse(query)?)),
        }
    }

    pub fn matches(&self, element: &Element) -> bool {
        match self {
            Matcher::Class(tokens) => tokens.iter().all(|t| element.has_class(t)),
            Matcher::Tag(None) => true,
            Matcher::Tag(Some(tag)) => element.tag_name() == tag,
            Matcher::Name(name) => element.name().as_deref() == Some(name.as_str()),
            Matcher::Selector(selector) => selector.matches(element),
        }
    }

    /// Matching elements under `root` (inclusive) in document order
    pub fn select(&self, root: &Element) -> Vec<Element> {
        root.subtree()
            .into_iter()
            .filter(|el| self.matches(el))
            .collect()
    }
}

struct Snapshot {
    version: u64,
    elements: Vec<Element>,
}

struct CollectionInner {
    document: Document,
    kind: QueryKind,
    query: String,
    matcher: Matcher,
    created_at: Instant,
    snapshot: Mutex<Snapshot>,
}

/// Live view over the elements of a document matching a query
#[derive(Clone)]
pub struct LiveCollection {
    inner: Arc<CollectionInner>,
}

impl LiveCollection {
    /// Run `query` against `document` and wrap the result as a live handle
    pub fn new(document: Document, kind: QueryKind, query: &str) -> Result<Self> {
        let matcher = Matcher::for_query(kind, query)?;
        let version = document.version();
        let elements = matcher.select(&document.root());
        Ok(Self {
            inner: Arc::new(CollectionInner {
                document,
                kind,
                query: query.to_string(),
                matcher,
                created_at: Instant::now(),
                snapshot: Mutex::new(Snapshot { version, elements }),
            }),
        })
    }

    pub fn kind(&self) -> QueryKind {
        self.inner.kind
    }

    pub fn query(&self) -> &str {
        &self.inner.query
    }

    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    pub fn age(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    fn with_current<R>(&self, f: impl FnOnce(&[Element]) -> R) -> R {
        let mut snapshot = self.inner.snapshot.lock();
        let version = self.inner.document.version();
        if snapshot.version != version {
            snapshot.elements = self.inner.matcher.select(&self.inner.document.root());
            snapshot.version = version;
        }
        f(&snapshot.elements)
    }

    pub fn len(&self) -> usize {
        self.with_current(|els| els.len())
    }

    pub fn is_empty(&self) -> bool {
        self.with_current(|els| els.is_empty())
    }

    pub fn get(&self, index: usize) -> Option<Element> {
        self.with_current(|els| els.get(index).cloned())
    }

    pub fn first(&self) -> Option<Element> {
        self.get(0)
    }

    /// Current members
    pub fn to_vec(&self) -> Vec<Element> {
        self.with_current(|els| els.to_vec())
    }

    /// Iterate over the members as of this call
    pub fn iter(&self) -> std::vec::IntoIter<Element> {
        self.to_vec().into_iter()
    }

    /// First member as of the last read, without re-evaluating the matcher
    pub fn peek_first(&self) -> Option<Element> {
        self.inner.snapshot.lock().elements.first().cloned()
    }

    /// Whether the last read observed no members, without re-evaluating
    pub fn peek_is_empty(&self) -> bool {
        self.inner.snapshot.lock().elements.is_empty()
    }

    pub fn ptr_eq(&self, other: &LiveCollection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for LiveCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveCollection")
            .field("kind", &self.inner.kind)
            .field("query", &self.inner.query)
            .field("cached_len", &self.inner.snapshot.lock().elements.len())
            .finish()
    }
}

impl IntoIterator for &LiveCollection {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
