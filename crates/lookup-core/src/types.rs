use crate::error::{LookupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Category of lookup. Decides which real query runs and how a cached
/// result is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// One element by identifier
    #[serde(alias = "id")]
    Single,
    /// Live collection of elements carrying all given class tokens
    #[serde(alias = "class")]
    CollectionByClass,
    /// Live collection of elements with a tag name
    #[serde(alias = "tag")]
    CollectionByTag,
    /// Live collection of elements with a `name` attribute value
    #[serde(alias = "name")]
    CollectionByName,
    /// Live collection of elements matching a selector list
    #[serde(alias = "selector", alias = "css")]
    FreeSelector,
}

impl QueryKind {
    pub const ALL: [QueryKind; 5] = [
        QueryKind::Single,
        QueryKind::CollectionByClass,
        QueryKind::CollectionByTag,
        QueryKind::CollectionByName,
        QueryKind::FreeSelector,
    ];

    /// Short tag used in canonical key strings
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Single => "single",
            QueryKind::CollectionByClass => "class",
            QueryKind::CollectionByTag => "tag",
            QueryKind::CollectionByName => "name",
            QueryKind::FreeSelector => "selector",
        }
    }

    /// Whether results of this kind are live collections
    pub fn is_collection(&self) -> bool {
        !matches!(self, QueryKind::Single)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" | "id" => Ok(QueryKind::Single),
            "class" => Ok(QueryKind::CollectionByClass),
            "tag" => Ok(QueryKind::CollectionByTag),
            "name" => Ok(QueryKind::CollectionByName),
            "selector" | "css" => Ok(QueryKind::FreeSelector),
            other => Err(LookupError::InvalidQuery(format!(
                "Unknown query kind '{}'",
                other
            ))),
        }
    }
}

/// Stable identity of an element, unique for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u64);

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

impl ElementId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Attribute names the lookup queries depend on
pub const ID_ATTRIBUTE: &str = "id";
pub const CLASS_ATTRIBUTE: &str = "class";
pub const NAME_ATTRIBUTE: &str = "name";

/// Split a class attribute value into its tokens
pub fn class_tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split_ascii_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_through_str() {
        for kind in QueryKind::ALL {
            assert_eq!(kind.as_str().parse::<QueryKind>().unwrap(), kind);
        }
        assert_eq!("ID".parse::<QueryKind>().unwrap(), QueryKind::Single);
        assert!("table".parse::<QueryKind>().is_err());
    }

    #[test]
    fn test_element_ids_are_unique() {
        let a = ElementId::next();
        let b = ElementId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_class_tokens() {
        let tokens: Vec<_> = class_tokens("  a  b\tc ").collect();
        assert_eq!(tokens, vec!["a", "b", "c"]);
    }
}
