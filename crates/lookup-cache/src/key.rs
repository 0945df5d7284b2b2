//! Cache keys
//!
//! A key is the pair (query kind, raw query). The raw query is kept exactly
//! as given: `"#a"` and `"# a"` or `"DIV"` and `"div"` are different keys, so
//! callers should format queries consistently.

use lookup_core::{LookupError, QueryKind, Result};
use std::fmt;
use std::sync::Arc;

/// Separator between the kind tag and the raw query in the encoded form
pub const KEY_SEPARATOR: char = ':';

/// Canonical identity of one cached lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    kind: QueryKind,
    query: Arc<str>,
}

impl CacheKey {
    /// Build a key, rejecting blank queries
    pub fn new(kind: QueryKind, query: &str) -> Result<Self> {
        if query.trim().is_empty() {
            return Err(LookupError::InvalidQuery(format!(
                "empty {} query",
                kind
            )));
        }
        Ok(Self {
            kind,
            query: Arc::from(query),
        })
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// `kind:query`
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.kind.as_str(), KEY_SEPARATOR, self.query)
    }

    /// Inverse of [`CacheKey::encode`]
    pub fn decode(encoded: &str) -> Result<Self> {
        let (kind, query) = encoded.split_once(KEY_SEPARATOR).ok_or_else(|| {
            LookupError::InvalidQuery(format!("'{}' is not an encoded cache key", encoded))
        })?;
        Self::new(kind.parse()?, query)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind.as_str(), KEY_SEPARATOR, self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_literal_different_kind() {
        let by_class = CacheKey::new(QueryKind::CollectionByClass, "item").unwrap();
        let by_name = CacheKey::new(QueryKind::CollectionByName, "item").unwrap();
        let again = CacheKey::new(QueryKind::CollectionByClass, "item").unwrap();

        assert_ne!(by_class, by_name);
        assert_eq!(by_class, again);
    }

    #[test]
    fn test_no_normalization() {
        let a = CacheKey::new(QueryKind::CollectionByTag, "div").unwrap();
        let b = CacheKey::new(QueryKind::CollectionByTag, "DIV").unwrap();
        let c = CacheKey::new(QueryKind::CollectionByTag, " div").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_blank_query_rejected() {
        assert!(matches!(
            CacheKey::new(QueryKind::Single, ""),
            Err(LookupError::InvalidQuery(_))
        ));
        assert!(CacheKey::new(QueryKind::FreeSelector, "   ").is_err());
    }

    #[test]
    fn test_encoding() {
        let key = CacheKey::new(QueryKind::FreeSelector, "a:hover > b").unwrap();
        assert_eq!(key.encode(), "selector:a:hover > b");
        assert_eq!(key.to_string(), key.encode());
        assert_eq!(CacheKey::decode(&key.encode()).unwrap(), key);

        assert!(CacheKey::decode("no-separator").is_err());
        assert!(CacheKey::decode("table:users").is_err());
        assert!(CacheKey::decode("single:").is_err());
    }
}
