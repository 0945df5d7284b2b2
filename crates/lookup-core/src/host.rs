//! Interface between the lookup cache and the tree it fronts

use crate::collection::LiveCollection;
use crate::document::Document;
use crate::element::Element;
use crate::error::{LookupError, Result};
use crate::mutation::{MutationStream, ObserveOptions};
use crate::types::QueryKind;
use async_trait::async_trait;

/// Outcome of running a query against the tree
#[derive(Debug, Clone)]
pub enum QueryOutput {
    /// Single-element lookup; `None` when nothing matched
    Element(Option<Element>),
    Collection(LiveCollection),
}

/// Tree the cache resolves queries against
#[async_trait]
pub trait TreeHost: Send + Sync {
    /// Walk the tree for `query`
    fn execute_query(&self, kind: QueryKind, query: &str) -> Result<QueryOutput>;

    /// Membership test against the live tree
    fn is_attached(&self, element: &Element) -> bool;

    /// Subscribe to mutation notifications under the tree root
    fn subscribe(&self, options: ObserveOptions) -> Result<MutationStream>;

    /// Resolves once the tree can accept subscriptions
    async fn ready(&self);
}

/// Identifier addressed by a single-element query (`#main` or `main`)
pub fn single_target(query: &str) -> Result<&str> {
    let id = query.strip_prefix('#').unwrap_or(query);
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return Err(LookupError::InvalidQuery(format!(
            "'{}' is not a valid identifier",
            query
        )));
    }
    Ok(id)
}

#[async_trait]
impl TreeHost for Document {
    fn execute_query(&self, kind: QueryKind, query: &str) -> Result<QueryOutput> {
        match kind {
            QueryKind::Single => {
                let id = single_target(query)?;
                Ok(QueryOutput::Element(self.get_element_by_id(id)))
            }
            _ => Ok(QueryOutput::Collection(LiveCollection::new(
                self.clone(),
                kind,
                query,
            )?)),
        }
    }

    fn is_attached(&self, element: &Element) -> bool {
        self.contains(element)
    }

    fn subscribe(&self, options: ObserveOptions) -> Result<MutationStream> {
        Document::subscribe(self, options)
    }

    async fn ready(&self) {
        self.wait_ready().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_target() {
        assert_eq!(single_target("#main").unwrap(), "main");
        assert_eq!(single_target("main").unwrap(), "main");
        assert!(single_target("#").is_err());
        assert!(single_target("a b").is_err());
    }

    #[test]
    fn test_document_host_queries() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(&div, "id", "a");
        doc.set_attribute(&div, "class", "card");
        doc.append_child(&doc.root(), &div).unwrap();
        let host: &dyn TreeHost = &doc;

        match host.execute_query(QueryKind::Single, "#a").unwrap() {
            QueryOutput::Element(Some(el)) => assert_eq!(el, div),
            other => panic!("Expected element, got {:?}", other),
        }
        match host.execute_query(QueryKind::FreeSelector, "div.card").unwrap() {
            QueryOutput::Collection(c) => assert_eq!(c.len(), 1),
            other => panic!("Expected collection, got {:?}", other),
        }
        assert!(host.execute_query(QueryKind::FreeSelector, "div..").is_err());
        assert!(host.is_attached(&div));
        doc.remove(&div).unwrap();
        assert!(!host.is_attached(&div));
    }
}
