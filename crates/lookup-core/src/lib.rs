//! Live document model for the lookup cache
//!
//! Elements, live collections, mutation notifications and the
//! [`TreeHost`] interface the cache is written against.

pub mod collection;
pub mod document;
pub mod element;
pub mod error;
pub mod host;
pub mod mutation;
pub mod selector;
pub mod template;
pub mod types;

pub use collection::{LiveCollection, Matcher};
pub use document::Document;
pub use element::{Element, WeakElement};
pub use error::{LookupError, Result};
pub use host::{single_target, QueryOutput, TreeHost};
pub use mutation::{MutationBatch, MutationRecord, MutationStream, ObserveOptions};
pub use selector::Selector;
pub use template::NodeTemplate;
pub use types::*;
