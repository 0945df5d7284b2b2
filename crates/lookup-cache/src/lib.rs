//! Lookup result cache for live documents
//!
//! This crate memoizes element lookups (by id, class, tag, name or selector)
//! against a [`TreeHost`](lookup_core::TreeHost) and keeps the memoized
//! results correct while the tree mutates.
//!
//! # Features
//!
//! - **Bounded store**: the entry inserted longest ago is evicted at capacity
//! - **Validation on read**: detached results are dropped instead of served
//! - **Change observation**: mutation notifications are classified into the
//!   ids, classes, tags and names they touch
//! - **Debounced invalidation**: a burst of mutations becomes one pass that
//!   removes only the entries referencing an affected identifier
//! - **Sweeps**: a low-priority background pass drops detached entries
//! - **Weak metadata**: per-element bookkeeping that never keeps elements alive
//! - **Statistics**: hits, misses, evictions, invalidations and sweeps
//!
//! # Example
//!
//! ```ignore
//! use lookup_cache::{CacheConfig, QueryCache};
//! use lookup_core::Document;
//! use std::sync::Arc;
//!
//! let doc = Document::from_json_file("page.json".as_ref())?;
//! let cache = QueryCache::start(Arc::new(doc.clone()), CacheConfig::default());
//!
//! // First call walks the tree, the second is served from the cache
//! let items = cache.by_class("item");
//! let items = cache.by_class("item");
//! println!("hit rate {:.2}", cache.stats().hit_rate());
//! ```

pub mod cache;
pub mod config;
pub mod debounce;
pub mod invalidation;
pub mod key;
pub mod metadata;
pub mod observer;
pub mod result;
pub mod stats;
pub mod store;
pub mod surface;
pub mod sweeper;
pub mod validator;

pub use cache::{CacheState, QueryCache};
pub use config::CacheConfig;
pub use invalidation::{CacheInvalidator, InvalidationOutcome};
pub use key::CacheKey;
pub use metadata::MetadataRecord;
pub use observer::AffectedIdentifiers;
pub use result::CachedResult;
pub use stats::{CacheStats, StatsSnapshot};
