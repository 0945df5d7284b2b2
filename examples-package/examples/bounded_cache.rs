//! Bounded Cache Example
//!
//! Runs the cache without a runtime: eviction at capacity, manual
//! notification and flush, on-demand sweeps and teardown.

use anyhow::{Context, Result};
use examples_package::{print_stats, sample_document};
use lookup_cache::{CacheConfig, QueryCache};
use lookup_core::{ObserveOptions, QueryKind};
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== Bounded Cache Example ===\n");

    let doc = sample_document()?;
    let config = CacheConfig::default().with_max_size(3);
    let cache = QueryCache::new(Arc::new(doc.clone()), config);

    // Example 1: the oldest insertion is evicted at capacity
    println!("--- Example 1: Eviction ---\n");
    for id in ["nav-1", "nav-2", "nav-3", "signup", "footer"] {
        cache.resolve(QueryKind::Single, id);
    }
    let keys: Vec<String> = cache.keys().iter().map(|k| k.to_string()).collect();
    println!("Cached keys (newest first): {:?}", keys);
    println!("Evictions: {}", cache.stats().evictions());

    // Example 2: feeding notifications by hand
    println!("\n--- Example 2: Manual notifications ---\n");
    let mut stream = doc.subscribe(ObserveOptions::lookup_attributes())?;
    let footer = doc.get_element_by_id("footer").context("no #footer")?;
    doc.set_attribute(&footer, "id", "bottom");
    cache.notify(stream.take_records());
    println!("Flush: {:?}", cache.flush());
    println!("#footer still cached: {}", cache.contains_key(QueryKind::Single, "footer"));

    // Example 3: sweeping detached entries
    println!("\n--- Example 3: Sweep ---\n");
    let signup = doc.get_element_by_id("signup").context("no #signup")?;
    doc.remove(&signup)?;
    println!("Sweep removed {} entries", cache.sweep());

    println!();
    print_stats(&cache);

    cache.destroy();
    println!("\nAfter destroy: {:?}, {} entries", cache.state(), cache.len());
    Ok(())
}
