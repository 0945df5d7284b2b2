//! Live Lookup Example
//!
//! Resolves lookups through the cache while the document mutates underneath.

use anyhow::{Context, Result};
use examples_package::{print_stats, sample_document};
use lookup_cache::{CacheConfig, QueryCache};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Live Lookup Example ===\n");

    let doc = sample_document()?;
    let cache = QueryCache::start(Arc::new(doc.clone()), CacheConfig::default());
    println!("Observing mutations: {}\n", cache.is_observing());

    // Example 1: miss then hit
    println!("--- Example 1: Memoized lookups ---\n");
    let items = cache.by_class("item").context("no .item collection")?;
    println!("First lookup of .item: {} elements (miss)", items.len());
    let again = cache.by_class("item").context("no .item collection")?;
    println!("Second lookup shares the handle: {}", again.ptr_eq(&items));

    // Example 2: held collections are live
    println!("\n--- Example 2: Live collections ---\n");
    let nav = doc.get_element_by_id("nav").context("no #nav")?;
    let extra = doc.create_element("li");
    doc.set_attribute(&extra, "class", "item");
    doc.append_child(&nav, &extra)?;
    println!("After appending an item, held collection has {} elements", items.len());

    // Example 3: an id rename invalidates only what it touches
    println!("\n--- Example 3: Selective invalidation ---\n");
    let submit = cache.by_id("#submit");
    println!("#submit resolves to {:?}", submit);
    if let Some(button) = &submit {
        doc.set_attribute(button, "id", "send");
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("#submit after rename: {:?}", cache.by_id("#submit"));
    println!("#send after rename:   {:?}", cache.by_id("#send"));

    println!();
    print_stats(&cache);

    cache.destroy();
    println!("\n=== Live lookup example completed! ===");
    Ok(())
}
