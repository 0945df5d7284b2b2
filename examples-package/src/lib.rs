//! Shared fixtures for the runnable examples

use lookup_cache::QueryCache;
use lookup_core::{Document, NodeTemplate, Result};

/// A small page: a nav list, a signup form and a footer
pub fn sample_document() -> Result<Document> {
    let nav = (1..=3).fold(NodeTemplate::new("ul").with_id("nav"), |nav, i| {
        nav.with_child(
            NodeTemplate::new("li")
                .with_id(format!("nav-{}", i))
                .with_class(if i == 1 { "item active" } else { "item" }),
        )
    });
    let form = NodeTemplate::new("form")
        .with_id("signup")
        .with_child(
            NodeTemplate::new("input")
                .with_name("email")
                .with_class("field required"),
        )
        .with_child(NodeTemplate::new("input").with_name("phone").with_class("field"))
        .with_child(NodeTemplate::new("button").with_id("submit").with_class("primary"));

    let page = NodeTemplate::new("html").with_child(
        NodeTemplate::new("body")
            .with_child(nav)
            .with_child(form)
            .with_child(NodeTemplate::new("footer").with_id("footer")),
    );
    Document::from_template(&page)
}

pub fn print_stats(cache: &QueryCache) {
    let stats = cache.stats();
    println!("Cache Statistics:");
    println!("  Hits:          {}", stats.hits());
    println!("  Misses:        {}", stats.misses());
    println!("  Hit Rate:      {:.1}%", stats.hit_rate() * 100.0);
    println!("  Evictions:     {}", stats.evictions());
    println!("  Invalidations: {}", stats.invalidations());
    println!("  Passes:        {}", stats.invalidation_passes());
    println!("  Sweeps:        {}", stats.sweeps());
    println!("  Entries:       {}", stats.entry_count());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_document() {
        let doc = sample_document().unwrap();
        assert_eq!(doc.elements_by_class("item").unwrap().len(), 3);
        assert!(doc.get_element_by_id("submit").is_some());
        assert_eq!(doc.elements_by_name("email").unwrap().len(), 1);
    }
}
