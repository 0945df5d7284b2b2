use crate::config::{Config, OutputFormat};
use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{Cell, Color, Table as ComfyTable};
use lookup_cache::{CachedResult, QueryCache};
use lookup_core::{Document, Element, LookupError, NodeTemplate, QueryKind, TreeHost};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One step of a replay script
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Resolve { kind: QueryKind, query: String },
    SetAttribute { target: String, name: String, value: String },
    RemoveAttribute { target: String, name: String },
    Append { parent: String, node: NodeTemplate },
    Remove { target: String },
    Wait { ms: u64 },
    Flush,
    Sweep,
}

fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        anyhow::bail!("Document not found: {:?}", path);
    }
    let doc =
        Document::from_json_file(path).with_context(|| format!("Failed to load {:?}", path))?;
    tracing::info!(
        "Loaded {:?} ({} elements)",
        path,
        doc.all_elements().len()
    );
    Ok(doc)
}

pub async fn run_query(
    doc_path: &Path,
    kind: QueryKind,
    query: &str,
    repeat: usize,
    config: &Config,
) -> Result<()> {
    let doc = load_document(doc_path)?;
    let cache = QueryCache::start(Arc::new(doc), config.cache_config());

    println!(
        "{} Resolving {} '{}'",
        "→".bright_blue(),
        kind.as_str().bright_cyan(),
        query
    );

    let start = Instant::now();
    let mut result = None;
    for _ in 0..repeat.max(1) {
        result = cache.resolve(kind, query);
    }
    let elapsed = start.elapsed();

    match config.output_format {
        OutputFormat::Table => {
            match &result {
                Some(result) => print_elements(&result.elements(), config.max_rows),
                None => println!("{}", "No match".bright_black()),
            }
            if config.show_timing {
                println!(
                    "{} {:.3}ms for {} resolve(s)",
                    "Time:".bright_yellow(),
                    elapsed.as_secs_f64() * 1000.0,
                    repeat.max(1)
                );
            }
            print_stats(&cache);
        }
        OutputFormat::Json => {
            let elements: Vec<serde_json::Value> = result
                .map(|r| r.elements())
                .unwrap_or_default()
                .iter()
                .map(element_json)
                .collect();
            let output = serde_json::json!({
                "kind": kind,
                "query": query,
                "elements": elements,
                "stats": cache.snapshot(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    cache.destroy();
    Ok(())
}

pub async fn run_replay(doc_path: &Path, script_path: &Path, config: &Config) -> Result<()> {
    let doc = load_document(doc_path)?;
    let contents = std::fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script {:?}", script_path))?;
    let steps: Vec<Step> = serde_json::from_str(&contents)?;

    let cache = QueryCache::start(Arc::new(doc.clone()), config.cache_config());
    let json = config.output_format == OutputFormat::Json;

    if !json {
        println!(
            "{} Replaying {} steps (observing: {})",
            "→".bright_blue(),
            steps.len(),
            cache.is_observing()
        );
    }

    let mut outcomes = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let outcome = apply_step(&doc, &cache, step).await?;
        if !json {
            println!("  {:>3}. {}", index + 1, outcome);
        }
        outcomes.push(outcome);
    }

    if json {
        let output = serde_json::json!({
            "steps": outcomes,
            "stats": cache.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_stats(&cache);
    }

    cache.destroy();
    Ok(())
}

fn find(doc: &Document, id: &str) -> Result<Element> {
    let id = id.strip_prefix('#').unwrap_or(id);
    doc.get_element_by_id(id)
        .ok_or_else(|| LookupError::NodeNotFound(id.to_string()).into())
}

async fn apply_step(doc: &Document, cache: &QueryCache, step: &Step) -> Result<String> {
    let outcome = match step {
        Step::Resolve { kind, query } => {
            let hits = cache.stats().hits();
            let result = cache.resolve(*kind, query);
            let source = if cache.stats().hits() > hits {
                "hit"
            } else {
                "miss"
            };
            format!(
                "resolve {} '{}' -> {} ({})",
                kind,
                query,
                describe_result(result.as_ref()),
                source
            )
        }
        Step::SetAttribute {
            target,
            name,
            value,
        } => {
            doc.set_attribute(&find(doc, target)?, name, value);
            format!("set {}={:?} on #{}", name, value, target)
        }
        Step::RemoveAttribute { target, name } => {
            doc.remove_attribute(&find(doc, target)?, name);
            format!("remove {} from #{}", name, target)
        }
        Step::Append { parent, node } => {
            let element = node.instantiate(doc)?;
            doc.append_child(&find(doc, parent)?, &element)?;
            format!("append {:?} under #{}", element, parent)
        }
        Step::Remove { target } => {
            doc.remove(&find(doc, target)?)?;
            format!("remove #{}", target)
        }
        Step::Wait { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            format!("wait {}ms ({} entries cached)", ms, cache.len())
        }
        Step::Flush => match cache.flush() {
            Some(outcome) => format!("flush -> {:?}", outcome),
            None => "flush -> nothing pending".to_string(),
        },
        Step::Sweep => format!("sweep -> {} removed", cache.sweep()),
    };
    Ok(outcome)
}

pub async fn run_benchmark(
    doc_path: &Path,
    kind: QueryKind,
    query: &str,
    iterations: usize,
    config: &Config,
) -> Result<()> {
    let doc = load_document(doc_path)?;
    let host: Arc<dyn TreeHost> = Arc::new(doc);
    let cache = QueryCache::new(Arc::clone(&host), config.cache_config());
    let iterations = iterations.max(1);

    println!(
        "{} Running benchmark with {} iterations...",
        "→".bright_blue(),
        iterations
    );

    let mut uncached = Vec::with_capacity(iterations);
    let mut matched = 0;
    for _ in 0..iterations {
        let start = Instant::now();
        matched = match host.execute_query(kind, query)? {
            lookup_core::QueryOutput::Element(element) => usize::from(element.is_some()),
            lookup_core::QueryOutput::Collection(collection) => collection.len(),
        };
        uncached.push(start.elapsed());
    }

    let mut cached = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        let _ = cache
            .resolve(kind, query)
            .map(|result| match result {
                CachedResult::Element(_) => 1,
                CachedResult::Collection(collection) => collection.len(),
            });
        cached.push(start.elapsed());
    }

    println!("Query: {} '{}' ({} matches)\n", kind, query.bright_white(), matched);

    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Mode").fg(Color::Cyan),
        Cell::new("Average").fg(Color::Yellow),
        Cell::new("Median").fg(Color::Yellow),
        Cell::new("Min").fg(Color::Green),
        Cell::new("Max").fg(Color::Magenta),
    ]);
    for (mode, times) in [("uncached", &mut uncached), ("cached", &mut cached)] {
        let summary = summarize(times);
        table.add_row(vec![
            mode.to_string(),
            format_ms(summary.average),
            format_ms(summary.median),
            format_ms(summary.min),
            format_ms(summary.max),
        ]);
    }
    println!("{}", table);

    let speedup = average(&uncached).as_secs_f64() / average(&cached).as_secs_f64().max(1e-9);
    println!("{} {:.1}x", "Speedup:".bright_green().bold(), speedup);
    print_stats(&cache);
    Ok(())
}

struct Summary {
    average: Duration,
    median: Duration,
    min: Duration,
    max: Duration,
}

fn average(times: &[Duration]) -> Duration {
    if times.is_empty() {
        return Duration::ZERO;
    }
    times.iter().sum::<Duration>() / times.len() as u32
}

fn summarize(times: &mut [Duration]) -> Summary {
    times.sort();
    Summary {
        average: average(times),
        median: times.get(times.len() / 2).copied().unwrap_or_default(),
        min: times.first().copied().unwrap_or_default(),
        max: times.last().copied().unwrap_or_default(),
    }
}

fn format_ms(duration: Duration) -> String {
    format!("{:.4}ms", duration.as_secs_f64() * 1000.0)
}

fn describe_result(result: Option<&CachedResult>) -> String {
    match result {
        None => "none".to_string(),
        Some(CachedResult::Element(element)) => format!("{:?}", element),
        Some(CachedResult::Collection(collection)) => format!("{} element(s)", collection.len()),
    }
}

fn element_json(element: &Element) -> serde_json::Value {
    serde_json::json!({
        "uid": element.uid().as_u64(),
        "tag": element.tag_name(),
        "id": element.id(),
        "class": element.attribute("class"),
        "name": element.name(),
    })
}

fn print_elements(elements: &[Element], max_rows: usize) {
    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("Tag").fg(Color::Yellow),
        Cell::new("Id").fg(Color::Green),
        Cell::new("Class").fg(Color::Magenta),
        Cell::new("Name").fg(Color::Blue),
    ]);

    for (index, element) in elements.iter().take(max_rows).enumerate() {
        table.add_row(vec![
            index.to_string(),
            element.tag_name().to_string(),
            element.id().unwrap_or_default(),
            element.attribute("class").unwrap_or_default(),
            element.name().unwrap_or_default(),
        ]);
    }
    println!("{}", table);

    if elements.len() > max_rows {
        println!(
            "{}",
            format!("... {} more", elements.len() - max_rows).bright_black()
        );
    }
}

pub fn print_stats(cache: &QueryCache) {
    let stats = cache.stats();

    println!();
    println!("{}", "Lookup Cache Statistics".bright_yellow().bold());
    println!();

    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Metric").fg(Color::Cyan),
        Cell::new("Value").fg(Color::Green),
    ]);

    table.add_row(vec![
        "Enabled",
        if cache.config().enabled { "Yes" } else { "No" },
    ]);
    table.add_row(vec![
        "Observing",
        if cache.is_observing() { "Yes" } else { "No" },
    ]);
    table.add_row(vec!["Entries", &stats.entry_count().to_string()]);
    table.add_row(vec!["Total Requests", &stats.total_requests().to_string()]);
    table.add_row(vec!["Hits", &stats.hits().to_string()]);
    table.add_row(vec!["Misses", &stats.misses().to_string()]);
    table.add_row(vec![
        "Hit Rate",
        &format!("{:.1}%", stats.hit_rate() * 100.0),
    ]);
    table.add_row(vec!["Evictions", &stats.evictions().to_string()]);
    table.add_row(vec!["Invalidations", &stats.invalidations().to_string()]);
    table.add_row(vec![
        "Invalidation Passes",
        &stats.invalidation_passes().to_string(),
    ]);
    table.add_row(vec!["Stale Reads", &stats.stale_reads().to_string()]);
    table.add_row(vec!["Sweeps", &stats.sweeps().to_string()]);
    table.add_row(vec!["Query Errors", &stats.query_errors().to_string()]);

    println!("{}", table);
}
