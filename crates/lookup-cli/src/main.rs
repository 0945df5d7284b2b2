use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use lookup_core::QueryKind;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::*;
use config::{Config, OutputFormat};

#[derive(Parser)]
#[command(name = "lk")]
#[command(author, version, about = "Live lookup cache - memoized element lookups over mutating documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, global = true)]
    output: Option<OutputFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a lookup through the cache
    Query {
        /// Document file (JSON element tree)
        #[arg(short, long)]
        doc: PathBuf,

        /// Query kind (id, class, tag, name, selector)
        #[arg(short, long, default_value = "selector")]
        kind: QueryKind,

        /// Raw query
        #[arg(short, long)]
        query: String,

        /// Number of times to resolve
        #[arg(short, long, default_value = "1")]
        repeat: usize,
    },

    /// Replay a mutation script against a live document
    Replay {
        /// Document file (JSON element tree)
        #[arg(short, long)]
        doc: PathBuf,

        /// Script file (JSON array of steps)
        #[arg(short, long)]
        script: PathBuf,
    },

    /// Compare cached and uncached resolution
    Bench {
        /// Document file (JSON element tree)
        #[arg(short, long)]
        doc: PathBuf,

        /// Query kind (id, class, tag, name, selector)
        #[arg(short, long, default_value = "selector")]
        kind: QueryKind,

        /// Raw query
        #[arg(short, long)]
        query: String,

        /// Number of iterations
        #[arg(short, long, default_value = "1000")]
        iterations: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    }
    .with_output(cli.output);

    if config.output_format == OutputFormat::Table {
        print_banner();
    }

    match cli.command {
        Commands::Query {
            doc,
            kind,
            query,
            repeat,
        } => {
            run_query(&doc, kind, &query, repeat, &config).await?;
        }
        Commands::Replay { doc, script } => {
            run_replay(&doc, &script, &config).await?;
        }
        Commands::Bench {
            doc,
            kind,
            query,
            iterations,
        } => {
            run_benchmark(&doc, kind, &query, iterations, &config).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "lookup_cli=debug,lookup_cache=debug,lookup_core=debug"
    } else {
        "lookup_cli=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
  _             _
 | | ___   ___ | | ___   _ _ __
 | |/ _ \ / _ \| |/ / | | | '_ \
 | | (_) | (_) |   <| |_| | |_) |
 |_|\___/ \___/|_|\_\\__,_| .__/
                          |_|
    "#
        .bright_cyan()
    );
    println!("{}", "Live Lookup Cache v0.1.0\n".bright_yellow());
}
