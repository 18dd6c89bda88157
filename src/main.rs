mod chain;
mod commands;
mod config;
mod db;
mod indexer;
mod rpc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ConfigArgs, IndexArgs, QueryArgs};
use tracing_subscriber::EnvFilter;

/// Avail Indexer - Normalize Avail chain blocks into SQLite
#[derive(Parser, Debug)]
#[command(name = "avix")]
#[command(version, about = "Block indexer for Avail chains")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index blocks from an NDJSON feed
    Index(IndexArgs),

    /// Query indexed data
    Query(QueryArgs),

    /// Inspect and validate configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Index(args) => commands::index::run(args).await,
        Commands::Query(args) => commands::query::run(args).await,
        Commands::Config(args) => commands::config::run(args).await,
    }
}
