//! Index command - feed newline-delimited JSON blocks through the indexer

use crate::chain::RawBlock;
use crate::db::Database;
use crate::indexer::ports::{FeeOracle, NoFees};
use crate::indexer::{BlockOutcome, Indexer};
use crate::rpc::{RpcChainState, RpcClient, RpcFeeOracle};
use anyhow::{Context, Result};
use clap::Args;
use futures::Stream;
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::select;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Index command arguments
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Node RPC endpoint URL (session and fee queries)
    #[arg(short, long)]
    pub rpc_url: Option<String>,

    /// SQLite database path
    #[arg(short, long)]
    pub db_path: Option<PathBuf>,

    /// NDJSON file with one raw block per line ("-" for stdin)
    #[arg(short, long)]
    pub input: Option<String>,

    /// Skip fee lookups
    #[arg(long)]
    pub no_fees: bool,
}

/// Per-run block tally
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub indexed: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl IndexStats {
    fn record(&mut self, outcome: BlockOutcome) {
        match outcome {
            BlockOutcome::Indexed => self.indexed += 1,
            BlockOutcome::Skipped => self.skipped += 1,
            BlockOutcome::Failed => self.failed += 1,
        }
    }
}

/// Run the index command
pub async fn run(args: IndexArgs) -> Result<()> {
    let config = crate::config::Config::load()?;
    config.validate()?;

    // Use args or fall back to config
    let rpc_url = args.rpc_url.unwrap_or_else(|| config.rpc.url.clone());
    let db_path = args
        .db_path
        .unwrap_or_else(|| PathBuf::from(&config.database.path));
    let input = args.input.or_else(|| config.index.input.clone());
    let fees_enabled = config.fees.enabled && !args.no_fees;

    info!("Starting block indexing");
    info!("RPC endpoint: {}", rpc_url);
    info!("Database: {}", db_path.display());
    info!("Fee lookups: {}", if fees_enabled { "enabled" } else { "disabled" });

    let db = Arc::new(Database::open(&db_path)?);
    let rpc = RpcClient::with_timeout(&rpc_url, config.rpc.timeout_ms)
        .with_retry(config.rpc.retry_config());
    let fees: Arc<dyn FeeOracle> = if fees_enabled {
        Arc::new(RpcFeeOracle::new(rpc.clone()))
    } else {
        Arc::new(NoFees)
    };

    let indexer = Indexer::new(
        db.clone(),
        Arc::new(RpcChainState::new(rpc)),
        fees,
        db.clone(),
        config.indexer_options(),
    );

    // Set up signal handling for graceful shutdown
    let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])
        .context("Failed to register signal handlers")?;
    let handle = signals.handle();

    let stats = match input.as_deref() {
        None | Some("-") => {
            info!("Reading blocks from stdin");
            index_lines(&indexer, BufReader::new(tokio::io::stdin()), signals).await?
        }
        Some(path) => {
            info!("Reading blocks from {}", path);
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path))?;
            index_lines(&indexer, BufReader::new(file), signals).await?
        }
    };
    handle.close();

    info!(
        "Indexing finished: {} indexed, {} skipped, {} failed",
        stats.indexed, stats.skipped, stats.failed
    );
    if let Some(max) = db.get_max_block_number()? {
        info!("Highest indexed block: {}", max);
    }
    if stats.failed > 0 {
        warn!("{} block(s) failed and will be retried on the next run", stats.failed);
    }

    Ok(())
}

/// Index every line of `reader` in order until EOF or a shutdown signal
///
/// A signal is only acted on between blocks; the block in flight always
/// finishes.
pub async fn index_lines<R, S>(indexer: &Indexer, reader: R, shutdown: S) -> Result<IndexStats>
where
    R: AsyncBufRead + Unpin,
    S: Stream<Item = i32> + Unpin,
{
    let mut lines = reader.lines();
    let mut shutdown = shutdown.fuse();
    let mut stats = IndexStats::default();
    let mut line_number = 0u64;

    loop {
        select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    debug!("End of input after {} lines", line_number);
                    break;
                };
                line_number += 1;
                if line.trim().is_empty() {
                    continue;
                }

                let block: RawBlock = match serde_json::from_str(&line) {
                    Ok(block) => block,
                    Err(e) => {
                        warn!("Line {}: not a valid block: {}", line_number, e);
                        stats.failed += 1;
                        continue;
                    }
                };
                stats.record(indexer.index_block(&block).await);
            }
            Some(signal) = shutdown.next() => {
                match signal {
                    SIGTERM | SIGINT | SIGQUIT => {
                        info!("Received signal {}, initiating graceful shutdown...", signal);
                        break;
                    }
                    _ => {
                        debug!("Received unexpected signal {}", signal);
                    }
                }
            }
        }
    }

    Ok(stats)
}
