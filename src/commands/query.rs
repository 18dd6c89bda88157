//! Query command - query indexed chain data

use crate::db::{ChildTable, Database, DescriptionKind};
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// Query command arguments
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SQLite database path
    #[arg(short, long)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: QueryCommands,
}

#[derive(Subcommand, Debug)]
pub enum QueryCommands {
    /// Show database statistics
    Stats,

    /// List blocks in a range
    Blocks {
        /// Start block number
        #[arg(short, long)]
        from: Option<u64>,

        /// End block number
        #[arg(short, long)]
        to: Option<u64>,

        /// Number of blocks to show (default: 10)
        #[arg(short, long, default_value_t = 10)]
        limit: u64,
    },

    /// Show one block with its extrinsics, events and logs
    Block {
        /// Block number
        number: u64,
    },

    /// Find gaps in indexed blocks
    Gaps,

    /// List runtime spec versions and where they started
    SpecVersions,
}

/// Run the query command
pub async fn run(args: QueryArgs) -> Result<()> {
    let db_path = match args.db_path {
        Some(path) => path,
        None => PathBuf::from(crate::config::Config::load()?.database.path),
    };
    let db = Database::open(&db_path)?;

    match args.command {
        QueryCommands::Stats => run_stats(&db)?,
        QueryCommands::Blocks { from, to, limit } => run_blocks(&db, from, to, limit.max(1))?,
        QueryCommands::Block { number } => run_block(&db, number)?,
        QueryCommands::Gaps => run_gaps(&db)?,
        QueryCommands::SpecVersions => run_spec_versions(&db)?,
    }

    Ok(())
}

fn run_stats(db: &Database) -> Result<()> {
    info!("Database Statistics");
    info!("─────────────────────────────────────────");
    info!("Blocks:           {}", db.count_blocks()?);
    info!("Extrinsics:       {}", db.count_rows(ChildTable::Extrinsics)?);
    info!("Events:           {}", db.count_rows(ChildTable::Events)?);
    info!("Logs:             {}", db.count_rows(ChildTable::Logs)?);
    info!("Sessions:         {}", db.count_rows(ChildTable::Sessions)?);
    info!("Extensions:       {}", db.count_rows(ChildTable::HeaderExtensions)?);
    info!("Transfers:        {}", db.count_rows(ChildTable::Transfers)?);
    info!(
        "Descriptions:     {} call, {} event",
        db.count_descriptions(DescriptionKind::Extrinsic)?,
        db.count_descriptions(DescriptionKind::Event)?
    );
    info!("Pending refresh:  {}", db.get_pending_refreshes()?.len());

    if let Some(max_block) = db.get_max_block_number()? {
        if let Some(min_block) = db.get_blocks_in_range(0, max_block, Some(1))?.first() {
            info!("─────────────────────────────────────────");
            info!("Block range:      {} - {}", min_block.block_number, max_block);
        }
    }

    // Check for gaps
    let gaps = db.find_gaps()?;
    if gaps.is_empty() {
        info!("Gaps:             None (continuous)");
    } else {
        info!("Gaps:             {} gap(s) detected", gaps.len());
    }

    Ok(())
}

fn run_blocks(db: &Database, from: Option<u64>, to: Option<u64>, limit: u64) -> Result<()> {
    let (start, end) = match (from, to) {
        (Some(f), Some(t)) => (f, t),
        (Some(f), None) => (f, f.saturating_add(limit - 1)),
        (None, Some(t)) => (t.saturating_sub(limit - 1), t),
        (None, None) => {
            // Show most recent blocks
            let max = db.get_max_block_number()?.unwrap_or(0);
            (max.saturating_sub(limit - 1), max)
        }
    };

    let blocks = db.get_blocks_in_range(start, end, Some(fetch_limit(limit)))?;

    if blocks.is_empty() {
        info!("No blocks found in range {} - {}", start, end);
        return Ok(());
    }

    info!("Blocks {} - {} ({} found)", start, end, blocks.len());
    info!("─────────────────────────────────────────────────────────────────────────────");
    info!(
        "{:>10} {:>8} {:>6} {:>10} {:>14} {:>10}",
        "Block", "Session", "Spec", "Extrinsics", "Author", "Hash"
    );
    info!("─────────────────────────────────────────────────────────────────────────────");

    for block in blocks.iter().take(limit as usize) {
        let session = block
            .session_id
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let author = block.author.as_deref().map_or("-", |a| short(a, 12));
        info!(
            "{:>10} {:>8} {:>6} {:>10} {:>14} {}...",
            block.block_number,
            session,
            block.spec_version,
            block.extrinsics_count,
            author,
            short(&block.block_hash, 12)
        );
    }

    if blocks.len() > limit as usize {
        info!("... and {} more", blocks.len() - limit as usize);
    }

    Ok(())
}

fn run_block(db: &Database, number: u64) -> Result<()> {
    let Some(block) = db.get_block(number)? else {
        info!("Block #{} is not indexed", number);
        return Ok(());
    };

    info!("Block #{}", block.block_number);
    info!("─────────────────────────────────────────");
    info!("Hash:             {}", block.block_hash);
    info!("Parent:           {}", block.parent_hash);
    info!("Timestamp:        {}", block.timestamp.to_rfc3339());
    info!("Spec version:     {}", block.spec_version);
    info!(
        "Session:          {}",
        block.session_id.map_or_else(|| "-".to_string(), |s| s.to_string())
    );
    info!("Author:           {}", block.author.as_deref().unwrap_or("-"));

    let extrinsics = db.get_extrinsics_for_block(number)?;
    info!("─────────────────────────────────────────");
    info!("Extrinsics ({})", extrinsics.len());
    for ext in &extrinsics {
        let status = if ext.success { "✓" } else { "✗" };
        let fee = ext
            .fees_rounded
            .map_or_else(|| "-".to_string(), |f| f.to_string());
        info!(
            "  {} {} {}.{} events={} fee={}",
            ext.id, status, ext.module, ext.call, ext.nb_events, fee
        );
    }

    let events = db.get_events_for_block(number)?;
    info!("─────────────────────────────────────────");
    info!("Events ({})", events.len());
    for event in &events {
        info!(
            "  {} {}.{} [{}]",
            event.id,
            event.module,
            event.event,
            event.arg_values.join(", ")
        );
    }

    let logs = db.get_logs_for_block(number)?;
    info!("─────────────────────────────────────────");
    info!("Logs ({})", logs.len());
    for log in &logs {
        info!(
            "  {} {} {} {}",
            log.id,
            log.log_type,
            log.engine.as_deref().unwrap_or("-"),
            short(&log.data, 40)
        );
    }

    if let Some(ext) = db.get_extension_for_block(number)? {
        info!("─────────────────────────────────────────");
        info!("Header extension {}", ext.extension.version);
        info!(
            "  Matrix:         {} x {}",
            ext.commitment.rows, ext.commitment.cols
        );
        info!(
            "  Data root:      {}",
            ext.commitment.data_root.as_deref().unwrap_or("-")
        );
        info!("  App lookup:     size {}", ext.app_lookup.size);
    }

    let transfers = db.get_transfers_for_block(number)?;
    if !transfers.is_empty() {
        info!("─────────────────────────────────────────");
        info!("Transfers ({})", transfers.len());
        for t in &transfers {
            info!("  {} {} -> {} amount={}", t.id, t.from, t.to, t.amount);
        }
    }

    Ok(())
}

fn run_gaps(db: &Database) -> Result<()> {
    let gaps = db.find_gaps()?;

    if gaps.is_empty() {
        info!("No gaps found - block data is continuous");
        return Ok(());
    }

    info!("Found {} gap(s) in block data:", gaps.len());
    info!("─────────────────────────────────────────");
    info!("{:>12} {:>12} {:>12}", "From", "To", "Missing");
    info!("─────────────────────────────────────────");

    let mut total_missing = 0u64;
    for (start, end) in &gaps {
        let missing = end - start + 1;
        total_missing += missing;
        info!("{:>12} {:>12} {:>12}", start, end, missing);
    }

    info!("─────────────────────────────────────────");
    info!("Total missing blocks: {}", total_missing);
    info!("");
    info!("Re-run avix index with the missing blocks to fill them");

    Ok(())
}

fn run_spec_versions(db: &Database) -> Result<()> {
    let versions = db.list_spec_versions()?;

    if versions.is_empty() {
        info!("No spec versions recorded");
        return Ok(());
    }

    info!("{:>12} {:>14}", "Spec", "First block");
    info!("─────────────────────────────────────────");
    for v in &versions {
        info!("{:>12} {:>14}", v.spec_version, v.block_height);
    }

    Ok(())
}

/// Rows to fetch for `limit`: one extra to detect "... and more"
fn fetch_limit(limit: u64) -> u32 {
    limit.min(u32::MAX as u64 - 1) as u32 + 1
}

fn short(s: &str, len: usize) -> &str {
    s.get(..len).unwrap_or(s)
}
