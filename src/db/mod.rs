mod accounts;
mod blocks;
mod descriptions;
mod extensions;
mod runtime;
mod schema;

pub use accounts::*;
pub use blocks::*;
pub use descriptions::*;
pub use extensions::*;
pub use runtime::*;
pub use schema::init_schema;

#[cfg(test)]
pub(crate) use blocks::tests::sample_block;

use crate::chain::arg_to_string;
use crate::indexer::ports::{AccountUpdater, BlockBatch, EntityStore, TransferRequest};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Database wrapper for the indexer
///
/// The connection sits behind a mutex so the database can be shared by the
/// concurrently polled decoding futures of one block.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database at the specified path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        // Enable WAL mode for better performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    // Block operations
    pub fn get_block(&self, block_number: u64) -> Result<Option<BlockRecord>> {
        blocks::get_block(&*self.conn()?, block_number)
    }

    pub fn get_max_block_number(&self) -> Result<Option<u64>> {
        blocks::get_max_block_number(&*self.conn()?)
    }

    pub fn count_blocks(&self) -> Result<u64> {
        blocks::count_blocks(&*self.conn()?)
    }

    pub fn count_rows(&self, table: ChildTable) -> Result<u64> {
        blocks::count_rows(&*self.conn()?, table)
    }

    pub fn get_blocks_in_range(
        &self,
        from: u64,
        to: u64,
        limit: Option<u32>,
    ) -> Result<Vec<BlockRecord>> {
        blocks::get_blocks_in_range(&*self.conn()?, from, to, limit)
    }

    pub fn get_extrinsics_for_block(&self, block_number: u64) -> Result<Vec<ExtrinsicRecord>> {
        blocks::get_extrinsics_for_block(&*self.conn()?, block_number)
    }

    pub fn get_events_for_block(&self, block_number: u64) -> Result<Vec<EventRecord>> {
        blocks::get_events_for_block(&*self.conn()?, block_number)
    }

    pub fn get_logs_for_block(&self, block_number: u64) -> Result<Vec<LogRecord>> {
        blocks::get_logs_for_block(&*self.conn()?, block_number)
    }

    pub fn find_gaps(&self) -> Result<Vec<(u64, u64)>> {
        blocks::find_gaps(&*self.conn()?)
    }

    // Runtime and metadata operations
    pub fn list_spec_versions(&self) -> Result<Vec<SpecVersionRecord>> {
        runtime::list_spec_versions(&*self.conn()?)
    }

    pub fn count_descriptions(&self, kind: DescriptionKind) -> Result<u64> {
        descriptions::count_descriptions(&*self.conn()?, kind)
    }

    pub fn get_extension_for_block(&self, block_number: u64) -> Result<Option<ExtensionRecords>> {
        extensions::get_extension_for_block(&*self.conn()?, block_number)
    }

    // Account operations
    pub fn get_pending_refreshes(&self) -> Result<Vec<String>> {
        accounts::get_pending_refreshes(&*self.conn()?)
    }

    pub fn get_transfers_for_block(&self, block_number: u64) -> Result<Vec<TransferRecord>> {
        accounts::get_transfers_for_block(&*self.conn()?, block_number)
    }
}

#[async_trait]
impl EntityStore for Database {
    async fn block_exists(&self, block_number: u64) -> Result<bool> {
        blocks::block_exists(&*self.conn()?, block_number)
    }

    async fn get_description(
        &self,
        kind: DescriptionKind,
        id: &str,
    ) -> Result<Option<DescriptionRecord>> {
        descriptions::get_description(&*self.conn()?, kind, id)
    }

    async fn create_description(
        &self,
        kind: DescriptionKind,
        record: &DescriptionRecord,
    ) -> Result<()> {
        descriptions::insert_description(&*self.conn()?, kind, record)?;
        Ok(())
    }

    async fn get_session(&self, session_id: u32) -> Result<Option<SessionRecord>> {
        runtime::get_session(&*self.conn()?, session_id)
    }

    async fn get_spec_version(&self, spec_version: u32) -> Result<Option<SpecVersionRecord>> {
        runtime::get_spec_version(&*self.conn()?, spec_version)
    }

    async fn bulk_create(&self, batch: &BlockBatch) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let block_number = batch.block.block_number;

        blocks::insert_block(&tx, &batch.block)
            .with_context(|| format!("Failed to insert block {}", block_number))?;
        for log in &batch.logs {
            blocks::insert_log(&tx, log)?;
        }
        if let Some(session) = &batch.session {
            runtime::insert_session(&tx, session)?;
        }
        if let Some(spec_version) = &batch.spec_version {
            runtime::insert_spec_version(&tx, spec_version)?;
        }
        if let Some(extension) = &batch.extension {
            extensions::insert_extension(&tx, extension)?;
        }
        for ext in &batch.extrinsics {
            blocks::insert_extrinsic(&tx, ext)
                .with_context(|| format!("Failed to insert extrinsic {}", ext.id))?;
        }
        for event in &batch.events {
            blocks::insert_event(&tx, event)
                .with_context(|| format!("Failed to insert event {}", event.id))?;
        }

        tx.commit()
            .with_context(|| format!("Failed to commit block {}", block_number))?;
        Ok(())
    }
}

#[async_trait]
impl AccountUpdater for Database {
    async fn refresh_accounts(&self, account_ids: &[String]) -> Result<()> {
        accounts::queue_account_refresh(&*self.conn()?, account_ids)
    }

    async fn record_transfer(&self, request: TransferRequest<'_>) -> Result<()> {
        let data = &request.event.data;
        if data.len() < 3 {
            anyhow::bail!(
                "Transfer event {} carries {} args, expected from, to, amount",
                request.event_id,
                data.len()
            );
        }

        let transfer = TransferRecord {
            id: request.event_id.to_string(),
            from: arg_to_string(&data[0]),
            to: arg_to_string(&data[1]),
            amount: arg_to_string(&data[2]),
            block_id: request.block_id,
            block_hash: request.block_hash.to_string(),
            timestamp: request.timestamp,
            extrinsic_id: request.extrinsic_id.map(str::to_string),
        };
        accounts::insert_transfer(&*self.conn()?, &transfer)
    }
}
