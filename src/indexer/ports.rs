//! Collaborators the indexer drives but does not own
//!
//! Each trait is the narrow seam to one external system: the entity store,
//! chain state queries, the fee oracle and the account/transfer updater.

use crate::chain::RawEvent;
use crate::db::{
    BlockRecord, DescriptionKind, DescriptionRecord, EventRecord, ExtensionRecords,
    ExtrinsicRecord, LogRecord, SessionRecord, SpecVersionRecord,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Everything derived from one block, written as a single unit
#[derive(Debug, Clone)]
pub struct BlockBatch {
    pub block: BlockRecord,
    pub logs: Vec<LogRecord>,
    /// Present only when the block opened a session not yet stored
    pub session: Option<SessionRecord>,
    /// Present only when the block starts a new runtime version
    pub spec_version: Option<SpecVersionRecord>,
    pub extension: Option<ExtensionRecords>,
    pub extrinsics: Vec<ExtrinsicRecord>,
    pub events: Vec<EventRecord>,
}

/// Durable entity storage
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn block_exists(&self, block_number: u64) -> Result<bool>;

    async fn get_description(
        &self,
        kind: DescriptionKind,
        id: &str,
    ) -> Result<Option<DescriptionRecord>>;

    /// Create a description; an existing id is left untouched
    async fn create_description(
        &self,
        kind: DescriptionKind,
        record: &DescriptionRecord,
    ) -> Result<()>;

    async fn get_session(&self, session_id: u32) -> Result<Option<SessionRecord>>;

    async fn get_spec_version(&self, spec_version: u32) -> Result<Option<SpecVersionRecord>>;

    /// Persist a whole block atomically: either every record lands or none does
    async fn bulk_create(&self, batch: &BlockBatch) -> Result<()>;
}

/// Chain state queried at a specific block
#[async_trait]
pub trait ChainState: Send + Sync {
    async fn current_session_index(&self, block_hash: &str) -> Result<u32>;

    /// Validator set of the session active at `block_hash`, in authority index order
    async fn session_validators(&self, block_hash: &str) -> Result<Vec<String>>;
}

/// Transaction fee lookup
#[async_trait]
pub trait FeeOracle: Send + Sync {
    /// Fee of the encoded extrinsic as a decimal string, `None` when unavailable
    async fn fee(&self, extrinsic_hex: &str, block_hash: &str) -> Result<Option<String>>;
}

/// Request to record a balance transfer
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub event_id: &'a str,
    pub event: &'a RawEvent,
    pub block_id: u64,
    pub block_hash: &'a str,
    pub timestamp: DateTime<Utc>,
    pub extrinsic_id: Option<&'a str>,
}

/// Balance and transfer bookkeeping triggered by events
#[async_trait]
pub trait AccountUpdater: Send + Sync {
    async fn refresh_accounts(&self, account_ids: &[String]) -> Result<()>;

    async fn record_transfer(&self, request: TransferRequest<'_>) -> Result<()>;
}

/// Fee oracle used when fee lookups are disabled
pub struct NoFees;

#[async_trait]
impl FeeOracle for NoFees {
    async fn fee(&self, _extrinsic_hex: &str, _block_hash: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
