//! Block orchestrator
//!
//! Turns one raw block into every derived record and hands them to the store
//! as a single batch. Runs in two waves on the calling task:
//! 1. header data: logs, session/author, spec version, header extension
//! 2. every extrinsic and event, decoded concurrently
//!
//! Header-level failures are logged and leave the affected fields empty.
//! Extrinsic and event failures abort the block, so nothing of it is written
//! and the next run retries it.

pub mod descriptions;
pub mod events;
pub mod extension;
pub mod extrinsics;
pub mod logs;
pub mod ports;
pub mod session;
pub mod spec_version;

pub use descriptions::DescriptionCache;
pub use extrinsics::FeePolicy;
pub use spec_version::{SpecVersionTracker, SpecVersionUpdate};

use crate::chain::RawBlock;
use crate::db::BlockRecord;
use anyhow::Result;
use futures::future::{try_join, try_join_all};
use ports::{AccountUpdater, BlockBatch, ChainState, EntityStore, FeeOracle};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of handing one block to the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Indexed,
    /// Block was already stored
    Skipped,
    /// Block was not written; a later run retries it
    Failed,
}

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    pub fee_policy: FeePolicy,
    /// Log progress every N block numbers (0 disables)
    pub progress_interval: u64,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            fee_policy: FeePolicy::default(),
            progress_interval: 100,
        }
    }
}

pub struct Indexer {
    store: Arc<dyn EntityStore>,
    chain: Arc<dyn ChainState>,
    fees: Arc<dyn FeeOracle>,
    accounts: Arc<dyn AccountUpdater>,
    fee_policy: FeePolicy,
    progress_interval: u64,
    descriptions: DescriptionCache,
    spec_versions: SpecVersionTracker,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn EntityStore>,
        chain: Arc<dyn ChainState>,
        fees: Arc<dyn FeeOracle>,
        accounts: Arc<dyn AccountUpdater>,
        options: IndexerOptions,
    ) -> Self {
        Self {
            store,
            chain,
            fees,
            accounts,
            fee_policy: options.fee_policy,
            progress_interval: options.progress_interval,
            descriptions: DescriptionCache::new(),
            spec_versions: SpecVersionTracker::new(),
        }
    }

    /// Runtime version currently cached, if any block set it
    pub fn current_spec_version(&self) -> Option<u32> {
        self.spec_versions.current().map(|r| r.spec_version)
    }

    /// Index a block, logging any failure with its block number
    pub async fn index_block(&self, block: &RawBlock) -> BlockOutcome {
        match self.handle_block(block).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to index block {}: {:#}", block.header.number, e);
                BlockOutcome::Failed
            }
        }
    }

    /// Decode and persist one block; an error means nothing of it was written
    pub async fn handle_block(&self, block: &RawBlock) -> Result<BlockOutcome> {
        let header = &block.header;
        let block_number = header.number;

        if self.progress_interval > 0 && block_number % self.progress_interval == 0 {
            info!(
                "Handling block {} with spec version {}",
                block_number, block.spec_version
            );
        }

        if self.store.block_exists(block_number).await? {
            debug!("Block {} already indexed, skipping", block_number);
            return Ok(BlockOutcome::Skipped);
        }

        // Wave 1: header and ancillary data
        let (logs, digest) = logs::decode_logs(block_number, &header.digest.logs);
        let extension = match extension::decode_extension(block_number, header.extension.as_ref())
        {
            Ok(records) => records,
            Err(e) => {
                warn!("Block {}: header extension dropped: {}", block_number, e);
                None
            }
        };
        let (session, spec_update) = tokio::join!(
            session::resolve_session(
                &*self.store,
                &*self.chain,
                block_number,
                &header.hash,
                &digest
            ),
            self.track_spec_version(block),
        );

        // Wave 2: calls and events; join output keeps input order
        let extrinsics = try_join_all(
            block
                .extrinsics
                .iter()
                .enumerate()
                .map(|(i, raw)| self.decode_extrinsic(block, i as u32, raw)),
        );
        let events = try_join_all(
            block
                .events
                .iter()
                .enumerate()
                .map(|(i, raw)| self.decode_event(block, i as u32, raw)),
        );
        let (extrinsics, events) = try_join(extrinsics, events).await?;

        let batch = BlockBatch {
            block: BlockRecord {
                block_number,
                block_hash: header.hash.clone(),
                timestamp: block.timestamp,
                parent_hash: header.parent_hash.clone(),
                state_root: header.state_root.clone(),
                extrinsics_root: header.extrinsics_root.clone(),
                spec_version: block.spec_version,
                extrinsics_count: block.extrinsics.len() as u32,
                session_id: session.session_id,
                author: session.author,
                is_finalized: false,
            },
            logs,
            session: session.new_session,
            spec_version: spec_update.new_record(),
            extension,
            extrinsics,
            events,
        };

        self.store.bulk_create(&batch).await?;
        self.spec_versions.commit(spec_update);

        debug!(
            "Indexed block {}: {} extrinsics, {} events, {} logs",
            block_number,
            batch.extrinsics.len(),
            batch.events.len(),
            batch.logs.len()
        );
        Ok(BlockOutcome::Indexed)
    }

    async fn track_spec_version(&self, block: &RawBlock) -> SpecVersionUpdate {
        match self
            .spec_versions
            .track(&*self.store, block.spec_version, block.header.number)
            .await
        {
            Ok(update) => update,
            Err(e) => {
                warn!(
                    "Block {}: spec version lookup failed: {:#}",
                    block.header.number, e
                );
                SpecVersionUpdate::Unchanged
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{sample_block, ChildTable, Database, DescriptionKind};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    pub(crate) fn validators(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("0x{:064x}", i + 1)).collect()
    }

    pub(crate) fn empty_batch(number: u64) -> BlockBatch {
        BlockBatch {
            block: sample_block(number),
            logs: vec![],
            session: None,
            spec_version: None,
            extension: None,
            extrinsics: vec![],
            events: vec![],
        }
    }

    pub(crate) struct FakeChain {
        session: Option<u32>,
        validators: Vec<String>,
    }

    impl FakeChain {
        pub(crate) fn new(session: u32, validators: Vec<String>) -> Self {
            Self {
                session: Some(session),
                validators,
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                session: None,
                validators: vec![],
            }
        }
    }

    #[async_trait]
    impl ChainState for FakeChain {
        async fn current_session_index(&self, _block_hash: &str) -> Result<u32> {
            self.session.ok_or_else(|| anyhow!("node unreachable"))
        }

        async fn session_validators(&self, _block_hash: &str) -> Result<Vec<String>> {
            Ok(self.validators.clone())
        }
    }

    /// Fee oracle returning a fixed fee and remembering what it was asked
    #[derive(Default)]
    pub(crate) struct FakeFees {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeFees {
        pub(crate) fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeeOracle for FakeFees {
        async fn fee(&self, extrinsic_hex: &str, block_hash: &str) -> Result<Option<String>> {
            self.calls
                .lock()
                .unwrap()
                .push((extrinsic_hex.to_string(), block_hash.to_string()));
            Ok(Some("123450000000000000".to_string()))
        }
    }

    pub(crate) struct Harness {
        pub(crate) db: Arc<Database>,
        pub(crate) fees: Arc<FakeFees>,
        pub(crate) indexer: Indexer,
    }

    pub(crate) fn harness_with_chain(chain: FakeChain) -> Harness {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let fees = Arc::new(FakeFees::default());
        let indexer = Indexer::new(
            db.clone(),
            Arc::new(chain),
            fees.clone(),
            db.clone(),
            IndexerOptions::default(),
        );
        Harness { db, fees, indexer }
    }

    pub(crate) fn harness() -> Harness {
        harness_with_chain(FakeChain::new(1, validators(5)))
    }

    /// AURA pre-runtime digest log for `slot`
    fn aura_log(slot: u64) -> String {
        format!("0x066175726120{}", hex::encode(slot.to_le_bytes()))
    }

    pub(crate) fn raw_block(
        number: u64,
        extrinsics: serde_json::Value,
        events: serde_json::Value,
    ) -> RawBlock {
        raw_block_at(number, 12, extrinsics, events)
    }

    fn raw_block_at(
        number: u64,
        spec_version: u32,
        extrinsics: serde_json::Value,
        events: serde_json::Value,
    ) -> RawBlock {
        serde_json::from_value(json!({
            "header": {
                "number": number,
                "hash": format!("0x{:064x}", number),
                "parentHash": format!("0x{:064x}", number.saturating_sub(1)),
                "stateRoot": "0x01",
                "extrinsicsRoot": "0x02",
                "digest": {"logs": [aura_log(7), "0x0008beef"]}
            },
            "specVersion": spec_version,
            "timestamp": 1_700_000_000_000u64 + number * 20_000,
            "extrinsics": extrinsics,
            "events": events
        }))
        .unwrap()
    }

    fn block_100() -> RawBlock {
        raw_block(
            100,
            json!([
                {
                    "hash": "0xe0",
                    "hex": "0x4502840011",
                    "section": "balances",
                    "method": "transfer",
                    "args": ["0xbob", "700"],
                    "signature": {"signer": "0xalice", "signature": "0x99", "nonce": 1},
                    "meta": {"docs": ["Transfer some liquid free balance."], "fields": [{"name": "dest"}, {"name": "value"}]}
                },
                {
                    "hash": "0xe1",
                    "hex": "0x0400",
                    "section": "system",
                    "method": "remark",
                    "args": ["0x00"],
                    "meta": {"docs": ["Make some on-chain remark."], "fields": [{"name": "remark"}]}
                }
            ]),
            json!([
                {"phase": {"applyExtrinsic": 0}, "section": "balances", "method": "Transfer",
                 "data": ["0xalice", "0xbob", "700"],
                 "meta": {"docs": ["Transfer succeeded."], "fields": [{"name": "from"}, {"name": "to"}, {"name": "amount"}]}},
                {"phase": {"applyExtrinsic": 0}, "section": "system", "method": "ExtrinsicSuccess", "data": [{"weight": 1}]},
                {"phase": {"applyExtrinsic": 1}, "section": "system", "method": "ExtrinsicSuccess", "data": [{"weight": 1}]}
            ]),
        )
    }

    #[tokio::test]
    async fn test_block_100_scenario() {
        let h = harness();
        let block = block_100();

        assert_eq!(h.indexer.handle_block(&block).await.unwrap(), BlockOutcome::Indexed);

        let stored = h.db.get_block(100).unwrap().unwrap();
        assert_eq!(stored.extrinsics_count, 2);
        assert_eq!(stored.session_id, Some(1));
        assert_eq!(stored.author, Some(validators(5)[2].clone()));

        let extrinsics = h.db.get_extrinsics_for_block(100).unwrap();
        assert_eq!(extrinsics.len(), 2);
        assert_eq!(extrinsics[0].id, "100-0");
        assert!(extrinsics[0].fees.is_some());
        assert_eq!(extrinsics[0].fees_rounded, Some(0.1235));
        assert_eq!(extrinsics[0].nb_events, 2);
        assert_eq!(extrinsics[1].id, "100-1");
        assert_eq!(extrinsics[1].fees, None);
        assert_eq!(h.fees.calls().len(), 1);

        let events = h.db.get_events_for_block(100).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].extrinsic_id.as_deref(), Some("100-0"));

        let transfers = h.db.get_transfers_for_block(100).unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].extrinsic_id.as_deref(), Some("100-0"));
    }

    #[tokio::test]
    async fn test_same_block_twice_is_idempotent() {
        let h = harness();
        let block = block_100();

        assert_eq!(h.indexer.index_block(&block).await, BlockOutcome::Indexed);
        assert_eq!(h.indexer.index_block(&block).await, BlockOutcome::Skipped);

        assert_eq!(h.db.count_blocks().unwrap(), 1);
        assert_eq!(h.db.count_rows(ChildTable::Extrinsics).unwrap(), 2);
        assert_eq!(h.db.count_rows(ChildTable::Events).unwrap(), 3);
        assert_eq!(h.db.count_rows(ChildTable::Logs).unwrap(), 2);
        assert_eq!(h.db.count_rows(ChildTable::Transfers).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_counts_match_raw_counts() {
        let h = harness();
        let block = block_100();
        h.indexer.handle_block(&block).await.unwrap();

        assert_eq!(
            h.db.get_extrinsics_for_block(100).unwrap().len(),
            block.extrinsics.len()
        );
        assert_eq!(h.db.get_events_for_block(100).unwrap().len(), block.events.len());

        let logs = h.db.get_logs_for_block(100).unwrap();
        assert_eq!(logs.len(), block.header.digest.logs.len());
        assert_eq!(logs[0].log_type, "PreRuntime");
        assert_eq!(logs[1].log_type, "Other");
    }

    #[tokio::test]
    async fn test_shared_keys_create_one_description() {
        let h = harness();
        let remark = json!({
            "hash": "0xee",
            "section": "system",
            "method": "remark",
            "args": ["0x00"],
            "meta": {"docs": ["Make some on-chain remark."], "fields": [{"name": "remark"}]}
        });
        let success = json!({"phase": {"applyExtrinsic": 0}, "section": "system", "method": "ExtrinsicSuccess", "data": []});
        let block = raw_block(
            3,
            json!([remark.clone(), remark.clone(), remark]),
            json!([success.clone(), success.clone(), success]),
        );

        h.indexer.handle_block(&block).await.unwrap();
        assert_eq!(h.db.count_descriptions(DescriptionKind::Extrinsic).unwrap(), 1);
        assert_eq!(h.db.count_descriptions(DescriptionKind::Event).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_spec_versions_are_monotonic() {
        let h = harness();
        for (number, version) in [(1u64, 1u32), (2, 1), (3, 2), (4, 2), (5, 3)] {
            let block = raw_block_at(number, version, json!([]), json!([]));
            assert_eq!(h.indexer.handle_block(&block).await.unwrap(), BlockOutcome::Indexed);
        }

        let versions: Vec<_> = h
            .db
            .list_spec_versions()
            .unwrap()
            .into_iter()
            .map(|r| (r.spec_version, r.block_height))
            .collect();
        assert_eq!(versions, vec![(1, 1), (2, 3), (3, 5)]);
        assert_eq!(h.indexer.current_spec_version(), Some(3));
    }

    #[tokio::test]
    async fn test_extension_records() {
        let h = harness();
        h.indexer
            .handle_block(&raw_block(1, json!([]), json!([])))
            .await
            .unwrap();
        assert_eq!(h.db.get_extension_for_block(1).unwrap(), None);
        assert_eq!(h.db.count_rows(ChildTable::HeaderExtensions).unwrap(), 0);

        let mut block = raw_block(2, json!([]), json!([]));
        block.header.extension = Some(json!({"v2": {
            "appLookup": {"size": 1, "index": [{"appId": 0, "start": 0}]},
            "commitment": {"rows": 1, "cols": 4, "commitment": "0xab", "dataRoot": "0xcd"}
        }}));
        h.indexer.handle_block(&block).await.unwrap();

        let records = h.db.get_extension_for_block(2).unwrap().unwrap();
        assert_eq!(records.extension.version, "v2");
        assert_eq!(records.commitment.header_extension_id, records.extension.id);
        assert_eq!(records.app_lookup.header_extension_id, records.extension.id);
        assert_eq!(h.db.count_rows(ChildTable::HeaderExtensions).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bad_extension_still_saves_block() {
        let h = harness();
        let mut block = raw_block(4, json!([]), json!([]));
        block.header.extension = Some(json!("{not json"));

        assert_eq!(h.indexer.handle_block(&block).await.unwrap(), BlockOutcome::Indexed);
        assert_eq!(h.db.get_extension_for_block(4).unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_failure_still_saves_block() {
        let h = harness_with_chain(FakeChain::failing());
        let block = raw_block(6, json!([]), json!([]));

        assert_eq!(h.indexer.handle_block(&block).await.unwrap(), BlockOutcome::Indexed);
        let stored = h.db.get_block(6).unwrap().unwrap();
        assert_eq!(stored.session_id, None);
        assert_eq!(stored.author, None);
    }

    #[tokio::test]
    async fn test_failed_call_aborts_whole_block() {
        let h = harness();
        // Metadata declares one arg, the call carries two
        let block = raw_block_at(
            9,
            7,
            json!([{
                "hash": "0xbad",
                "section": "system",
                "method": "remark",
                "args": ["0x00", "0x01"],
                "meta": {"docs": [], "fields": [{"name": "remark"}]}
            }]),
            json!([]),
        );

        assert_eq!(h.indexer.index_block(&block).await, BlockOutcome::Failed);
        assert!(h.db.get_block(9).unwrap().is_none());
        assert!(h.db.get_logs_for_block(9).unwrap().is_empty());
        assert!(h.db.list_spec_versions().unwrap().is_empty());
        assert_eq!(h.db.count_rows(ChildTable::Sessions).unwrap(), 0);
        assert_eq!(h.indexer.current_spec_version(), None);
    }

    #[tokio::test]
    async fn test_event_documented_without_fields_is_indexed() {
        let h = harness();
        let block = raw_block(
            20,
            json!([]),
            json!([{
                "phase": "Finalization",
                "section": "system",
                "method": "Remarked",
                "data": ["0xalice", "0xhash"],
                "meta": {"docs": ["On-chain remark happened."]}
            }]),
        );

        assert_eq!(h.indexer.index_block(&block).await, BlockOutcome::Indexed);
        assert!(h.db.get_block(20).unwrap().is_some());
        let events = h.db.get_events_for_block(20).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].arg_names, vec!["arg0", "arg1"]);
        assert_eq!(events[0].arg_values, vec!["0xalice", "0xhash"]);
    }
}
