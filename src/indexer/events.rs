use super::ports::TransferRequest;
use super::Indexer;
use crate::chain::{arg_to_string, DecodeError, RawBlock, RawEvent};
use crate::db::{DescriptionKind, EventRecord};
use anyhow::{bail, Result};
use tracing::error;

/// Events that change the free or reserved balance of their first argument
const BALANCE_EVENTS: &[&str] = &[
    "balances.BalanceSet",
    "balances.Deposit",
    "balances.DustLost",
    "balances.Endowed",
    "balances.Reserved",
    "balances.Slashed",
    "balances.Unreserved",
    "balances.Withdraw",
];

const FEE_EVENTS: &[&str] = &["transactionPayment.TransactionFeePaid"];

const TRANSFER_EVENTS: &[&str] = &["balances.Transfer"];

/// Stringify an event argument
///
/// Values whose JSON form carries `u0000` null-byte markers are flattened to
/// that JSON text with the markers, backslashes and quotes removed.
pub fn sanitize_value(value: &serde_json::Value) -> String {
    let json = value.to_string();
    if json.contains("u0000") {
        json.replace("u0000", "").replace(['\\', '"'], "")
    } else {
        arg_to_string(value)
    }
}

impl Indexer {
    /// Decode one event of `block` and trigger its account side effects
    pub(super) async fn decode_event(
        &self,
        block: &RawBlock,
        index: u32,
        raw: &RawEvent,
    ) -> Result<EventRecord> {
        self.try_decode_event(block, index, raw).await.map_err(|e| {
            error!(
                "Block {}: failed to decode event {} ({}.{}): {:#}",
                block.header.number, index, raw.section, raw.method, e
            );
            e
        })
    }

    async fn try_decode_event(
        &self,
        block: &RawBlock,
        index: u32,
        raw: &RawEvent,
    ) -> Result<EventRecord> {
        let block_number = block.header.number;
        let arg_values: Vec<String> = raw.data.iter().map(sanitize_value).collect();
        let arg_names = match raw.meta.arg_names() {
            Some(names) if names.len() != arg_values.len() => {
                return Err(DecodeError::ArgArity {
                    module: raw.section.clone(),
                    method: raw.method.clone(),
                    names: names.len(),
                    values: arg_values.len(),
                }
                .into());
            }
            Some(names) => names,
            None => (0..arg_values.len()).map(|i| format!("arg{}", i)).collect(),
        };

        let description_id = self
            .descriptions
            .get_or_create(
                &*self.store,
                DescriptionKind::Event,
                &raw.section,
                &raw.method,
                &raw.meta,
            )
            .await?;

        let record = EventRecord {
            id: format!("{}-{}", block_number, index),
            block_id: block_number,
            module: raw.section.clone(),
            event: raw.method.clone(),
            block_height: block_number,
            event_index: index,
            description_id,
            extrinsic_id: raw
                .phase
                .extrinsic_index()
                .map(|call| format!("{}-{}", block_number, call)),
            arg_names,
            arg_values,
        };

        self.apply_side_effects(block, raw, &record).await?;
        Ok(record)
    }

    async fn apply_side_effects(
        &self,
        block: &RawBlock,
        raw: &RawEvent,
        record: &EventRecord,
    ) -> Result<()> {
        let key = format!("{}.{}", raw.section, raw.method);

        if BALANCE_EVENTS.contains(&key.as_str()) || FEE_EVENTS.contains(&key.as_str()) {
            let Some(who) = raw.data.first() else {
                bail!("{} event {} carries no account", key, record.id);
            };
            self.accounts.refresh_accounts(&[arg_to_string(who)]).await?;
        }

        if TRANSFER_EVENTS.contains(&key.as_str()) {
            self.accounts
                .record_transfer(TransferRequest {
                    event_id: &record.id,
                    event: raw,
                    block_id: block.header.number,
                    block_hash: &block.header.hash,
                    timestamp: block.timestamp,
                    extrinsic_id: record.extrinsic_id.as_deref(),
                })
                .await?;
        }

        Ok(())
    }
}
