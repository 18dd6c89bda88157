use super::Indexer;
use crate::chain::{arg_to_string, DecodeError, RawBlock, RawExtrinsic};
use crate::db::{DescriptionKind, ExtrinsicRecord};
use anyhow::Result;
use tracing::{debug, error, warn};

/// Which calls get a fee lookup and how the fee is rounded
#[derive(Debug, Clone, PartialEq)]
pub struct FeePolicy {
    /// Call modules whose extrinsics are sent to the fee oracle
    pub modules: Vec<String>,
    /// Decimal places of the native token
    pub decimals: u32,
    /// Decimal places kept in the rounded fee
    pub precision: u32,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            modules: default_fee_modules(),
            decimals: 18,
            precision: 4,
        }
    }
}

pub fn default_fee_modules() -> Vec<String> {
    [
        "balances",
        "dataAvailability",
        "utility",
        "proxy",
        "multisig",
        "staking",
        "nominationPools",
        "session",
        "vector",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl FeePolicy {
    pub fn applies_to(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }

    /// `fee / 10^decimals` rounded half-up to `precision` places
    pub fn round(&self, fee: &str) -> Option<f64> {
        let fee: u128 = fee.trim().parse().ok()?;

        if self.precision >= self.decimals {
            let unit = 10u128.checked_pow(self.decimals)?;
            return Some(fee as f64 / unit as f64);
        }

        let step = 10u128.checked_pow(self.decimals - self.precision)?;
        let mut units = fee / step;
        let remainder = fee % step;
        if remainder >= step - remainder {
            units += 1;
        }
        Some(units as f64 / 10f64.powi(self.precision as i32))
    }
}

impl Indexer {
    /// Decode one call of `block`; errors abort the block
    pub(super) async fn decode_extrinsic(
        &self,
        block: &RawBlock,
        index: u32,
        raw: &RawExtrinsic,
    ) -> Result<ExtrinsicRecord> {
        self.try_decode_extrinsic(block, index, raw)
            .await
            .map_err(|e| {
                error!(
                    "Block {}: failed to decode extrinsic {} ({}): {:#}",
                    block.header.number, index, raw.hash, e
                );
                e
            })
    }

    async fn try_decode_extrinsic(
        &self,
        block: &RawBlock,
        index: u32,
        raw: &RawExtrinsic,
    ) -> Result<ExtrinsicRecord> {
        let block_number = block.header.number;
        let arg_values: Vec<String> = raw.args.iter().map(arg_to_string).collect();
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
                DescriptionKind::Extrinsic,
                &raw.section,
                &raw.method,
                &raw.meta,
            )
            .await?;

        let mut success = false;
        let mut nb_events = 0;
        for event in block.events_for_extrinsic(index) {
            nb_events += 1;
            if event.section == "system" && event.method == "ExtrinsicSuccess" {
                success = true;
            }
        }

        let fees = self.lookup_fee(block, raw).await?;
        let fees_rounded = match fees.as_deref() {
            Some(fee) => {
                let rounded = self.fee_policy.round(fee);
                if rounded.is_none() {
                    warn!("Block {}: unparseable fee {:?} for {}", block_number, fee, raw.hash);
                }
                rounded
            }
            None => None,
        };

        let signature = raw.signature.as_ref();
        Ok(ExtrinsicRecord {
            id: format!("{}-{}", block_number, index),
            block_id: block_number,
            hash: raw.hash.clone(),
            module: raw.section.clone(),
            call: raw.method.clone(),
            block_height: block_number,
            success,
            is_signed: signature.is_some(),
            extrinsic_index: index,
            timestamp: block.timestamp,
            description_id,
            signer: signature.map(|s| s.signer.clone()),
            signature: signature.map(|s| s.signature.clone()),
            nonce: signature.map(|s| s.nonce),
            arg_names,
            arg_values,
            nb_events,
            fees,
            fees_rounded,
        })
    }

    async fn lookup_fee(&self, block: &RawBlock, raw: &RawExtrinsic) -> Result<Option<String>> {
        if !self.fee_policy.applies_to(&raw.section) {
            return Ok(None);
        }
        let Some(call_hex) = raw.hex.as_deref() else {
            debug!("Extrinsic {} carries no encoded bytes, skipping fee", raw.hash);
            return Ok(None);
        };
        self.fees.fee(call_hex, &block.header.hash).await
    }
}
