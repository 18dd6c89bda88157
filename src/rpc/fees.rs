use super::{RpcClient, RuntimeDispatchInfo};
use crate::indexer::ports::FeeOracle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

/// Partial fee of an encoded extrinsic via `payment_queryInfo`
pub struct RpcFeeOracle {
    rpc: RpcClient,
}

impl RpcFeeOracle {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl FeeOracle for RpcFeeOracle {
    async fn fee(&self, extrinsic_hex: &str, block_hash: &str) -> Result<Option<String>> {
        let info: RuntimeDispatchInfo = self
            .rpc
            .call("payment_queryInfo", (extrinsic_hex, block_hash))
            .await
            .with_context(|| format!("Failed to query fee at {}", block_hash))?;

        let fee = info.partial_fee.to_decimal();
        if fee.is_none() {
            warn!("Unreadable partialFee {:?} at {}", info.partial_fee, block_hash);
        }
        Ok(fee)
    }
}
