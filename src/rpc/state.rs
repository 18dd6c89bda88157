use super::RpcClient;
use crate::chain::scale::{decode_account_ids, decode_u32};
use crate::indexer::ports::ChainState;
use anyhow::{Context, Result};
use async_trait::async_trait;

/// twox128("Session") ++ twox128("CurrentIndex")
pub const SESSION_CURRENT_INDEX_KEY: &str =
    "0xcec5070d609dd3497f72bde07fc96ba072763800a36a99fdfc7c10f6415f6ee6";

/// twox128("Session") ++ twox128("Validators")
pub const SESSION_VALIDATORS_KEY: &str =
    "0xcec5070d609dd3497f72bde07fc96ba088dcde934c658227ee1dfafcd6e16903";

/// Session pallet storage read over `state_getStorage`
pub struct RpcChainState {
    rpc: RpcClient,
}

impl RpcChainState {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    async fn storage(&self, key: &str, block_hash: &str) -> Result<Option<String>> {
        self.rpc
            .call("state_getStorage", (key, block_hash))
            .await
            .with_context(|| format!("Failed to read storage {} at {}", key, block_hash))
    }
}

#[async_trait]
impl ChainState for RpcChainState {
    async fn current_session_index(&self, block_hash: &str) -> Result<u32> {
        // Unset storage means the chain is still in its genesis session
        match self.storage(SESSION_CURRENT_INDEX_KEY, block_hash).await? {
            Some(value) => Ok(decode_u32(&value)?),
            None => Ok(0),
        }
    }

    async fn session_validators(&self, block_hash: &str) -> Result<Vec<String>> {
        match self.storage(SESSION_VALIDATORS_KEY, block_hash).await? {
            Some(value) => Ok(decode_account_ids(&value)?),
            None => Ok(Vec::new()),
        }
    }
}
