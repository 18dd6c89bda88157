use super::ports::{ChainState, EntityStore};
use crate::chain::{resolve_author, DigestItem};
use crate::db::SessionRecord;
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Session and author data for one block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    pub session_id: Option<u32>,
    pub author: Option<String>,
    /// Set when the session was not stored yet and must go into the block batch
    pub new_session: Option<SessionRecord>,
}

/// Resolve the session and author of a block
///
/// Failures are logged and leave both fields empty; a block without session
/// data is still indexed.
pub async fn resolve_session(
    store: &dyn EntityStore,
    chain: &dyn ChainState,
    block_number: u64,
    block_hash: &str,
    digest: &[DigestItem],
) -> SessionInfo {
    match try_resolve(store, chain, block_hash, digest).await {
        Ok(info) => info,
        Err(e) => {
            warn!("Block {}: session resolution failed: {:#}", block_number, e);
            SessionInfo::default()
        }
    }
}

async fn try_resolve(
    store: &dyn EntityStore,
    chain: &dyn ChainState,
    block_hash: &str,
    digest: &[DigestItem],
) -> Result<SessionInfo> {
    let session_id = chain
        .current_session_index(block_hash)
        .await
        .context("Failed to read current session index")?;

    let (session, new_session) = match store.get_session(session_id).await? {
        Some(session) => (session, None),
        None => {
            let validators = chain
                .session_validators(block_hash)
                .await
                .with_context(|| format!("Failed to read validators of session {}", session_id))?;
            info!(
                "New session {} with {} validators",
                session_id,
                validators.len()
            );
            let session = SessionRecord {
                id: session_id,
                validators,
            };
            (session.clone(), Some(session))
        }
    };

    let author = resolve_author(digest, &session.validators);
    if author.is_none() {
        debug!("No author resolvable at {}", block_hash);
    }

    Ok(SessionInfo {
        session_id: Some(session_id),
        author,
        new_session,
    })
}
