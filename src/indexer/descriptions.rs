use super::ports::EntityStore;
use crate::chain::MethodMetadata;
use crate::db::{DescriptionKind, DescriptionRecord};
use anyhow::Result;
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::info;

/// Lookup-or-create for call and event descriptions
///
/// The lock is held across the store lookup and insert so concurrent decoders
/// asking for the same key create at most one record.
#[derive(Default)]
pub struct DescriptionCache {
    known: Mutex<HashSet<(DescriptionKind, String)>>,
}

impl DescriptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the description id for `module`/`method`, creating the record on first use
    pub async fn get_or_create(
        &self,
        store: &dyn EntityStore,
        kind: DescriptionKind,
        module: &str,
        method: &str,
        metadata: &MethodMetadata,
    ) -> Result<String> {
        let id = DescriptionRecord::key(module, method);
        let mut known = self.known.lock().await;
        if known.contains(&(kind, id.clone())) {
            return Ok(id);
        }

        if store.get_description(kind, &id).await?.is_none() {
            let record = DescriptionRecord {
                id: id.clone(),
                module: module.to_string(),
                method: method.to_string(),
                description: metadata.documentation(),
            };
            store.create_description(kind, &record).await?;
            info!("New {} description recorded: {}", kind, id);
        }

        known.insert((kind, id.clone()));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use futures::future::try_join_all;
    use serde_json::json;

    #[tokio::test]
    async fn test_concurrent_requests_create_one_record() {
        let store = Database::open_in_memory().unwrap();
        let cache = DescriptionCache::new();
        let meta: MethodMetadata =
            serde_json::from_value(json!({"docs": ["Transfer some balance.", "Fails if poor."]}))
                .unwrap();

        let requests = (0..5).map(|_| {
            cache.get_or_create(&store, DescriptionKind::Extrinsic, "balances", "transfer", &meta)
        });
        let ids = try_join_all(requests).await.unwrap();

        assert!(ids.iter().all(|id| id == "balances_transfer"));
        assert_eq!(store.count_descriptions(DescriptionKind::Extrinsic).unwrap(), 1);

        let record = store
            .get_description(DescriptionKind::Extrinsic, "balances_transfer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.description, "Transfer some balance.\nFails if poor.");
    }

    #[tokio::test]
    async fn test_kinds_are_separate() {
        let store = Database::open_in_memory().unwrap();
        let cache = DescriptionCache::new();
        let meta = MethodMetadata::default();

        cache
            .get_or_create(&store, DescriptionKind::Extrinsic, "system", "remark", &meta)
            .await
            .unwrap();
        cache
            .get_or_create(&store, DescriptionKind::Event, "system", "remark", &meta)
            .await
            .unwrap();

        assert_eq!(store.count_descriptions(DescriptionKind::Extrinsic).unwrap(), 1);
        assert_eq!(store.count_descriptions(DescriptionKind::Event).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_existing_record_is_not_rewritten() {
        let store = Database::open_in_memory().unwrap();
        let existing = DescriptionRecord {
            id: "system_remark".to_string(),
            module: "system".to_string(),
            method: "remark".to_string(),
            description: "Make some on-chain remark.".to_string(),
        };
        store
            .create_description(DescriptionKind::Extrinsic, &existing)
            .await
            .unwrap();

        let meta: MethodMetadata = serde_json::from_value(json!({"docs": ["Other text"]})).unwrap();
        DescriptionCache::new()
            .get_or_create(&store, DescriptionKind::Extrinsic, "system", "remark", &meta)
            .await
            .unwrap();

        let stored = store
            .get_description(DescriptionKind::Extrinsic, "system_remark")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, existing);
    }
}
