use super::ports::EntityStore;
use crate::db::SpecVersionRecord;
use anyhow::Result;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// What tracking one block's runtime version decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersionUpdate {
    /// Cache already holds this version
    Unchanged,
    /// Cache was empty and storage already knew this version
    Loaded(SpecVersionRecord),
    /// This block starts a new runtime version; the record must be persisted
    Started(SpecVersionRecord),
}

impl SpecVersionUpdate {
    /// Record to write with the block batch, if any
    pub fn new_record(&self) -> Option<SpecVersionRecord> {
        match self {
            SpecVersionUpdate::Started(record) => Some(*record),
            _ => None,
        }
    }
}

/// In-memory "current runtime version" cache
///
/// The cache only moves forward in [`SpecVersionTracker::commit`], called once
/// the block batch is durable.
#[derive(Default)]
pub struct SpecVersionTracker {
    current: Mutex<Option<SpecVersionRecord>>,
}

impl SpecVersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<SpecVersionRecord> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn track(
        &self,
        store: &dyn EntityStore,
        spec_version: u32,
        block_number: u64,
    ) -> Result<SpecVersionUpdate> {
        let cached = self.current();

        if let Some(record) = cached {
            if record.spec_version == spec_version {
                return Ok(SpecVersionUpdate::Unchanged);
            }
        } else if let Some(record) = store.get_spec_version(spec_version).await? {
            return Ok(SpecVersionUpdate::Loaded(record));
        }

        Ok(SpecVersionUpdate::Started(SpecVersionRecord {
            spec_version,
            block_height: block_number,
        }))
    }

    pub fn commit(&self, update: SpecVersionUpdate) {
        let record = match update {
            SpecVersionUpdate::Unchanged => return,
            SpecVersionUpdate::Loaded(record) => record,
            SpecVersionUpdate::Started(record) => {
                info!(
                    "Spec version {} starts at block {}",
                    record.spec_version, record.block_height
                );
                record
            }
        };
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(record);
    }
}
