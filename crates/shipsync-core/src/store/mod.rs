//! Local shipment mirror.
//!
//! The engine never talks to a concrete database; it goes through
//! [`ShipmentStore`]. [`MemoryStore`] backs tests and ephemeral runs,
//! [`SqliteStore`] is the durable mirror.
//!
//! `upsert` here is a plain keyed replace. Blank-safe merging happens in
//! the writer above the store, so every backend stays trivially correct.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use shipsync_types::models::ShipmentRecord;
use shipsync_types::SyncError;

use crate::detect::StoredMeta;

#[async_trait]
pub trait ShipmentStore: Send + Sync {
    async fn get(&self, awb: &str) -> Result<Option<ShipmentRecord>, SyncError>;

    /// Lightweight metadata for every stored shipment, for change detection.
    async fn meta_snapshot(&self) -> Result<HashMap<String, StoredMeta>, SyncError>;

    /// Replace-or-insert by canonical identifier.
    async fn upsert(&self, record: &ShipmentRecord) -> Result<(), SyncError>;

    /// Records touched at or after `since`, newest first.
    async fn updated_since(&self, since: DateTime<Utc>) -> Result<Vec<ShipmentRecord>, SyncError>;

    async fn count(&self) -> Result<u64, SyncError>;
}

fn meta_of(record: &ShipmentRecord) -> StoredMeta {
    StoredMeta {
        status: (!record.status.trim().is_empty()).then(|| record.status.clone()),
        processing_status: record.processing_status.clone(),
        last_event: record.awb_status_date,
        has_detail: record.has_detail(),
    }
}

/// In-memory mirror behind an `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: tokio::sync::RwLock<HashMap<String, ShipmentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShipmentStore for MemoryStore {
    async fn get(&self, awb: &str) -> Result<Option<ShipmentRecord>, SyncError> {
        Ok(self.records.read().await.get(awb).cloned())
    }

    async fn meta_snapshot(&self) -> Result<HashMap<String, StoredMeta>, SyncError> {
        let records = self.records.read().await;
        Ok(records.iter().map(|(awb, rec)| (awb.clone(), meta_of(rec))).collect())
    }

    async fn upsert(&self, record: &ShipmentRecord) -> Result<(), SyncError> {
        if record.awb.trim().is_empty() {
            return Err(SyncError::MissingIdentifier);
        }
        self.records.write().await.insert(record.awb.clone(), record.clone());
        Ok(())
    }

    async fn updated_since(&self, since: DateTime<Utc>) -> Result<Vec<ShipmentRecord>, SyncError> {
        let records = self.records.read().await;
        let mut out: Vec<ShipmentRecord> = records
            .values()
            .filter(|rec| rec.last_updated.is_some_and(|ts| ts >= since))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.last_updated.cmp(&a.last_updated).then_with(|| a.awb.cmp(&b.awb)));
        Ok(out)
    }

    async fn count(&self) -> Result<u64, SyncError> {
        Ok(self.records.read().await.len() as u64)
    }
}
