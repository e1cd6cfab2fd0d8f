//! Process-local dispatch store.
//!
//! Deduplicates only within one process; records are lost on restart.

use std::{
    collections::{hash_map::Entry, HashMap},
    future::Future,
    pin::Pin,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::DispatchStore;
use crate::{
    error::StoreError,
    models::{DispatchKey, DispatchRecord},
};

/// In-memory dispatch store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDispatchStore {
    records: Arc<RwLock<HashMap<DispatchKey, DispatchRecord>>>,
}

impl InMemoryDispatchStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Looks up the record for `key`.
    pub async fn get(&self, key: &DispatchKey) -> Option<DispatchRecord> {
        self.records.read().await.get(key).cloned()
    }
}

impl DispatchStore for InMemoryDispatchStore {
    fn insert_if_absent(
        &self,
        record: DispatchRecord,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut records = self.records.write().await;
            match records.entry(record.key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                    Ok(true)
                },
                Entry::Occupied(_) => Ok(false),
            }
        })
    }

    fn purge_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut records = self.records.write().await;
            let before = records.len();
            records.retain(|_, record| record.dispatched_at >= cutoff);
            Ok(u64::try_from(before - records.len()).unwrap_or(u64::MAX))
        })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}
