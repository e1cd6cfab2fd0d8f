//! Dispatch record storage.
//!
//! The store is the only state shared between concurrent deliveries. On the
//! request path it is touched through exactly one primitive,
//! [`DispatchStore::insert_if_absent`], which must be atomic: for a given key
//! at most one caller ever observes `true`. That property is what makes
//! redelivery safe without any locking in the handlers.

use std::{future::Future, pin::Pin};

use chrono::{DateTime, Utc};

use crate::{error::StoreError, models::DispatchRecord};

pub mod memory;
pub mod postgres;

/// Storage operations required by the dispatcher.
///
/// Production uses [`postgres::PostgresDispatchStore`]; the in-memory
/// implementation serves single-process deployments and tests.
pub trait DispatchStore: Send + Sync + 'static {
    /// Inserts `record` unless a record with the same key exists.
    ///
    /// Returns `true` if this call inserted the record.
    fn insert_if_absent(
        &self,
        record: DispatchRecord,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>>;

    /// Deletes records dispatched before `cutoff`, returning how many went.
    fn purge_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>>;

    /// Verifies the store is reachable.
    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}
