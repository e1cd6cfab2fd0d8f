//! PostgreSQL dispatch store.
//!
//! Insert-if-absent is a single `INSERT ... ON CONFLICT DO NOTHING` against a
//! primary key, so the database enforces uniqueness across every replica of
//! the service.

use std::{future::Future, pin::Pin};

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use super::DispatchStore;
use crate::{error::StoreError, models::DispatchRecord};

/// Schema for the dispatch record table.
pub const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS dispatch_records (
        dispatch_key TEXT PRIMARY KEY,
        resource_id TEXT NOT NULL,
        dispatched_at TIMESTAMPTZ NOT NULL
    )
";

const DISPATCHED_AT_INDEX: &str = r"
    CREATE INDEX IF NOT EXISTS idx_dispatch_records_dispatched_at
    ON dispatch_records(dispatched_at)
";

/// Dispatch store backed by a PostgreSQL table.
#[derive(Debug, Clone)]
pub struct PostgresDispatchStore {
    pool: PgPool,
}

impl PostgresDispatchStore {
    /// Wraps an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the dispatch record table and its index if missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if either statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        sqlx::query(DISPATCHED_AT_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

impl DispatchStore for PostgresDispatchStore {
    fn insert_if_absent(
        &self,
        record: DispatchRecord,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO dispatch_records (dispatch_key, resource_id, dispatched_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (dispatch_key) DO NOTHING
                ",
            )
            .bind(record.key.as_str())
            .bind(record.resource_id.as_str())
            .bind(record.dispatched_at)
            .execute(&self.pool)
            .await?;

            let inserted = result.rows_affected() == 1;
            debug!(dispatch_key = %record.key, inserted, "Dispatch record insert-if-absent");
            Ok(inserted)
        })
    }

    fn purge_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM dispatch_records WHERE dispatched_at < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;

            Ok(result.rows_affected())
        })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
            Ok(())
        })
    }
}
