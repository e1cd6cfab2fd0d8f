//! Background purge of expired dispatch records.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{error::StoreError, storage::DispatchStore, time::Clock};

/// Periodically deletes dispatch records older than the retention window.
///
/// Records must outlive the dedup window, otherwise a late redelivery would
/// be dispatched again.
pub struct RetentionSweeper {
    store: Arc<dyn DispatchStore>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    /// Creates a sweeper that runs every `interval` and keeps records for
    /// `retention`.
    pub fn new(
        store: Arc<dyn DispatchStore>,
        clock: Arc<dyn Clock>,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        Self { store, clock, retention, interval }
    }

    /// Deletes records dispatched before `now - retention`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the purge fails.
    pub async fn sweep_once(&self) -> Result<u64, StoreError> {
        let retention =
            chrono::Duration::from_std(self.retention).unwrap_or_else(|_| chrono::Duration::zero());
        let now = self.clock.now_utc();
        let cutoff = now.checked_sub_signed(retention).unwrap_or(now);

        let removed = self.store.purge_before(cutoff).await?;
        if removed > 0 {
            info!(removed, %cutoff, "Purged expired dispatch records");
        } else {
            debug!(%cutoff, "No expired dispatch records");
        }
        Ok(removed)
    }

    /// Sweeps every interval until `cancellation_token` fires.
    pub async fn run(self, cancellation_token: CancellationToken) {
        info!(
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Retention sweeper starting"
        );

        loop {
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {},
                () = cancellation_token.cancelled() => break,
            }

            if let Err(e) = self.sweep_once().await {
                error!(error = %e, "Retention sweep failed");
            }
        }

        info!("Retention sweeper stopped");
    }
}

impl std::fmt::Debug for RetentionSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionSweeper")
            .field("retention", &self.retention)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
