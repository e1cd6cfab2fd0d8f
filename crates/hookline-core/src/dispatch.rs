//! At-most-once dispatch of matched events.
//!
//! The dispatcher writes the dispatch record first and only invokes the
//! trigger when its own insert won. A redelivered envelope therefore finds
//! the record and stops, and two concurrent deliveries of the same event
//! cannot both trigger.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use crate::{
    error::HooklineError,
    models::{DispatchKey, DispatchOutcome, DispatchRecord, ResourceEvent},
    storage::DispatchStore,
    time::Clock,
    trigger::ProcessingTrigger,
};

/// Dispatches matched events through the store and the processing trigger.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn DispatchStore>,
    trigger: Arc<dyn ProcessingTrigger>,
    clock: Arc<dyn Clock>,
    dedup_window: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher. `dedup_window` sizes the time buckets used for
    /// events that carry no source timestamp.
    pub fn new(
        store: Arc<dyn DispatchStore>,
        trigger: Arc<dyn ProcessingTrigger>,
        clock: Arc<dyn Clock>,
        dedup_window: Duration,
    ) -> Self {
        Self { store, trigger, clock, dedup_window }
    }

    /// Dispatches `event` from a delivery received at `received_at`.
    ///
    /// Returns `Triggered` when this call recorded the dispatch (whatever the
    /// trigger then did), `Deduplicated` when a record already existed and
    /// `Failed` when the store could not answer.
    #[instrument(
        name = "dispatch",
        skip_all,
        fields(resource_id = %event.resource_id, position = event.position)
    )]
    pub async fn dispatch(
        &self,
        event: &ResourceEvent,
        received_at: DateTime<Utc>,
    ) -> DispatchOutcome {
        let key = DispatchKey::for_event(event, received_at, self.dedup_window);
        let record = DispatchRecord {
            key: key.clone(),
            resource_id: event.resource_id.clone(),
            dispatched_at: self.clock.now_utc(),
        };

        match self.store.insert_if_absent(record).await {
            Ok(true) => {
                if let Err(e) = self.trigger.trigger(event, &key).await {
                    let err = HooklineError::from(e);
                    warn!(
                        dispatch_key = %key,
                        code = err.code(),
                        retryable = err.is_retryable(),
                        error = %err,
                        "Processing trigger failed"
                    );
                }
                info!(dispatch_key = %key, "Event dispatched");
                DispatchOutcome::Triggered
            },
            Ok(false) => {
                info!(dispatch_key = %key, "Event already dispatched, skipping");
                DispatchOutcome::Deduplicated
            },
            Err(e) => {
                error!(dispatch_key = %key, error = %e, "Dispatch record insert failed");
                DispatchOutcome::Failed(e)
            },
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("dedup_window", &self.dedup_window)
            .finish_non_exhaustive()
    }
}
