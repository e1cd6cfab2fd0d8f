//! Test doubles for the dispatch store and the processing trigger.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use hookline_core::{
    DispatchKey, DispatchRecord, DispatchStore, ProcessingTrigger, ResourceEvent, StoreError,
    TriggerError,
};

/// Trigger that records every invocation.
///
/// Can be slowed down to exercise the request budget, or made to fail to
/// check that trigger failures never reach the webhook source.
#[derive(Debug, Default)]
pub struct RecordingTrigger {
    calls: Mutex<Vec<(ResourceEvent, DispatchKey)>>,
    delay: Option<Duration>,
    fail: bool,
}

impl RecordingTrigger {
    /// Trigger that succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger that sleeps for `delay` before succeeding.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    /// Trigger that always fails.
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// Number of invocations so far.
    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    /// Resource ids in invocation order.
    pub fn triggered_ids(&self) -> Vec<String> {
        self.lock().iter().map(|(event, _)| event.resource_id.as_str().to_string()).collect()
    }

    /// Dispatch keys in invocation order.
    pub fn keys(&self) -> Vec<DispatchKey> {
        self.lock().iter().map(|(_, key)| key.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ResourceEvent, DispatchKey)>> {
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ProcessingTrigger for RecordingTrigger {
    fn trigger<'a>(
        &'a self,
        event: &'a ResourceEvent,
        key: &'a DispatchKey,
    ) -> Pin<Box<dyn Future<Output = Result<(), TriggerError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.lock().push((event.clone(), key.clone()));
            if self.fail {
                Err(TriggerError::Rejected { status: 500 })
            } else {
                Ok(())
            }
        })
    }
}

/// Store whose every operation fails as if the database were down.
#[derive(Debug, Default)]
pub struct FailingDispatchStore {
    attempts: AtomicUsize,
}

impl FailingDispatchStore {
    /// Creates the store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of insert attempts received.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl DispatchStore for FailingDispatchStore {
    fn insert_if_absent(
        &self,
        _record: DispatchRecord,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(StoreError::Unavailable("connection refused".to_string())) })
    }

    fn purge_before(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async { Err(StoreError::Unavailable("connection refused".to_string())) })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async { Err(StoreError::Unavailable("connection refused".to_string())) })
    }
}
