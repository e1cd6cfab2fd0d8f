//! Test infrastructure for deterministic hookline tests.
//!
//! [`TestEnv`] wires the real router to an in-memory store, a manually
//! advanced clock and a recording trigger, so tests can drive the HTTP
//! surface with `tower::ServiceExt::oneshot` and inspect every side effect.

#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use axum::{body::Body, http::Request, response::Response, Router};
use hookline_api::{create_router, AppState, Config};
use hookline_core::DispatchStore;
pub use hookline_core::{InMemoryDispatchStore, TestClock};
use tower::ServiceExt;

pub mod doubles;
pub mod fixtures;
pub mod http;

pub use doubles::{FailingDispatchStore, RecordingTrigger};

/// Test environment around the real router.
pub struct TestEnv {
    /// Deterministic clock shared with the service
    pub clock: TestClock,
    /// Dispatch records written by the service
    pub store: InMemoryDispatchStore,
    /// Records every trigger invocation
    pub trigger: Arc<RecordingTrigger>,
    /// Present when the environment was built with a failing store
    pub failing_store: Option<Arc<FailingDispatchStore>>,
    /// Configuration the state was built from
    pub config: Config,
    state: AppState,
}

impl TestEnv {
    /// Environment with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a customized environment.
    pub fn builder() -> TestEnvBuilder {
        TestEnvBuilder::new()
    }

    /// Shared application state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Fresh router over the shared state.
    pub fn router(&self) -> Router {
        create_router(self.state())
    }

    /// Sends one request through a fresh router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }

    /// Moves the shared clock forward.
    pub fn advance_time(&self, duration: Duration) {
        self.clock.advance(duration);
    }

    /// Number of dispatch records stored.
    pub async fn dispatch_count(&self) -> usize {
        self.store.len().await
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`TestEnv`].
pub struct TestEnvBuilder {
    config: Config,
    trigger: RecordingTrigger,
    failing_store: bool,
}

impl TestEnvBuilder {
    /// Default configuration, instant trigger, working store.
    pub fn new() -> Self {
        Self { config: Config::default(), trigger: RecordingTrigger::new(), failing_store: false }
    }

    /// Adjusts the configuration.
    #[must_use]
    pub fn config(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    /// Uses `trigger` instead of an instant recording trigger.
    #[must_use]
    pub fn trigger(mut self, trigger: RecordingTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Replaces the in-memory store with one that always fails.
    #[must_use]
    pub fn failing_store(mut self) -> Self {
        self.failing_store = true;
        self
    }

    /// Builds the environment.
    ///
    /// # Panics
    ///
    /// Panics if the configuration carries an invalid header name.
    pub fn build(self) -> TestEnv {
        let clock = TestClock::new();
        let store = InMemoryDispatchStore::new();
        let trigger = Arc::new(self.trigger);
        let failing_store = self.failing_store.then(|| Arc::new(FailingDispatchStore::new()));

        let active_store: Arc<dyn DispatchStore> = match &failing_store {
            Some(failing) => failing.clone(),
            None => Arc::new(store.clone()),
        };

        let state =
            AppState::new(&self.config, active_store, trigger.clone(), Arc::new(clock.clone()))
                .unwrap();

        TestEnv { clock, store, trigger, failing_store, config: self.config, state }
    }
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}
