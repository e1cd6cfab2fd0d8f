//! Shared application state injected into every handler.

use std::{sync::Arc, time::Duration};

use axum::http::HeaderName;
use hookline_core::{
    Clock, DispatchStore, Dispatcher, EventFilter, HooklineError, IngestPipeline,
    ProcessingTrigger, Result,
};

use crate::{config::Config, handshake::HandshakeResponder};

/// Application state built once at startup from [`Config`].
#[derive(Clone)]
pub struct AppState {
    /// Extract, filter and dispatch pipeline.
    pub pipeline: Arc<IngestPipeline>,
    /// Dispatch record store, also probed by the health check.
    pub store: Arc<dyn DispatchStore>,
    /// Time source for receive timestamps and health timings.
    pub clock: Arc<dyn Clock>,
    /// Handshake detection.
    pub handshake: HandshakeResponder,
    /// Header whose value is recorded as the delivery signature.
    pub signature_header: HeaderName,
    /// Per-request processing budget.
    pub request_budget: Duration,
    /// Allowed CORS origin, `*` for any.
    pub cors_allow_origin: String,
    /// Largest accepted body in bytes.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Wires the pipeline from `config` and the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns `HooklineError::Configuration` if a configured header name is
    /// invalid.
    pub fn new(
        config: &Config,
        store: Arc<dyn DispatchStore>,
        trigger: Arc<dyn ProcessingTrigger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let handshake_header = config.handshake_header_name().map_err(configuration)?;
        let signature_header = config.signature_header_name().map_err(configuration)?;
        let filter = EventFilter::new(config.target_status.as_str(), config.status_field.as_str());
        let dispatcher =
            Dispatcher::new(store.clone(), trigger, clock.clone(), config.dedup_window());

        Ok(Self {
            pipeline: Arc::new(IngestPipeline::new(filter, dispatcher)),
            store,
            clock,
            handshake: HandshakeResponder::new(handshake_header),
            signature_header,
            request_budget: config.request_budget(),
            cors_allow_origin: config.cors_allow_origin.clone(),
            max_body_bytes: config.max_body_bytes,
        })
    }
}

fn configuration(err: anyhow::Error) -> HooklineError {
    HooklineError::Configuration(format!("{err:#}"))
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .field("handshake", &self.handshake)
            .field("request_budget", &self.request_budget)
            .finish_non_exhaustive()
    }
}
