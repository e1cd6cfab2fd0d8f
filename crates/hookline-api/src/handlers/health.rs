//! Health check handlers for service monitoring.
//!
//! `/health` probes the dispatch store; `/live` only proves the process is
//! serving requests.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use hookline_core::{Clock, DispatchStore};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks
    pub checks: HealthChecks,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Critical systems failing
    Unhealthy,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Dispatch record store round-trip
    pub dispatch_store: ComponentHealth,
}

/// Health status for individual components.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Optional error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is experiencing issues
    Down,
}

/// Health service that encapsulates the clock for testable health checks.
pub struct HealthService {
    clock: Arc<dyn Clock>,
}

impl HealthService {
    /// Creates a new health service with the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Checks the dispatch store and times the round-trip.
    pub async fn health_check(&self, store: &dyn DispatchStore) -> HealthResponse {
        debug!("Performing health check");

        let timestamp = self.clock.now_utc();
        let start_time = self.clock.now();

        let result = store.health_check().await;
        let elapsed = self.clock.now().saturating_duration_since(start_time);
        let response_time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let store_health = match result {
            Ok(()) => {
                ComponentHealth { status: ComponentStatus::Up, message: None, response_time_ms }
            },
            Err(e) => {
                error!(error = %e, "Dispatch store health check failed");
                ComponentHealth {
                    status: ComponentStatus::Down,
                    message: Some(format!("Dispatch store check failed: {e}")),
                    response_time_ms,
                }
            },
        };

        let status = match store_health.status {
            ComponentStatus::Up => HealthStatus::Healthy,
            ComponentStatus::Down => HealthStatus::Unhealthy,
        };

        HealthResponse {
            status,
            timestamp,
            checks: HealthChecks { dispatch_store: store_health },
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check endpoint handler.
#[instrument(name = "health_check", skip(app_state))]
pub async fn health_check(State(app_state): State<AppState>) -> Response {
    let health_service = HealthService::new(app_state.clock.clone());
    let response = health_service.health_check(app_state.store.as_ref()).await;

    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    debug!(
        status = ?response.status,
        store_status = ?response.checks.dispatch_store.status,
        "Health check completed"
    );

    (status_code, Json(response)).into_response()
}

/// Liveness check endpoint.
///
/// Does not touch external dependencies.
#[instrument(name = "liveness_check", skip(app_state))]
pub async fn liveness_check(State(app_state): State<AppState>) -> Response {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": app_state.clock.now_utc(),
        "service": "hookline"
    });

    (StatusCode::OK, Json(response)).into_response()
}
