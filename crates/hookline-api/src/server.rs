//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. CORS handling
//! 4. Body size limit
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! The server stops accepting connections when its cancellation token fires
//! and waits for in-flight requests. Processing tasks that outlived their
//! request budget are not awaited.

use std::net::SocketAddr;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{handlers, AppState};

/// Path the webhook source delivers to.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Creates the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use hookline_api::{create_router, AppState};
///
/// fn build(state: AppState) -> axum::Router {
///     create_router(state)
/// }
/// ```
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check));

    let webhook_routes = Router::new().route(WEBHOOK_PATH, any(handlers::receive_webhook));

    Router::new()
        .merge(health_routes)
        .merge(webhook_routes)
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(cors_layer(&state.cors_allow_origin))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                warn!(origin, "Invalid CORS origin, allowing any");
                AllowOrigin::any()
            },
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Serves `state` on an already bound listener until `shutdown` fires.
///
/// # Errors
///
/// Returns `std::io::Error` if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Binds `addr` and serves until `shutdown` fires.
///
/// # Errors
///
/// Returns `std::io::Error` if:
/// - Port is already in use
/// - Network interface unavailable
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
