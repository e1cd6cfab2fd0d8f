//! Webhook endpoint: handshake, method check, validation and dispatch.

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use hookline_core::{
    acknowledge, validate, Completion, DeliveryEnvelope, DeliveryReceipt, HooklineError,
};
use tracing::{debug, info, instrument, Span};

use crate::{error::ApiError, AppState};

/// Handles every method on the webhook route.
///
/// Order of checks:
/// 1. handshake header present: echo the token (any method)
/// 2. `OPTIONS`: empty 200 for CORS preflight
/// 3. any other non-POST: 405
/// 4. POST: validate, process within the request budget, acknowledge
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 400: body is not a JSON object
/// - 405: method other than POST or OPTIONS
/// - 500: dispatch store failure (the source should redeliver)
#[instrument(
    name = "receive_webhook",
    skip(state, headers, body),
    fields(
        method = %method,
        body_len = body.len(),
        signed = tracing::field::Empty,
    )
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(ack) = state.handshake.respond_handshake(&headers) {
        return ack.into_response();
    }

    if method == Method::OPTIONS {
        debug!("Preflight request answered");
        return StatusCode::OK.into_response();
    }

    if method != Method::POST {
        return ApiError(HooklineError::MethodNotAllowed { method: method.to_string() })
            .into_response();
    }

    match process_delivery(&state, &headers, body).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

async fn process_delivery(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> hookline_core::Result<DeliveryReceipt> {
    let received_at = state.clock.now_utc();
    let signature = headers
        .get(&state.signature_header)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let envelope = DeliveryEnvelope::new(body, received_at).with_signature(signature);
    Span::current().record("signed", envelope.is_signed());

    let validated = validate(&envelope)?;

    match state.pipeline.clone().process_with_budget(validated, state.request_budget).await? {
        Completion::Finished(report) => {
            info!(
                events = report.extracted,
                dispatched = report.triggered(),
                deduplicated = report.deduplicated(),
                "Webhook processed"
            );
            Ok(acknowledge(&report, received_at))
        },
        Completion::Deferred => Ok(DeliveryReceipt::deferred(received_at)),
    }
}
