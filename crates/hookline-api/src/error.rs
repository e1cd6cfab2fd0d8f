//! Mapping from core errors to HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hookline_core::HooklineError;
use serde::Serialize;
use tracing::{error, warn};

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code from the taxonomy (E1001-E3002)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// A `HooklineError` on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub HooklineError);

impl From<HooklineError> for ApiError {
    fn from(err: HooklineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code for the wrapped error.
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            HooklineError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            HooklineError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            HooklineError::Trigger(_)
            | HooklineError::DispatchStore(_)
            | HooklineError::Configuration(_)
            | HooklineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retryable = self.0.is_retryable();
        if status.is_server_error() {
            error!(code = self.0.code(), retryable, error = %self.0, "Request failed");
        } else {
            warn!(code = self.0.code(), retryable, error = %self.0, "Request rejected");
        }

        let body = ErrorResponse {
            error: ErrorDetail { code: self.0.code().to_string(), message: self.0.to_string() },
        };
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::METHOD_NOT_ALLOWED {
            response.headers_mut().insert(header::ALLOW, HeaderValue::from_static("POST"));
        }

        response
    }
}
