//! Webhook subscription handshake.
//!
//! When a subscription is created the source sends a request carrying a
//! secret token in a dedicated header and expects it echoed back in the same
//! header. Handshakes are answered before any method check or body parsing.

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

/// Detects handshake requests and builds their acknowledgement.
#[derive(Debug, Clone)]
pub struct HandshakeResponder {
    header: HeaderName,
}

impl HandshakeResponder {
    /// Creates a responder for the given handshake header.
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    /// Name of the handshake header.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Returns true if `headers` carry a non-empty handshake token.
    pub fn is_handshake(&self, headers: &HeaderMap) -> bool {
        self.token(headers).is_some()
    }

    /// Returns the acknowledgement for a handshake request, or `None` if the
    /// request is an ordinary delivery.
    pub fn respond_handshake(&self, headers: &HeaderMap) -> Option<HandshakeAck> {
        let token = self.token(headers)?.clone();
        info!(token_len = token.len(), "Webhook handshake received");
        Some(HandshakeAck { header: self.header.clone(), token })
    }

    // An empty header value is an ordinary delivery, not a handshake.
    fn token<'h>(&self, headers: &'h HeaderMap) -> Option<&'h HeaderValue> {
        headers.get(&self.header).filter(|value| !value.is_empty())
    }
}

/// Response echoing the handshake token.
#[derive(Debug, Clone)]
pub struct HandshakeAck {
    header: HeaderName,
    token: HeaderValue,
}

impl HandshakeAck {
    /// The echoed token.
    pub fn token(&self) -> &HeaderValue {
        &self.token
    }
}

impl IntoResponse for HandshakeAck {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, Json(json!({ "handshake": true }))).into_response();
        response.headers_mut().insert(self.header, self.token);
        response
    }
}
