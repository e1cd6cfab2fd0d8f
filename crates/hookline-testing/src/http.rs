//! Request builders and response readers for router tests.

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
};
use hookline_api::WEBHOOK_PATH;
use serde_json::Value;

/// POST to the webhook path with a JSON content type.
pub fn post_webhook(body: impl Into<Body>) -> Request<Body> {
    webhook_request(Method::POST, body)
}

/// Request with any method to the webhook path.
pub fn webhook_request(method: Method, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

/// Handshake request carrying `token` in the default handshake header.
pub fn handshake_request(method: Method, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(WEBHOOK_PATH)
        .header("X-Hook-Secret", token)
        .body(Body::empty())
        .unwrap()
}

/// GET request to `uri`.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().method(Method::GET).uri(uri).body(Body::empty()).unwrap()
}

/// Reads a response body as JSON.
pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
