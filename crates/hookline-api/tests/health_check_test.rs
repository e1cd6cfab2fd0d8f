//! Health check endpoint tests.
//!
//! Verifies that `/health` reflects the dispatch store and that `/live`
//! answers regardless of dependencies.

use axum::http::StatusCode;
use hookline_testing::{
    http::{get, json_body},
    TestEnv,
};

#[tokio::test]
async fn health_check_returns_success_when_store_is_up() {
    let env = TestEnv::new();

    let response = env.send(get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["dispatch_store"]["status"], "up");
    assert!(body["checks"]["dispatch_store"]["response_time_ms"].is_u64());
    assert!(body["checks"]["dispatch_store"].get("message").is_none());
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn health_check_returns_503_when_store_is_down() {
    let env = TestEnv::builder().failing_store().build();

    let response = env.send(get("/health")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["dispatch_store"]["status"], "down");
    assert!(body["checks"]["dispatch_store"]["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn liveness_ignores_store_state() {
    let env = TestEnv::builder().failing_store().build();

    let response = env.send(get("/live")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "alive");
    assert_eq!(body["service"], "hookline");
}

#[tokio::test]
async fn health_timestamp_comes_from_injected_clock() {
    let env = TestEnv::new();
    let expected = hookline_core::Clock::now_utc(&env.clock);

    let body = json_body(env.send(get("/health")).await).await;

    let reported: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(body["timestamp"].clone()).unwrap();
    assert_eq!(reported, expected);
}
