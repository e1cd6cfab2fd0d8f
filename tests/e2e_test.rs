//! End-to-end tests over a real TCP listener.
//!
//! Serves the full router on an ephemeral port and talks to it with an HTTP
//! client, the way the webhook source would.

use std::time::Duration;

use anyhow::Result;
use hookline_testing::{
    fixtures::{envelope, task_status_changed},
    TestEnv,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct RunningServer {
    base_url: String,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl RunningServer {
    async fn start(env: &TestEnv) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(hookline_api::serve(listener, env.state(), shutdown.clone()));

        Ok(Self { base_url, shutdown, handle })
    }

    async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle).await???;
        Ok(())
    }
}

#[tokio::test]
async fn subscription_then_delivery_then_redelivery() -> Result<()> {
    let env = TestEnv::new();
    let server = RunningServer::start(&env).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/webhook", server.base_url);

    // Subscription handshake
    let response = client.post(&url).header("X-Hook-Secret", "handshake-123").send().await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-hook-secret"], "handshake-123");

    // First delivery dispatches
    let body = envelope([task_status_changed("123", "in analysis")]);
    let receipt: Value = client.post(&url).json(&body).send().await?.json().await?;
    assert_eq!(receipt["dispatched"], 1);

    // Redelivery is deduplicated
    let receipt: Value = client.post(&url).json(&body).send().await?.json().await?;
    assert_eq!(receipt["dispatched"], 0);
    assert_eq!(receipt["deduplicated"], 1);

    assert_eq!(env.trigger.triggered_ids(), vec!["123"]);

    server.stop().await
}

#[tokio::test]
async fn concurrent_redeliveries_trigger_once() -> Result<()> {
    let env = TestEnv::new();
    let server = RunningServer::start(&env).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/webhook", server.base_url);
    let body = envelope([task_status_changed("999", "in analysis")]);

    let requests = (0..8).map(|_| {
        let client = client.clone();
        let url = url.clone();
        let body = body.clone();
        tokio::spawn(async move { client.post(&url).json(&body).send().await })
    });

    for request in requests.collect::<Vec<_>>() {
        assert_eq!(request.await??.status(), 200);
    }

    assert_eq!(env.trigger.call_count(), 1);
    assert_eq!(env.dispatch_count().await, 1);

    server.stop().await
}

#[tokio::test]
async fn health_and_rejections_over_the_wire() -> Result<()> {
    let env = TestEnv::new();
    let server = RunningServer::start(&env).await?;
    let client = reqwest::Client::new();

    let health = client.get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(health.status(), 200);
    assert!(health.headers().contains_key("x-request-id"));

    let not_allowed = client.get(format!("{}/webhook", server.base_url)).send().await?;
    assert_eq!(not_allowed.status(), 405);

    let malformed = client
        .post(format!("{}/webhook", server.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(malformed.status(), 400);
    let error: Value = malformed.json().await?;
    assert_eq!(error["error"]["code"], json!("E1001"));

    server.stop().await
}
