//! Downstream processing triggers.
//!
//! A trigger is told about each newly dispatched event. What it does with it
//! (and whether it retries) is its own business: the dispatcher only logs a
//! failed trigger.

use std::{future::Future, pin::Pin, time::Duration};

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    error::TriggerError,
    models::{DispatchKey, ResourceEvent},
};

/// Header carrying the dispatch key on outbound processing requests.
pub const DISPATCH_KEY_HEADER: &str = "X-Hookline-Dispatch-Key";

/// Downstream action invoked once per dispatched event.
pub trait ProcessingTrigger: Send + Sync + 'static {
    /// Starts processing for `event`, identified by `key`.
    fn trigger<'a>(
        &'a self,
        event: &'a ResourceEvent,
        key: &'a DispatchKey,
    ) -> Pin<Box<dyn Future<Output = Result<(), TriggerError>> + Send + 'a>>;
}

/// Trigger that only records the match in the log.
///
/// Used when no processing endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTrigger;

impl ProcessingTrigger for LoggingTrigger {
    fn trigger<'a>(
        &'a self,
        event: &'a ResourceEvent,
        key: &'a DispatchKey,
    ) -> Pin<Box<dyn Future<Output = Result<(), TriggerError>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                resource_id = %event.resource_id,
                dispatch_key = %key,
                new_status = event.new_status.as_deref().unwrap_or_default(),
                "Task reached target status, processing requested"
            );
            Ok(())
        })
    }
}

/// Body posted to the processing endpoint.
#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    dispatch_key: &'a DispatchKey,
    event: &'a ResourceEvent,
}

/// Trigger that POSTs the event as JSON to a processing endpoint.
#[derive(Debug, Clone)]
pub struct HttpProcessingTrigger {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProcessingTrigger {
    /// Creates a trigger posting to `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TriggerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Hookline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TriggerError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, url: url.into(), timeout })
    }

    /// Returns the processing endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ProcessingTrigger for HttpProcessingTrigger {
    fn trigger<'a>(
        &'a self,
        event: &'a ResourceEvent,
        key: &'a DispatchKey,
    ) -> Pin<Box<dyn Future<Output = Result<(), TriggerError>> + Send + 'a>> {
        let span = info_span!("processing_trigger", url = %self.url, dispatch_key = %key);

        Box::pin(
            async move {
                let response = self
                    .client
                    .post(&self.url)
                    .header(DISPATCH_KEY_HEADER, key.as_str())
                    .json(&DispatchRequest { dispatch_key: key, event })
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() {
                            TriggerError::Timeout { timeout_secs: self.timeout.as_secs() }
                        } else {
                            TriggerError::Network { message: e.to_string() }
                        }
                    })?;

                let status = response.status();
                if !status.is_success() {
                    warn!(status = status.as_u16(), "Processing endpoint rejected dispatch");
                    return Err(TriggerError::Rejected { status: status.as_u16() });
                }

                debug!(status = status.as_u16(), "Processing endpoint accepted dispatch");
                Ok(())
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::models::{EventAction, ResourceId, ResourceType};

    fn event() -> ResourceEvent {
        ResourceEvent {
            resource_id: ResourceId::from("123"),
            resource_type: ResourceType::Task,
            action: EventAction::Changed,
            changed_field: None,
            new_status: Some("in analysis".to_string()),
            occurred_at: None,
            position: 0,
        }
    }

    #[tokio::test]
    async fn posts_event_with_dispatch_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process"))
            .and(header(DISPATCH_KEY_HEADER, "123:changed:b1"))
            .and(body_partial_json(serde_json::json!({
                "dispatch_key": "123:changed:b1",
                "event": {"resource_id": "123", "resource_type": "task", "action": "changed"}
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let trigger =
            HttpProcessingTrigger::new(format!("{}/process", server.uri()), Duration::from_secs(5))
                .unwrap();

        trigger.trigger(&event(), &DispatchKey::from("123:changed:b1")).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let trigger = HttpProcessingTrigger::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = trigger.trigger(&event(), &DispatchKey::from("k")).await.unwrap_err();

        assert!(matches!(err, TriggerError::Rejected { status: 503 }));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let trigger = HttpProcessingTrigger::new(server.uri(), Duration::from_millis(100)).unwrap();
        let err = trigger.trigger(&event(), &DispatchKey::from("k")).await.unwrap_err();

        assert!(matches!(err, TriggerError::Timeout { .. }));
    }

    #[tokio::test]
    async fn logging_trigger_always_succeeds() {
        assert!(LoggingTrigger.trigger(&event(), &DispatchKey::from("k")).await.is_ok());
    }
}
