//! Per-delivery processing: extract, filter, dispatch.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, instrument, warn};

use crate::{
    dispatch::Dispatcher,
    error::{HooklineError, Result},
    extractor::extract,
    filter::EventFilter,
    models::{DispatchOutcome, ResourceId, ResourceType, ValidatedEnvelope},
};

/// Outcome of dispatching one relevant event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// Resource that matched the filter.
    pub resource_id: ResourceId,
    /// What the dispatcher did with it.
    pub outcome: DispatchOutcome,
}

/// Summary of one processed envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Events the extractor produced.
    pub extracted: usize,
    /// Events that passed the filter.
    pub relevant: usize,
    /// One entry per relevant event, in delivery order.
    pub outcomes: Vec<DispatchResult>,
}

impl IngestReport {
    /// Number of `Triggered` outcomes.
    pub fn triggered(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Triggered))
    }

    /// Number of `Deduplicated` outcomes.
    pub fn deduplicated(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Deduplicated))
    }

    /// First failed dispatch, if any.
    pub fn first_failure(&self) -> Option<&DispatchResult> {
        self.outcomes.iter().find(|r| r.outcome.is_failed())
    }

    /// Converts a report containing a failed dispatch into a store error.
    ///
    /// # Errors
    ///
    /// Returns `HooklineError::DispatchStore` carrying the first failure's
    /// `StoreError` if any outcome is `Failed`.
    pub fn into_result(self) -> Result<Self> {
        if let Some(DispatchResult { resource_id, outcome: DispatchOutcome::Failed(err) }) =
            self.first_failure()
        {
            warn!(resource_id = %resource_id, error = %err, "Dispatch failed, rejecting delivery");
            return Err(HooklineError::DispatchStore(err.clone()));
        }
        Ok(self)
    }

    fn count(&self, pred: impl Fn(&DispatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// How a budgeted run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Processing finished within the budget without store failures.
    Finished(IngestReport),
    /// The budget ran out; processing continues in the background.
    Deferred,
}

/// Runs extraction, filtering and dispatch for validated envelopes.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    filter: EventFilter,
    dispatcher: Dispatcher,
}

impl IngestPipeline {
    /// Creates a pipeline.
    pub fn new(filter: EventFilter, dispatcher: Dispatcher) -> Self {
        Self { filter, dispatcher }
    }

    /// Returns the event filter.
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Processes every event of `envelope` sequentially, in delivery order.
    ///
    /// A failed dispatch does not stop the remaining events; each dispatch is
    /// independently idempotent.
    #[instrument(name = "ingest", skip_all, fields(received_at = %envelope.received_at))]
    pub async fn process(&self, envelope: &ValidatedEnvelope) -> IngestReport {
        let mut report = IngestReport::default();

        for event in extract(envelope) {
            report.extracted += 1;

            if event.resource_type == ResourceType::Task {
                debug!(
                    resource_id = %event.resource_id,
                    action = %event.action,
                    new_status = event.new_status.as_deref().unwrap_or_default(),
                    "Task event received"
                );
            }

            if !self.filter.is_relevant(&event) {
                continue;
            }

            report.relevant += 1;
            let outcome = self.dispatcher.dispatch(&event, envelope.received_at).await;
            report.outcomes.push(DispatchResult { resource_id: event.resource_id, outcome });
        }

        info!(
            extracted = report.extracted,
            relevant = report.relevant,
            triggered = report.triggered(),
            deduplicated = report.deduplicated(),
            "Envelope processed"
        );

        report
    }

    /// Processes `envelope` on a spawned task and waits at most `budget`.
    ///
    /// When the budget runs out the task keeps going and `Deferred` is
    /// returned; store failures it hits later are only logged.
    ///
    /// # Errors
    ///
    /// Returns `DispatchStore` if a dispatch failed within the budget and
    /// `Internal` if the processing task panicked.
    pub async fn process_with_budget(
        self: Arc<Self>,
        envelope: ValidatedEnvelope,
        budget: Duration,
    ) -> Result<Completion> {
        let handle = tokio::spawn(async move { self.process(&envelope).await });

        match tokio::time::timeout(budget, handle).await {
            Ok(Ok(report)) => report.into_result().map(Completion::Finished),
            Ok(Err(join_err)) => Err(HooklineError::Internal(format!(
                "processing task failed: {join_err}"
            ))),
            Err(_) => {
                let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
                warn!(budget_ms, "Processing budget exhausted, deferring");
                Ok(Completion::Deferred)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::{
        error::StoreError, storage::memory::InMemoryDispatchStore, time::TestClock,
        trigger::LoggingTrigger,
    };

    fn pipeline(store: InMemoryDispatchStore) -> IngestPipeline {
        let dispatcher = Dispatcher::new(
            Arc::new(store),
            Arc::new(LoggingTrigger),
            Arc::new(TestClock::new()),
            Duration::from_secs(300),
        );
        IngestPipeline::new(EventFilter::new("in analysis", "status"), dispatcher)
    }

    fn envelope(payload: serde_json::Value) -> ValidatedEnvelope {
        let serde_json::Value::Object(payload) = payload else { panic!("not an object") };
        ValidatedEnvelope { payload, received_at: Utc::now() }
    }

    #[tokio::test]
    async fn matching_task_is_triggered_then_deduplicated() {
        let pipeline = pipeline(InMemoryDispatchStore::new());
        let env = envelope(json!({"events": [{
            "resource": {"gid": "123", "resource_type": "task"},
            "action": "changed",
            "new_status": "in analysis"
        }]}));

        let first = pipeline.process(&env).await;
        let second = pipeline.process(&env).await;

        assert_eq!(first.triggered(), 1);
        assert_eq!(first.outcomes[0].resource_id.as_str(), "123");
        assert_eq!(second.triggered(), 0);
        assert_eq!(second.deduplicated(), 1);
    }

    #[tokio::test]
    async fn irrelevant_events_are_counted_but_not_dispatched() {
        let pipeline = pipeline(InMemoryDispatchStore::new());
        let env = envelope(json!({"events": [
            {"resource": {"gid": "9", "resource_type": "project"}, "action": "changed"},
            {
                "resource": {"gid": "10", "resource_type": "task"},
                "action": "changed",
                "new_status": "done"
            },
            "garbage"
        ]}));

        let report = pipeline.process(&env).await;

        assert_eq!(report.extracted, 2);
        assert_eq!(report.relevant, 0);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn empty_object_yields_empty_report() {
        let report = pipeline(InMemoryDispatchStore::new()).process(&envelope(json!({}))).await;
        assert_eq!(report, IngestReport::default());
    }

    #[tokio::test]
    async fn budgeted_run_finishes_within_budget() {
        let pipeline = Arc::new(pipeline(InMemoryDispatchStore::new()));
        let env = envelope(json!({"events": [{
            "resource": {"gid": "1", "resource_type": "task"},
            "action": "changed",
            "new_status": "in analysis"
        }]}));

        let completion = pipeline.process_with_budget(env, Duration::from_secs(5)).await.unwrap();

        let Completion::Finished(report) = completion else { panic!("expected finished") };
        assert_eq!(report.triggered(), 1);
    }

    #[test]
    fn failed_outcome_becomes_store_error() {
        let report = IngestReport {
            extracted: 2,
            relevant: 2,
            outcomes: vec![
                DispatchResult { resource_id: "1".into(), outcome: DispatchOutcome::Triggered },
                DispatchResult {
                    resource_id: "2".into(),
                    outcome: DispatchOutcome::Failed(StoreError::Unavailable("down".into())),
                },
            ],
        };

        let err = report.into_result().unwrap_err();
        assert_eq!(err.code(), "E3001");
        assert!(matches!(
            err,
            HooklineError::DispatchStore(StoreError::Unavailable(ref reason)) if reason == "down"
        ));
    }
}
