//! Property-based tests for extraction and dispatch invariants.
//!
//! Deterministic and in-memory: no database, no network.

#![allow(clippy::unwrap_used)]

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use hookline_core::{
    extract, validate, Clock, DeliveryEnvelope, DispatchOutcome, Dispatcher, EventFilter,
    InMemoryDispatchStore, IngestPipeline, LoggingTrigger, TestClock,
};
use proptest::{prelude::*, test_runner::Config as ProptestConfig};
use serde_json::{json, Value};

fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 50,
        timeout: 5000,
        fork: false,
        failure_persistence: None,
        source_file: None,
        ..ProptestConfig::default()
    }
}

fn gid_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[1-9][0-9]{0,15}").unwrap()
}

/// Well-formed task descriptors that match the default filter.
fn task_descriptor_strategy() -> impl Strategy<Value = (String, Value)> {
    gid_strategy().prop_map(|gid| {
        let descriptor = json!({
            "resource": {"gid": gid, "resource_type": "task"},
            "action": "changed",
            "new_status": "in analysis"
        });
        (gid, descriptor)
    })
}

/// Descriptors the extractor must skip.
fn malformed_descriptor_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,20}".prop_map(Value::from),
        Just(json!({})),
        Just(json!({"resource": "task"})),
        Just(json!({"resource": {"gid": "1"}})),
        Just(json!({"resource": {"resource_type": "task"}})),
        Just(json!({"resource": {"gid": "", "resource_type": "task"}})),
        Just(json!({"resource": {"gid": true, "resource_type": "task"}})),
    ]
}

/// Interleaves good and bad descriptors, keeping the good ones in order.
fn mixed_envelope_strategy() -> impl Strategy<Value = (Vec<String>, Value)> {
    (
        prop::collection::vec(task_descriptor_strategy(), 0..20),
        prop::collection::vec(malformed_descriptor_strategy(), 0..20),
        prop::collection::vec(any::<bool>(), 40),
    )
        .prop_map(|(good, bad, picks)| {
            let gids = good.iter().map(|(gid, _)| gid.clone()).collect();
            let mut good = good.into_iter().map(|(_, d)| d).peekable();
            let mut bad = bad.into_iter().peekable();
            let mut picks = picks.into_iter();
            let mut events = Vec::new();

            loop {
                let take_good = match (good.peek(), bad.peek()) {
                    (None, None) => break,
                    (Some(_), None) => true,
                    (None, Some(_)) => false,
                    (Some(_), Some(_)) => picks.next().unwrap_or(true),
                };
                let next = if take_good { good.next() } else { bad.next() };
                events.extend(next);
            }

            (gids, json!({ "events": events }))
        })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

proptest! {
    #![proptest_config(proptest_config())]

    /// N well-formed descriptors among M malformed ones yield exactly N events, in order.
    #[test]
    fn extraction_keeps_well_formed_events_in_order((gids, payload) in mixed_envelope_strategy()) {
        let body = serde_json::to_vec(&payload).unwrap();
        let envelope = validate(&DeliveryEnvelope::new(body, Utc::now())).unwrap();

        let extracted: Vec<String> =
            extract(&envelope).map(|e| e.resource_id.as_str().to_string()).collect();

        prop_assert_eq!(extracted, gids);
    }

    /// Extraction is restartable: a cloned iterator yields the same sequence.
    #[test]
    fn extraction_is_restartable((_gids, payload) in mixed_envelope_strategy()) {
        let body = serde_json::to_vec(&payload).unwrap();
        let envelope = validate(&DeliveryEnvelope::new(body, Utc::now())).unwrap();

        let events = extract(&envelope);
        let first: Vec<_> = events.clone().collect();
        let second: Vec<_> = events.collect();

        prop_assert_eq!(first, second);
    }

    /// Redelivery triggers each distinct key once, then only deduplicates.
    #[test]
    fn redelivery_triggers_each_key_once(
        descriptors in prop::collection::vec(task_descriptor_strategy(), 1..10),
        redeliveries in 1usize..4
    ) {
        let distinct: HashSet<String> = descriptors.iter().map(|(gid, _)| gid.clone()).collect();
        let events: Vec<Value> = descriptors.into_iter().map(|(_, d)| d).collect();
        let body = serde_json::to_vec(&json!({ "events": events })).unwrap();

        let clock = TestClock::with_start(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let received_at = clock.now_utc();
        let dispatcher = Dispatcher::new(
            Arc::new(InMemoryDispatchStore::new()),
            Arc::new(LoggingTrigger),
            Arc::new(clock),
            Duration::from_secs(300),
        );
        let pipeline = IngestPipeline::new(EventFilter::new("in analysis", "status"), dispatcher);
        let envelope = validate(&DeliveryEnvelope::new(body, received_at)).unwrap();

        let rt = runtime();
        let first = rt.block_on(pipeline.process(&envelope));
        prop_assert_eq!(first.triggered(), distinct.len());

        for _ in 0..redeliveries {
            let again = rt.block_on(pipeline.process(&envelope));
            prop_assert_eq!(again.triggered(), 0);
            prop_assert!(again.outcomes.iter().all(|r| r.outcome == DispatchOutcome::Deduplicated));
        }
    }
}
