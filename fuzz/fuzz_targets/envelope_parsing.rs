#![no_main]

//! Fuzz target for envelope validation and event extraction.
//!
//! Arbitrary request bodies must never panic: they are either rejected as
//! malformed or turned into a finite sequence of events.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use hookline_core::{extract, validate, DeliveryEnvelope, DispatchKey, EventFilter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    fuzz_envelope_parsing(data);
});

fn fuzz_envelope_parsing(data: &[u8]) {
    let Some(received_at) = Utc.timestamp_opt(1_700_000_000, 0).single() else { return };
    let envelope = DeliveryEnvelope::new(data.to_vec(), received_at);

    let Ok(validated) = validate(&envelope) else { return };

    let filter = EventFilter::new("in analysis", "status");
    let events = extract(&validated);
    let total = events.clone().count();

    for (seen, event) in events.enumerate() {
        assert!(seen < total);
        assert!(!event.resource_id.as_str().is_empty());

        let key = DispatchKey::for_event(&event, received_at, Duration::from_secs(300));
        assert!(key.as_str().starts_with(event.resource_id.as_str()));

        let _ = filter.is_relevant(&event);
    }
}
