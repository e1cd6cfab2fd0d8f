//! Event extraction from a validated envelope.
//!
//! Reads the `events` list and turns each descriptor into a
//! [`ResourceEvent`]. Extraction is best-effort: a descriptor without a
//! `resource.resource_type` or `resource.gid` is skipped and the rest of the
//! batch is still returned, in delivery order.
//!
//! Two descriptor shapes are understood:
//!
//! ```json
//! {"resource": {"gid": "1", "resource_type": "task"}, "action": "changed",
//!  "new_status": "in analysis"}
//!
//! {"resource": {"gid": "1", "resource_type": "task"}, "action": "changed",
//!  "change": {"field": "status", "new_value": {"name": "in analysis"}}}
//! ```

use std::{iter::Enumerate, slice};

use serde_json::Value;
use tracing::debug;

use crate::models::{EventAction, ResourceEvent, ResourceId, ResourceType, ValidatedEnvelope};

const NO_EVENTS: &[Value] = &[];

/// Lazy iterator over the events of one envelope.
///
/// A clone continues from the same position independently, so a clone taken
/// before iterating replays the whole envelope.
#[derive(Debug, Clone)]
pub struct Events<'a> {
    descriptors: Enumerate<slice::Iter<'a, Value>>,
}

impl Iterator for Events<'_> {
    type Item = ResourceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (position, raw) = self.descriptors.next()?;
            match parse_descriptor(position, raw) {
                Some(event) => return Some(event),
                None => debug!(position, "Skipping event descriptor without resource type"),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.descriptors.size_hint().1)
    }
}

/// Returns the events carried by `envelope`.
///
/// An absent or non-array `events` field yields an empty sequence.
pub fn extract(envelope: &ValidatedEnvelope) -> Events<'_> {
    let descriptors = match envelope.payload.get("events") {
        Some(Value::Array(events)) => events.as_slice(),
        _ => NO_EVENTS,
    };

    Events { descriptors: descriptors.iter().enumerate() }
}

fn parse_descriptor(position: usize, raw: &Value) -> Option<ResourceEvent> {
    let resource = raw.get("resource")?;
    let resource_type = resource.get("resource_type")?.as_str()?;
    let resource_id = match resource.get("gid")? {
        Value::String(gid) if !gid.is_empty() => gid.clone(),
        Value::Number(gid) => gid.to_string(),
        _ => return None,
    };

    let change = raw.get("change");
    let action = raw
        .get("action")
        .and_then(Value::as_str)
        .or_else(|| change.and_then(|c| c.get("action")).and_then(Value::as_str));

    let new_status = raw
        .get("new_status")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| change.and_then(|c| c.get("new_value")).and_then(status_name));

    Some(ResourceEvent {
        resource_id: ResourceId(resource_id),
        resource_type: ResourceType::parse(resource_type),
        action: EventAction::parse(action),
        changed_field: change
            .and_then(|c| c.get("field"))
            .and_then(Value::as_str)
            .map(str::to_string),
        new_status,
        occurred_at: raw.get("created_at").and_then(Value::as_str).map(str::to_string),
        position,
    })
}

/// Reads a status out of a change's `new_value`: a bare string, a named
/// object, or an enum custom-field value.
fn status_name(new_value: &Value) -> Option<String> {
    match new_value {
        Value::String(name) => Some(name.clone()),
        Value::Object(fields) => fields
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| {
                fields.get("enum_value").and_then(|v| v.get("name")).and_then(Value::as_str)
            })
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn envelope(body: Value) -> ValidatedEnvelope {
        let Value::Object(payload) = body else { panic!("fixture must be an object") };
        ValidatedEnvelope { payload, received_at: Utc::now() }
    }

    #[test]
    fn missing_events_field_is_empty() {
        assert_eq!(extract(&envelope(json!({}))).count(), 0);
        assert_eq!(extract(&envelope(json!({"events": "nope"}))).count(), 0);
    }

    #[test]
    fn extracts_flat_status_shape() {
        let env = envelope(json!({"events": [{
            "resource": {"gid": "123", "resource_type": "task"},
            "action": "changed",
            "new_status": "in analysis"
        }]}));

        let events: Vec<_> = extract(&env).collect();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].resource_id.as_str(), "123");
        assert_eq!(events[0].resource_type, ResourceType::Task);
        assert_eq!(events[0].action, EventAction::Changed);
        assert_eq!(events[0].new_status.as_deref(), Some("in analysis"));
        assert_eq!(events[0].changed_field, None);
    }

    #[test]
    fn extracts_change_shape() {
        let env = envelope(json!({"events": [
            {
                "resource": {"gid": "1", "resource_type": "task"},
                "change": {
                    "action": "changed",
                    "field": "status",
                    "new_value": {"name": "in analysis"}
                },
                "created_at": "2024-05-01T10:00:00.000Z"
            },
            {
                "resource": {"gid": "2", "resource_type": "task"},
                "action": "changed",
                "change": {"field": "custom_fields", "new_value": {"enum_value": {"name": "done"}}}
            },
            {
                "resource": {"gid": "3", "resource_type": "task"},
                "action": "changed",
                "change": {"field": "status", "new_value": "blocked"}
            }
        ]}));

        let events: Vec<_> = extract(&env).collect();

        assert_eq!(events[0].action, EventAction::Changed);
        assert_eq!(events[0].changed_field.as_deref(), Some("status"));
        assert_eq!(events[0].new_status.as_deref(), Some("in analysis"));
        assert_eq!(events[0].occurred_at.as_deref(), Some("2024-05-01T10:00:00.000Z"));
        assert_eq!(events[1].changed_field.as_deref(), Some("custom_fields"));
        assert_eq!(events[1].new_status.as_deref(), Some("done"));
        assert_eq!(events[2].new_status.as_deref(), Some("blocked"));
    }

    #[test]
    fn skips_malformed_descriptors_and_keeps_order() {
        let env = envelope(json!({"events": [
            {"resource": {"gid": "a", "resource_type": "task"}, "action": "added"},
            {"resource": {"gid": "b"}},
            "not an object",
            {"action": "changed"},
            {"resource": {"resource_type": "task"}},
            {"resource": {"gid": 42, "resource_type": "story"}, "action": "removed"},
            {"resource": {"gid": "c", "resource_type": "task"}}
        ]}));

        let events: Vec<_> = extract(&env).collect();
        let ids: Vec<_> = events.iter().map(|e| e.resource_id.as_str()).collect();
        let positions: Vec<_> = events.iter().map(|e| e.position).collect();

        assert_eq!(ids, ["a", "42", "c"]);
        assert_eq!(positions, [0, 5, 6]);
        assert_eq!(events[1].resource_type, ResourceType::Other("story".to_string()));
        assert_eq!(events[2].action, EventAction::Undefined);
    }

    #[test]
    fn extraction_is_restartable() {
        let env = envelope(json!({"events": [
            {"resource": {"gid": "1", "resource_type": "task"}},
            {"resource": {"gid": "2", "resource_type": "task"}}
        ]}));

        let events = extract(&env);
        let first: Vec<_> = events.clone().collect();
        let second: Vec<_> = events.collect();

        assert_eq!(first, second);
        assert_eq!(extract(&env).count(), 2);
    }
}
