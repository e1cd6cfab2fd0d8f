//! Payload fixtures shaped like the task tracker's webhook deliveries.

use serde_json::{json, Value};

/// Task status change using the flat `new_status` shape.
pub fn task_status_changed(gid: &str, status: &str) -> Value {
    json!({
        "resource": {"gid": gid, "resource_type": "task"},
        "action": "changed",
        "new_status": status
    })
}

/// Task status change using the nested `change.new_value` shape, with a
/// source timestamp.
pub fn task_field_changed(gid: &str, field: &str, value_name: &str, created_at: &str) -> Value {
    json!({
        "user": {"gid": "42", "resource_type": "user"},
        "created_at": created_at,
        "action": "changed",
        "resource": {"gid": gid, "resource_type": "task", "resource_subtype": "default_task"},
        "parent": null,
        "change": {
            "field": field,
            "action": "changed",
            "new_value": {"gid": "777", "resource_type": "enum_option", "name": value_name}
        }
    })
}

/// Change on a non-task resource.
pub fn project_changed(gid: &str) -> Value {
    json!({
        "resource": {"gid": gid, "resource_type": "project"},
        "action": "changed"
    })
}

/// Wraps descriptors in a delivery body.
pub fn envelope(events: impl IntoIterator<Item = Value>) -> Value {
    json!({ "events": events.into_iter().collect::<Vec<_>>() })
}

/// Serialized delivery body.
pub fn envelope_body(events: impl IntoIterator<Item = Value>) -> Vec<u8> {
    envelope(events).to_string().into_bytes()
}
