//! Payload validation.
//!
//! A delivery is acceptable when its body is a JSON object. Blank bodies are
//! read as `{}`, matching how webhook hosts present a request without a body.

use serde_json::{Map, Value};

use crate::{
    error::{HooklineError, Result},
    models::{DeliveryEnvelope, ValidatedEnvelope},
};

/// Checks that the envelope body is a JSON object.
///
/// # Errors
///
/// Returns `HooklineError::MalformedPayload` when the body is not JSON or is
/// JSON of another shape (array, string, number, boolean, null).
pub fn validate(envelope: &DeliveryEnvelope) -> Result<ValidatedEnvelope> {
    if envelope.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ValidatedEnvelope { payload: Map::new(), received_at: envelope.received_at });
    }

    let value: Value = serde_json::from_slice(&envelope.body)
        .map_err(|e| HooklineError::malformed(format!("body is not valid JSON: {e}")))?;

    match value {
        Value::Object(payload) => {
            Ok(ValidatedEnvelope { payload, received_at: envelope.received_at })
        },
        other => Err(HooklineError::malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
