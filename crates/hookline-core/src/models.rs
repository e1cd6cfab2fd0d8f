//! Domain models for webhook deliveries and dispatches.
//!
//! Envelopes and events are transient and owned by the request that created
//! them. Dispatch records are the only durable state and are written through
//! [`crate::DispatchStore::insert_if_absent`].

use std::{fmt, time::Duration};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Identifier of a resource in the task tracker (a `gid`).
///
/// Opaque. Numeric identifiers from the source are rendered as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind of resource an event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceType {
    /// A task.
    Task,
    /// Anything else; the raw type name is kept for logs.
    Other(String),
}

impl ResourceType {
    /// Parses the source's `resource_type` value.
    pub fn parse(raw: &str) -> Self {
        if raw == "task" {
            Self::Task
        } else {
            Self::Other(raw.to_string())
        }
    }

    /// Returns the wire name of the type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Task => "task",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What happened to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// A field of the resource changed.
    Changed,
    /// The resource was added to the watched parent.
    Added,
    /// The resource was removed from the watched parent.
    Removed,
    /// Missing or unrecognized action.
    Undefined,
}

impl EventAction {
    /// Parses the source's `action` value; unknown values map to `Undefined`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("changed") => Self::Changed,
            Some("added") => Self::Added,
            Some("removed") => Self::Removed,
            _ => Self::Undefined,
        }
    }

    /// Returns the lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Undefined => "undefined",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrete change notification extracted from an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEvent {
    /// Resource the change applies to.
    pub resource_id: ResourceId,
    /// Kind of resource.
    pub resource_type: ResourceType,
    /// What happened.
    pub action: EventAction,
    /// Name of the changed field, when the source reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_field: Option<String>,
    /// New status value, when the source reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
    /// Source-provided occurrence timestamp (`created_at`), verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<String>,
    /// Zero-based position of the descriptor in the envelope.
    pub position: usize,
}

/// One inbound webhook call as received.
///
/// Handshake requests are answered before an envelope is built, so every
/// envelope is a candidate event delivery.
#[derive(Debug, Clone)]
pub struct DeliveryEnvelope {
    /// Raw request body.
    pub body: Bytes,
    /// When the delivery reached this service.
    pub received_at: DateTime<Utc>,
    /// Source-provided signature header value. Recorded, not verified.
    pub signature: Option<String>,
}

impl DeliveryEnvelope {
    /// Creates an envelope without a signature.
    pub fn new(body: impl Into<Bytes>, received_at: DateTime<Utc>) -> Self {
        Self { body: body.into(), received_at, signature: None }
    }

    /// Attaches the source-provided signature value.
    #[must_use]
    pub fn with_signature(mut self, signature: Option<String>) -> Self {
        self.signature = signature;
        self
    }

    /// Returns true if the source sent a signature header.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// An envelope whose body is known to be a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEnvelope {
    /// Parsed body.
    pub payload: Map<String, Value>,
    /// When the delivery reached this service.
    pub received_at: DateTime<Utc>,
}

/// Composite key identifying one event occurrence for deduplication.
///
/// Shape: `{resource_id}:{action}:{occurrence}` where the occurrence is the
/// source's `created_at` when present, otherwise `b{n}` for the time bucket
/// containing the delivery's receive time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DispatchKey(String);

impl DispatchKey {
    /// Derives the key for an event received at `received_at`.
    ///
    /// A zero `window` is treated as one second.
    pub fn for_event(event: &ResourceEvent, received_at: DateTime<Utc>, window: Duration) -> Self {
        let occurrence = match event.occurred_at.as_deref().map(str::trim) {
            Some(created_at) if !created_at.is_empty() => created_at.to_string(),
            _ => {
                let window_secs = i64::try_from(window.as_secs().max(1)).unwrap_or(i64::MAX);
                format!("b{}", received_at.timestamp().div_euclid(window_secs))
            },
        };

        Self(format!("{}:{}:{}", event.resource_id, event.action, occurrence))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DispatchKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Durable marker that an event occurrence was dispatched. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRecord {
    /// Deduplication key; unique in the store.
    pub key: DispatchKey,
    /// Resource that was dispatched.
    pub resource_id: ResourceId,
    /// When the record was written.
    pub dispatched_at: DateTime<Utc>,
}

/// Result of dispatching one matched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Record inserted and downstream processing invoked.
    Triggered,
    /// A record already existed; nothing invoked.
    Deduplicated,
    /// The insert-if-absent itself failed.
    Failed(StoreError),
}

impl DispatchOutcome {
    /// Returns true for `Failed`.
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Triggered => f.write_str("triggered"),
            Self::Deduplicated => f.write_str("deduplicated"),
            Self::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}
