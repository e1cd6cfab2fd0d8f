//! Delivery acknowledgement body.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::IngestReport;

/// Success body returned to the webhook source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    /// Always true.
    pub received: bool,
    /// Human-readable summary.
    pub message: String,
    /// Events extracted from the envelope.
    pub events: usize,
    /// Events newly dispatched.
    pub dispatched: usize,
    /// Events skipped as already dispatched.
    pub deduplicated: usize,
    /// Whether processing outlived the request budget.
    pub deferred: bool,
    /// When the delivery was received.
    pub timestamp: DateTime<Utc>,
}

impl DeliveryReceipt {
    /// Receipt for a delivery whose processing continues in the background.
    pub fn deferred(received_at: DateTime<Utc>) -> Self {
        Self {
            received: true,
            message: "Webhook received, processing continues in background".to_string(),
            events: 0,
            dispatched: 0,
            deduplicated: 0,
            deferred: true,
            timestamp: received_at,
        }
    }
}

/// Builds the receipt for a fully processed delivery.
pub fn acknowledge(report: &IngestReport, received_at: DateTime<Utc>) -> DeliveryReceipt {
    DeliveryReceipt {
        received: true,
        message: "Webhook received".to_string(),
        events: report.extracted,
        dispatched: report.triggered(),
        deduplicated: report.deduplicated(),
        deferred: false,
        timestamp: received_at,
    }
}
