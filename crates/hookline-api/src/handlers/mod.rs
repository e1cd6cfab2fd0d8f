//! HTTP request handlers.
//!
//! - `webhook` - the single delivery endpoint, including the handshake
//! - `health` - health and liveness probes
//!
//! Errors are rendered through [`crate::error::ApiError`] as
//! `{"error": {"code", "message"}}` with codes from the E1001-E3002 taxonomy.

pub mod health;
pub mod webhook;

pub use health::{health_check, liveness_check};
pub use webhook::receive_webhook;
