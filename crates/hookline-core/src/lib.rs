//! Core of the webhook ingestion and event-dispatch service.
//!
//! Turns one inbound delivery into zero or more dispatches:
//!
//! ```text
//! DeliveryEnvelope ─▶ validator ─▶ extractor ─▶ filter ─▶ dispatch ─▶ receipt
//!                      (object?)   (0..N events) (target    (insert-if-absent,
//!                                                 status?)   then trigger)
//! ```
//!
//! Nothing in this crate knows about HTTP. The API crate owns the handshake,
//! method checks and the mapping from [`HooklineError`] kinds to status codes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod receipt;
pub mod retention;
pub mod storage;
pub mod time;
pub mod trigger;
pub mod validator;

pub use dispatch::Dispatcher;
pub use error::{HooklineError, Result, StoreError, TriggerError};
pub use extractor::{extract, Events};
pub use filter::EventFilter;
pub use models::{
    DeliveryEnvelope, DispatchKey, DispatchOutcome, DispatchRecord, EventAction, ResourceEvent,
    ResourceId, ResourceType, ValidatedEnvelope,
};
pub use pipeline::{Completion, DispatchResult, IngestPipeline, IngestReport};
pub use receipt::{acknowledge, DeliveryReceipt};
pub use retention::RetentionSweeper;
pub use storage::{memory::InMemoryDispatchStore, postgres::PostgresDispatchStore, DispatchStore};
pub use time::{Clock, RealClock, TestClock};
pub use trigger::{HttpProcessingTrigger, LoggingTrigger, ProcessingTrigger};
pub use validator::validate;
