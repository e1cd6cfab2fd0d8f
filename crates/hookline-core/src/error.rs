//! Error types and result handling for webhook ingestion.
//!
//! Codes group client problems (E1xxx), downstream processing problems
//! (E2xxx) and infrastructure problems (E3xxx) so callers can tell them apart
//! without matching on messages. Status-code mapping lives in the HTTP layer.

use thiserror::Error;

/// Result type alias using `HooklineError`.
pub type Result<T> = std::result::Result<T, HooklineError>;

/// Failure of the dispatch record store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store rejected or failed the operation.
    #[error("database error: {0}")]
    Database(String),

    /// The store could not be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Failure of the downstream processing trigger.
///
/// These never reach the webhook source; the dispatcher logs them and keeps
/// the `Triggered` outcome.
#[derive(Debug, Clone, Error)]
pub enum TriggerError {
    /// The processing endpoint could not be reached.
    #[error("processing endpoint unreachable: {message}")]
    Network {
        /// Transport error description
        message: String,
    },

    /// The processing endpoint did not answer in time.
    #[error("processing request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout in seconds
        timeout_secs: u64,
    },

    /// The processing endpoint answered with a non-success status.
    #[error("processing endpoint rejected dispatch: HTTP {status}")]
    Rejected {
        /// HTTP status code returned
        status: u16,
    },

    /// The trigger could not be constructed.
    #[error("processing trigger misconfigured: {0}")]
    Configuration(String),
}

/// Hookline error types with stable codes.
#[derive(Debug, Error)]
pub enum HooklineError {
    /// Body is not a JSON object (E1001).
    #[error("[E1001] Malformed payload: {reason}")]
    MalformedPayload {
        /// Why the body was rejected
        reason: String,
    },

    /// Delivery used a method other than POST outside the handshake (E1002).
    #[error("[E1002] Method not allowed: {method}")]
    MethodNotAllowed {
        /// The rejected HTTP method
        method: String,
    },

    /// Downstream processing failed (E2001).
    #[error("[E2001] Processing trigger failed: {0}")]
    Trigger(#[from] TriggerError),

    /// The insert-if-absent on the dispatch store failed (E3001).
    #[error("[E3001] Dispatch store failed: {0}")]
    DispatchStore(#[from] StoreError),

    /// Configuration could not be turned into a running service (E3002).
    #[error("[E3002] Invalid configuration: {0}")]
    Configuration(String),

    /// Processing task died before producing a report.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HooklineError {
    /// Builds a `MalformedPayload` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload { reason: reason.into() }
    }

    /// Returns the error code (E1001-E3002).
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "E1001",
            Self::MethodNotAllowed { .. } => "E1002",
            Self::Trigger(_) => "E2001",
            Self::DispatchStore(_) => "E3001",
            Self::Configuration(_) => "E3002",
            Self::Internal(_) => "E9999",
        }
    }

    /// Returns whether the webhook source should redeliver.
    ///
    /// Store failures are retryable because insert-if-absent makes a repeated
    /// delivery safe.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DispatchStore(_)
                | Self::Internal(_)
                | Self::Trigger(TriggerError::Network { .. } | TriggerError::Timeout { .. })
        )
    }
}
