//! Hookline HTTP API.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod handshake;
pub mod server;
pub mod state;

pub use config::{Config, LogFormat};
pub use error::ApiError;
pub use handshake::HandshakeResponder;
pub use server::{create_router, serve, shutdown_signal, start_server, WEBHOOK_PATH};
pub use state::AppState;
