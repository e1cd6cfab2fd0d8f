//! Configuration management for the hookline webhook receiver.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "hookline.toml";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`hookline.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Without a database URL the service keeps dispatch records in memory, and
/// without a processing URL matched events are only logged.
///
/// # Example
///
/// ```no_run
/// use hookline_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// Per-request processing budget in milliseconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[serde(default = "default_request_timeout_ms", alias = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,
    /// Largest accepted request body in bytes.
    ///
    /// Environment variable: `MAX_BODY_BYTES`
    #[serde(default = "default_max_body_bytes", alias = "MAX_BODY_BYTES")]
    pub max_body_bytes: usize,
    /// Value of `Access-Control-Allow-Origin`; `*` allows any origin.
    ///
    /// Environment variable: `CORS_ALLOW_ORIGIN`
    #[serde(default = "default_cors_allow_origin", alias = "CORS_ALLOW_ORIGIN")]
    pub cors_allow_origin: String,

    // Webhook source
    /// Status value that triggers processing.
    ///
    /// Environment variable: `TARGET_STATUS`
    #[serde(default = "default_target_status", alias = "TARGET_STATUS")]
    pub target_status: String,
    /// Name of the field whose changes carry the status.
    ///
    /// Environment variable: `STATUS_FIELD`
    #[serde(default = "default_status_field", alias = "STATUS_FIELD")]
    pub status_field: String,
    /// Header carrying the subscription handshake token.
    ///
    /// Environment variable: `HANDSHAKE_HEADER`
    #[serde(default = "default_handshake_header", alias = "HANDSHAKE_HEADER")]
    pub handshake_header: String,
    /// Header carrying the source's delivery signature.
    ///
    /// Environment variable: `SIGNATURE_HEADER`
    #[serde(default = "default_signature_header", alias = "SIGNATURE_HEADER")]
    pub signature_header: String,

    // Deduplication
    /// Width of the time bucket used for events without a source timestamp.
    ///
    /// Environment variable: `DEDUP_WINDOW_SECS`
    #[serde(default = "default_dedup_window_secs", alias = "DEDUP_WINDOW_SECS")]
    pub dedup_window_secs: u64,
    /// How long dispatch records are kept.
    ///
    /// Environment variable: `DISPATCH_RETENTION_SECS`
    #[serde(default = "default_dispatch_retention_secs", alias = "DISPATCH_RETENTION_SECS")]
    pub dispatch_retention_secs: u64,
    /// Interval between retention sweeps.
    ///
    /// Environment variable: `PURGE_INTERVAL_SECS`
    #[serde(default = "default_purge_interval_secs", alias = "PURGE_INTERVAL_SECS")]
    pub purge_interval_secs: u64,

    // Database
    /// PostgreSQL connection URL. Unset keeps records in memory.
    ///
    /// Environment variable: `DATABASE_URL`
    #[serde(default, alias = "DATABASE_URL", skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Maximum number of database connections in the pool.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[serde(default = "default_max_connections", alias = "DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,

    // Processing
    /// Endpoint receiving matched events. Unset logs them instead.
    ///
    /// Environment variable: `PROCESSING_URL`
    #[serde(default, alias = "PROCESSING_URL", skip_serializing_if = "Option::is_none")]
    pub processing_url: Option<String>,
    /// Timeout for calls to the processing endpoint in seconds.
    ///
    /// Environment variable: `PROCESSING_TIMEOUT_SECS`
    #[serde(default = "default_processing_timeout_secs", alias = "PROCESSING_TIMEOUT_SECS")]
    pub processing_timeout_secs: u64,

    // Logging
    /// Log output format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[serde(default, alias = "LOG_FORMAT")]
    pub log_format: LogFormat,
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the merged values
    /// fail validation.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse server socket address from host and port configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Get database URL with password masked for logging.
    pub fn database_url_masked(&self) -> Option<String> {
        let url = self.database_url.as_deref()?;
        if let Some(at_pos) = url.find('@') {
            if let Some(colon_pos) = url[..at_pos].rfind(':') {
                let mut masked = url.to_string();
                masked.replace_range(colon_pos + 1..at_pos, "***");
                return Some(masked);
            }
        }
        Some(url.to_string())
    }

    /// Per-request processing budget.
    pub fn request_budget(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Dedup time-bucket width.
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    /// Dispatch record retention.
    pub fn dispatch_retention(&self) -> Duration {
        Duration::from_secs(self.dispatch_retention_secs)
    }

    /// Interval between retention sweeps.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    /// Processing endpoint timeout.
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    /// Handshake header as a typed header name.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name is not a valid header name.
    pub fn handshake_header_name(&self) -> Result<HeaderName> {
        HeaderName::from_bytes(self.handshake_header.as_bytes())
            .with_context(|| format!("invalid handshake_header: {:?}", self.handshake_header))
    }

    /// Signature header as a typed header name.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name is not a valid header name.
    pub fn signature_header_name(&self) -> Result<HeaderName> {
        HeaderName::from_bytes(self.signature_header.as_bytes())
            .with_context(|| format!("invalid signature_header: {:?}", self.signature_header))
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout_ms == 0 {
            anyhow::bail!("request_timeout_ms must be greater than 0");
        }

        if self.target_status.trim().is_empty() {
            anyhow::bail!("target_status must not be empty");
        }

        self.handshake_header_name()?;
        self.signature_header_name()?;

        if self.dedup_window_secs == 0 {
            anyhow::bail!("dedup_window_secs must be greater than 0");
        }

        if self.dispatch_retention_secs < self.dedup_window_secs {
            anyhow::bail!("dispatch_retention_secs cannot be shorter than dedup_window_secs");
        }

        if self.purge_interval_secs == 0 {
            anyhow::bail!("purge_interval_secs must be greater than 0");
        }

        if self.database_max_connections == 0 {
            anyhow::bail!("database_max_connections must be greater than 0");
        }

        if self.processing_timeout_secs == 0 {
            anyhow::bail!("processing_timeout_secs must be greater than 0");
        }

        if self.cors_allow_origin != "*"
            && HeaderValue::from_str(&self.cors_allow_origin).is_err()
        {
            anyhow::bail!("cors_allow_origin is not a valid header value");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
            cors_allow_origin: default_cors_allow_origin(),
            target_status: default_target_status(),
            status_field: default_status_field(),
            handshake_header: default_handshake_header(),
            signature_header: default_signature_header(),
            dedup_window_secs: default_dedup_window_secs(),
            dispatch_retention_secs: default_dispatch_retention_secs(),
            purge_interval_secs: default_purge_interval_secs(),
            database_url: None,
            database_max_connections: default_max_connections(),
            processing_url: None,
            processing_timeout_secs: default_processing_timeout_secs(),
            log_format: LogFormat::default(),
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_ms() -> u64 {
    8000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_cors_allow_origin() -> String {
    "*".to_string()
}

fn default_target_status() -> String {
    "in analysis".to_string()
}

fn default_status_field() -> String {
    "status".to_string()
}

fn default_handshake_header() -> String {
    "X-Hook-Secret".to_string()
}

fn default_signature_header() -> String {
    "X-Hook-Signature".to_string()
}

fn default_dedup_window_secs() -> u64 {
    300
}

fn default_dispatch_retention_secs() -> u64 {
    7 * 24 * 3600
}

fn default_purge_interval_secs() -> u64 {
    3600
}

fn default_max_connections() -> u32 {
    5
}

fn default_processing_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
