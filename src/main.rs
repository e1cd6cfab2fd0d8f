//! Hookline webhook receiver.
//!
//! Main entry point. Loads configuration, picks the dispatch store and the
//! processing trigger, starts the retention sweeper and serves HTTP until a
//! shutdown signal arrives.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use hookline_api::{shutdown_signal, start_server, AppState, Config, LogFormat};
use hookline_core::{
    Clock, DispatchStore, HttpProcessingTrigger, InMemoryDispatchStore, LoggingTrigger,
    PostgresDispatchStore, ProcessingTrigger, RealClock, RetentionSweeper,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config);

    info!("Starting hookline webhook receiver");
    let database_url = config.database_url_masked();
    info!(
        database_url = database_url.as_deref().unwrap_or("in-memory"),
        processing_url = config.processing_url.as_deref().unwrap_or("log only"),
        target_status = %config.target_status,
        request_timeout_ms = config.request_timeout_ms,
        "Configuration loaded"
    );

    let addr = config.parse_server_addr()?;
    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());

    let (store, db_pool): (Arc<dyn DispatchStore>, Option<sqlx::PgPool>) =
        match config.database_url.as_deref() {
            Some(url) => {
                let pool = create_database_pool(url, config.database_max_connections).await?;
                info!("Database connection pool established");

                let store = PostgresDispatchStore::new(pool.clone());
                store.ensure_schema().await.context("Failed to create dispatch_records table")?;
                info!("Database schema ready");

                (Arc::new(store), Some(pool))
            },
            None => {
                warn!("No DATABASE_URL set, dispatch records are kept in memory only");
                (Arc::new(InMemoryDispatchStore::new()), None)
            },
        };

    let trigger: Arc<dyn ProcessingTrigger> = match config.processing_url.as_deref() {
        Some(url) => Arc::new(
            HttpProcessingTrigger::new(url, config.processing_timeout())
                .context("Failed to build processing trigger")?,
        ),
        None => Arc::new(LoggingTrigger),
    };

    let state = AppState::new(&config, store.clone(), trigger, clock.clone())?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let sweeper = RetentionSweeper::new(
        store,
        clock,
        config.dispatch_retention(),
        config.purge_interval(),
    );
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.child_token()));

    info!(%addr, "Hookline is ready to receive webhooks");

    if let Err(e) = start_server(state, addr, shutdown.clone()).await {
        error!(error = %e, "Server failed");
    }

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        error!(error = %e, "Retention sweeper task failed");
    }

    if let Some(pool) = db_pool {
        pool.close().await;
        info!("Database connections closed");
    }

    info!("Hookline shutdown complete");
    Ok(())
}

/// Initializes tracing from `RUST_LOG`, falling back to the configured level.
fn init_tracing(config: &Config) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!("{},hookline=debug,tower_http=debug", config.rust_log))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(true)).init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
    }
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(url: &str, max_connections: u32) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect(url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .execute(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(e) if retries < MAX_RETRIES => {
                retries += 1;
                warn!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}
