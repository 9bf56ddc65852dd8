//! Life RPG API server binary.
//!
//! Wires configuration, the chosen store, the reference-timezone clock,
//! and the HTTP adapter together, then serves until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `liferpg-config.yaml` (or `LIFERPG_CONFIG`)
//! 2. Apply environment overrides
//! 3. Initialize structured logging (tracing)
//! 4. Build the system clock for the reference timezone
//! 5. Connect to `PostgreSQL` and run migrations, or create the
//!    in-memory store
//! 6. Serve the HTTP API

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use liferpg_api::{AppState, ServerConfig, start_server};
use liferpg_core::config::LoggingConfig;
use liferpg_core::{AppConfig, GameService, LogFormat, RetryPolicy, StorageBackend, SystemClock};
use liferpg_db::{MemoryStore, PgStore, PostgresPool, Store};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::StartupError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "liferpg-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, storage setup, or serving fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (mut config, loaded_from) = load_config().context("loading configuration")?;
    config
        .apply_env_overrides()
        .context("applying environment overrides")?;

    init_logging(&config.logging);

    match &loaded_from {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        backend = ?config.storage.backend,
        port = config.server.port,
        utc_offset_minutes = config.clock.utc_offset_minutes,
        max_attempts = config.retry.max_attempts,
        "liferpg-server starting"
    );

    run(&config).await.context("running server")?;

    info!("liferpg-server stopped");
    Ok(())
}

async fn run(config: &AppConfig) -> Result<(), StartupError> {
    let clock = SystemClock::with_offset_minutes(config.clock.utc_offset_minutes)?;
    let retry = RetryPolicy::from(&config.retry);
    let server = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = PostgresPool::connect(&config.database.to_postgres_config()).await?;
            pool.run_migrations().await?;
            info!("Database migrations applied");

            let store = PgStore::new(pool.clone());
            let result = serve(&server, store, clock, retry).await;
            pool.close().await;
            result
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all state is lost on exit");
            serve(&server, MemoryStore::new(), clock, retry).await
        }
    }
}

async fn serve<S: Store + 'static>(
    server: &ServerConfig,
    store: S,
    clock: SystemClock,
    retry: RetryPolicy,
) -> Result<(), StartupError> {
    let service = GameService::new(store, clock).with_retry(retry);
    let state = Arc::new(AppState::new(service));
    start_server(server, state).await?;
    Ok(())
}

/// Load configuration from `LIFERPG_CONFIG` or `liferpg-config.yaml`.
///
/// Returns the defaults and `None` when the file does not exist.
fn load_config() -> Result<(AppConfig, Option<PathBuf>), StartupError> {
    let path = std::env::var_os("LIFERPG_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        let config = AppConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        Ok((AppConfig::default(), None))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
