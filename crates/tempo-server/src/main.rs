//! Tempo server binary.
//!
//! Wires the session store, rules, move provider, session directory, and
//! HTTP API together, recovers stored sessions, and serves until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `tempo-config.yaml` (or `$TEMPO_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the session store (file or memory)
//! 4. Build the move provider (random or a pool of UCI engines) and the
//!    metrics registry
//! 5. Recover every stored session and resume unfinished ones
//! 6. Serve the session API
//! 7. On Ctrl-C: stop accepting requests, then stop every session engine

mod error;
mod uci_provider;

use std::path::PathBuf;
use std::sync::Arc;

use tempo_api::AppState;
use tempo_core::config::{LogFormat, LoggingConfig, ProviderConfig, ProviderKind, StorageBackend, StorageConfig};
use tempo_core::{
    EngineContext, Metrics, MoveProvider, RandomMoveProvider, ServiceConfig, SessionDirectory,
};
use tempo_rules::ChessRules;
use tempo_store::{FileStore, MemoryStore, SessionStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServiceError;
use crate::uci_provider::UciEngineProvider;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, storage, recovery, or the HTTP
/// server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_logging(&config.logging);

    info!(
        host = %config.server.host,
        port = config.server.port,
        provider = ?config.provider.kind,
        storage = ?config.storage.backend,
        move_time_ms = config.engine.move_time_ms,
        provider_deadline_ms = config.engine.provider_deadline_ms,
        "tempo-server starting"
    );

    run(&config).await?;
    Ok(())
}

async fn run(config: &ServiceConfig) -> Result<(), ServiceError> {
    let store = open_store(&config.storage).await?;
    let rules = Arc::new(ChessRules::new());
    let provider = build_provider(&config.provider, &rules);
    info!(provider = provider.name(), "Move provider configured");
    let metrics = Arc::new(Metrics::new()?);

    let directory = Arc::new(SessionDirectory::new(EngineContext {
        rules,
        provider,
        store,
        config: config.engine,
        metrics,
    }));

    directory.recover().await?;

    let state = Arc::new(AppState::new(Arc::clone(&directory)));
    let (server, addr) = tempo_api::spawn_api(&config.server, state, shutdown_signal()).await?;
    info!(%addr, "tempo-server ready");

    let served = server.await;

    directory.shutdown().await;
    info!("tempo-server shutdown complete");

    served.map_err(|e| ServiceError::Task {
        message: e.to_string(),
    })
}

/// Load configuration from `$TEMPO_CONFIG`, falling back to
/// `tempo-config.yaml` in the working directory.
fn load_config() -> Result<ServiceConfig, ServiceError> {
    let path = std::env::var_os("TEMPO_CONFIG")
        .map_or_else(|| PathBuf::from("tempo-config.yaml"), PathBuf::from);
    Ok(ServiceConfig::load_or_default(&path)?)
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn open_store(config: &StorageConfig) -> Result<Arc<dyn SessionStore>, ServiceError> {
    match config.backend {
        StorageBackend::File => {
            let store = FileStore::open(config.data_dir.clone()).await?;
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory session store; sessions will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn build_provider(config: &ProviderConfig, rules: &Arc<ChessRules>) -> Arc<dyn MoveProvider> {
    match config.kind {
        ProviderKind::Random => Arc::new(RandomMoveProvider::new(Arc::clone(rules))),
        ProviderKind::Uci => Arc::new(
            UciEngineProvider::new(config.engine_path.clone(), config.max_idle_engines)
                .with_args(config.engine_args.clone()),
        ),
    }
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C; serving until the process is killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
