//! Background startup helper.
//!
//! [`spawn_api`] binds eagerly, so an unusable address is reported to the
//! caller, and then serves on a background Tokio task.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tempo_api::startup::spawn_api;
//!
//! let (handle, addr) = spawn_api(&config.server, state, shutdown_signal()).await?;
//! // ... later
//! handle.await?;
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tempo_core::config::ServerConfig;
use tokio::task::JoinHandle;

use crate::server::{self, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),

    /// The bound socket has no local address.
    #[error("could not read bound address: {0}")]
    LocalAddr(#[from] std::io::Error),
}

/// Spawn the HTTP server on a background task.
///
/// Returns the task handle and the address actually bound (useful with
/// port `0`). The task ends once `shutdown` resolves and in-flight
/// requests have drained.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address cannot be bound.
pub async fn spawn_api<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(JoinHandle<()>, SocketAddr), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = server::bind(config).await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Session API exited with error");
        }
    });

    tracing::info!(%addr, "Session API spawned on background task");
    Ok((handle, addr))
}
