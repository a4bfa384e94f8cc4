//! Error types for the Tempo server binary.
//!
//! [`ServiceError`] wraps every failure that can abort startup or the
//! serving loop, so `main` can propagate with `?`.

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tempo_core::ConfigError,
    },

    /// The session store could not be opened.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: tempo_store::StoreError,
    },

    /// The metrics registry could not be built.
    #[error("metrics error: {source}")]
    Metrics {
        /// The underlying metrics error.
        #[from]
        source: tempo_core::MetricsError,
    },

    /// Stored sessions could not be recovered.
    #[error("recovery error: {source}")]
    Recovery {
        /// The underlying directory error.
        #[from]
        source: tempo_core::DirectoryError,
    },

    /// The HTTP server failed to start or stopped with an error.
    #[error("api error: {source}")]
    Api {
        /// The underlying startup error.
        #[from]
        source: tempo_api::StartupError,
    },

    /// The server task panicked or was cancelled.
    #[error("server task failed: {message}")]
    Task {
        /// Description of the task failure.
        message: String,
    },
}
