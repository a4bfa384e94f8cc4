//! Shared application state for the session API.

use std::sync::Arc;

use tempo_core::SessionDirectory;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. Every
/// request goes through the directory; handlers never touch session state
/// directly.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide session registry.
    pub directory: Arc<SessionDirectory>,
}

impl AppState {
    /// Create application state serving `directory`.
    pub const fn new(directory: Arc<SessionDirectory>) -> Self {
        Self { directory }
    }
}
