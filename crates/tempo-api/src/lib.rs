//! HTTP and `WebSocket` surface for Tempo game sessions.
//!
//! This crate exposes the session directory and gateway over Axum:
//!
//! - **REST endpoints** to create, list, and query sessions, and to submit
//!   the human's moves and resignation
//! - **`WebSocket` endpoint** (`/ws/games/{id}`) pushing each committed
//!   [`SessionView`](tempo_types::SessionView)
//! - **Minimal HTML page** (`GET /`) with session counts and routes
//! - **Prometheus metrics** (`GET /metrics`) for sessions, moves, and the
//!   move provider
//!
//! Errors map onto status codes in one place, [`ApiError`]: validation
//! failures are 400, illegal moves 422, moves out of turn 409, unknown
//! sessions 404, and stopped engines 503.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{serve, ServerError};
pub use startup::{spawn_api, StartupError};
pub use state::AppState;
