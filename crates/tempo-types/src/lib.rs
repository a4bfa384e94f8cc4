//! Shared type definitions for Tempo game sessions.
//!
//! This crate is the single source of truth for the types that cross crate
//! and process boundaries: the session record, its event log, and the view
//! returned to callers. Types flow downstream to `TypeScript` via `ts-rs`
//! for the browser client.
//!
//! # Modules
//!
//! - [`api`] -- Request and response bodies of the HTTP API
//! - [`ids`] -- Type-safe session identifier
//! - [`enums`] -- Colors, turns, outcomes, engine phases
//! - [`events`] -- Append-only event log entries
//! - [`state`] -- The authoritative session record and its fold
//! - [`structs`] -- Verdicts, creation parameters, and the session view

pub mod api;
pub mod enums;
pub mod events;
pub mod ids;
pub mod state;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use api::{CreateGameRequest, CreatedGame, SignalResponse};
pub use enums::{Color, ColorSource, EnginePhase, GameResult, Method, Outcome, ParseColorError, Turn};
pub use events::{EventRecord, SessionEvent};
pub use ids::SessionId;
pub use state::{ReplayError, SessionState};
pub use structs::{SessionParams, SessionView, Verdict};
