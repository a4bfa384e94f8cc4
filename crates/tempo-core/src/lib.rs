//! Durable session state machine for Tempo.
//!
//! Every game is a [`SessionEngine`] task owning its state, fed by a single
//! signal queue and publishing a view after each durable commit. The
//! [`SessionDirectory`] creates, finds, recovers, and stops engines.
//!
//! # Architecture
//!
//! ```text
//! SessionDirectory
//!     |
//!     +-- create / recover --> SessionEngine (one tokio task per session)
//!     |                            |-- RulesAdapter   (legality, outcomes)
//!     |                            |-- MoveProvider   (automated side)
//!     |                            +-- SessionStore   (log + snapshot)
//!     |
//!     +-- lookup --> SessionHandle (signals in, views out)
//! ```
//!
//! # Modules
//!
//! - [`config`] -- Typed configuration loaded from `tempo-config.yaml`
//! - [`provider`] -- `MoveProvider` trait, deadline wrapper, random bot
//! - [`engine`] -- The per-session turn loop and commit protocol
//! - [`gateway`] -- `SessionHandle`: signals, queries, acknowledgements
//! - [`directory`] -- Session registry, creation, listing, recovery
//! - [`metrics`] -- Prometheus counters for sessions, moves, and providers

pub mod config;
pub mod directory;
pub mod engine;
pub mod gateway;
pub mod metrics;
pub mod provider;

pub use config::{ConfigError, ServiceConfig};
pub use directory::{DirectoryError, ListFilter, SessionDirectory};
pub use engine::{EngineContext, EngineError, SessionEngine};
pub use gateway::{GatewayError, MoveAck, ResignAck, SessionHandle};
pub use metrics::{Metrics, MetricsError};
pub use provider::{MoveProvider, ProviderError, RandomMoveProvider};
