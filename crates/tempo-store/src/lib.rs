//! Durable storage for Tempo game sessions.
//!
//! Each session is persisted as an append-only log of [`EventRecord`]s plus
//! a snapshot of its [`SessionState`] written after every commit. The log is
//! the source of truth; the snapshot only shortens recovery.
//!
//! # Architecture
//!
//! ```text
//! Session Engine commit
//!     |
//!     +-- append(record) -------> event log   (append-only, contiguous seq)
//!     |
//!     +-- save_snapshot(state) -> snapshot    (replaced atomically)
//!
//! Startup
//!     |
//!     +-- list() ---> recover(id) = snapshot + events newer than it
//! ```
//!
//! # Modules
//!
//! - [`memory`] -- In-process store for tests and ephemeral deployments
//! - [`file`] -- One directory per session: `events.jsonl` + `snapshot.json`
//! - [`error`] -- Shared error types

pub mod error;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use tempo_types::{EventRecord, SessionId, SessionState};

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;

/// Persistence for session event logs and snapshots.
///
/// Implementations must reject an appended record whose `seq` is not one
/// past the last stored record of its session ([`StoreError::Conflict`]),
/// so a log can never contain gaps or duplicates.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append one record to its session's log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a sequence gap, or an I/O or
    /// serialization error if the write fails.
    async fn append(&self, record: &EventRecord) -> Result<(), StoreError>;

    /// Replace the session's snapshot with `state`.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error if the write fails.
    async fn save_snapshot(&self, state: &SessionState) -> Result<(), StoreError>;

    /// Load the latest snapshot, if one was written.
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error if the read fails.
    async fn load_snapshot(&self, id: SessionId) -> Result<Option<SessionState>, StoreError>;

    /// Load the records with `seq > after`, in order.
    ///
    /// # Errors
    ///
    /// Returns an I/O error, or [`StoreError::Corrupt`] if a record other
    /// than the last cannot be decoded.
    async fn load_events(&self, id: SessionId, after: u64) -> Result<Vec<EventRecord>, StoreError>;

    /// Every stored session, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the store cannot be enumerated.
    async fn list(&self) -> Result<Vec<SessionId>, StoreError>;
}

/// Rebuild a session's state: its snapshot plus any newer events.
///
/// Without a snapshot the whole log is folded from `Created`.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if neither a snapshot nor events exist,
/// or [`StoreError::Replay`] if the records do not fold.
pub async fn recover(store: &dyn SessionStore, id: SessionId) -> Result<SessionState, StoreError> {
    let snapshot = store.load_snapshot(id).await?;
    let after = snapshot.as_ref().map_or(0, |s| s.version);
    let events = store.load_events(id, after).await?;

    let state = match snapshot {
        Some(mut state) => {
            for record in &events {
                state.apply(record)?;
            }
            state
        }
        None if events.is_empty() => return Err(StoreError::NotFound(id)),
        None => SessionState::replay(&events)?,
    };

    tracing::debug!(
        session_id = %id,
        version = state.version,
        folded = events.len(),
        "Recovered session state"
    );
    Ok(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fixtures {
    //! Records shared by the store tests.

    use tempo_types::{Color, ColorSource, EventRecord, SessionEvent, SessionId, Turn};

    pub const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    pub const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    pub fn created(id: SessionId) -> EventRecord {
        EventRecord::new(
            id,
            1,
            SessionEvent::Created {
                color: Color::White,
                color_source: ColorSource::Explicit,
                initial_fen: String::from(START),
                turn: Turn::Human,
            },
        )
    }

    pub fn e4(id: SessionId) -> EventRecord {
        EventRecord::new(
            id,
            2,
            SessionEvent::MoveApplied {
                by: Turn::Human,
                uci: String::from("e2e4"),
                fen_after: String::from(AFTER_E4),
            },
        )
    }

    pub fn resign(id: SessionId, seq: u64) -> EventRecord {
        EventRecord::new(id, seq, SessionEvent::Resigned { side: Color::Black })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempo_types::{Outcome, Turn};

    use super::fixtures::*;
    use super::*;

    #[tokio::test]
    async fn recover_without_snapshot_folds_the_whole_log() {
        let store = MemoryStore::new();
        let id = SessionId::new();
        store.append(&created(id)).await.unwrap();
        store.append(&e4(id)).await.unwrap();

        let state = recover(&store, id).await.unwrap();
        assert_eq!(state.version, 2);
        assert_eq!(state.fen, AFTER_E4);
        assert_eq!(state.turn, Turn::Machine);
    }

    #[tokio::test]
    async fn recover_folds_events_newer_than_the_snapshot() {
        let store = MemoryStore::new();
        let id = SessionId::new();
        store.append(&created(id)).await.unwrap();
        let snapshot = SessionState::from_created(&created(id)).unwrap();
        store.save_snapshot(&snapshot).await.unwrap();
        store.append(&e4(id)).await.unwrap();

        let state = recover(&store, id).await.unwrap();
        assert_eq!(state.version, 2);
        assert_eq!(state.moves, vec![String::from("e2e4")]);
    }

    #[tokio::test]
    async fn recover_keeps_terminal_outcome() {
        let store = MemoryStore::new();
        let id = SessionId::new();
        store.append(&created(id)).await.unwrap();
        store.append(&resign(id, 2)).await.unwrap();

        let state = recover(&store, id).await.unwrap();
        assert_eq!(state.verdict.outcome, Outcome::Resignation);
        assert!(state.is_terminal());
    }

    #[tokio::test]
    async fn recover_unknown_session_is_not_found() {
        let store = MemoryStore::new();
        let err = recover(&store, SessionId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
