//! The authoritative, serializable record of one game.
//!
//! [`SessionState`] only changes by folding [`EventRecord`]s, so a state
//! rebuilt from the event log is identical to the one the engine held in
//! memory. The fold enforces the session invariants:
//!
//! - records are contiguous (`seq == version + 1`)
//! - `Created` is first and only first, so the color is resolved once
//! - moves are only accepted from the current turn owner while in progress
//! - the outcome is monotone: nothing folds onto a terminal session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Color, ColorSource, EnginePhase, Method, Turn};
use crate::events::{EventRecord, SessionEvent};
use crate::ids::SessionId;
use crate::structs::Verdict;

/// Errors raised while folding event records into a [`SessionState`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// The log was empty.
    #[error("event log is empty")]
    Empty,

    /// The first record was not `Created`.
    #[error("first event must be `created`, found `{found}`")]
    MissingCreated {
        /// Kind of the first event.
        found: &'static str,
    },

    /// A second `Created` record appeared.
    #[error("session {session_id} was already created")]
    DuplicateCreated {
        /// The session.
        session_id: SessionId,
    },

    /// A record belongs to another session.
    #[error("record for session {found} folded into session {expected}")]
    ForeignRecord {
        /// The session being rebuilt.
        expected: SessionId,
        /// The session named by the record.
        found: SessionId,
    },

    /// A record's sequence number was not the next one.
    #[error("expected seq {expected}, found {found}")]
    OutOfOrder {
        /// The next contiguous sequence number.
        expected: u64,
        /// The sequence number found.
        found: u64,
    },

    /// An event arrived after the session reached a terminal outcome.
    #[error("session {session_id} is terminal; cannot apply `{kind}`")]
    AlreadyTerminal {
        /// The session.
        session_id: SessionId,
        /// Kind of the rejected event.
        kind: &'static str,
    },

    /// A move was recorded for the player who did not own the turn.
    #[error("move by {by} recorded while it was {turn}'s turn")]
    WrongTurn {
        /// The recorded mover.
        by: Turn,
        /// The turn owner at that point.
        turn: Turn,
    },

    /// A `Concluded` record carried a non-terminal verdict.
    #[error("concluded with a non-terminal verdict")]
    OpenVerdict,
}

/// Snapshot of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionState {
    /// Session identifier.
    pub id: SessionId,
    /// The human's color. The machine plays the opponent.
    pub color: Color,
    /// How `color` was decided.
    pub color_source: ColorSource,
    /// Starting position in FEN.
    pub initial_fen: String,
    /// Current position in FEN.
    pub fen: String,
    /// Who acts next; frozen once terminal.
    pub turn: Turn,
    /// Outcome, method, and result.
    pub verdict: Verdict,
    /// Retained failure reason for `Failed` sessions.
    pub failure: Option<String>,
    /// Applied moves in UCI notation.
    pub moves: Vec<String>,
    /// Sequence number of the last folded record.
    pub version: u64,
    /// When the `Created` record was committed.
    pub created_at: DateTime<Utc>,
    /// When the last record was committed.
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// Build the initial state from a `Created` record.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::MissingCreated`] if the record is not a
    /// `Created` event, or [`ReplayError::OutOfOrder`] if its sequence
    /// number is not 1.
    pub fn from_created(record: &EventRecord) -> Result<Self, ReplayError> {
        let SessionEvent::Created {
            color,
            color_source,
            initial_fen,
            turn,
        } = &record.event
        else {
            return Err(ReplayError::MissingCreated {
                found: record.event.kind(),
            });
        };

        if record.seq != 1 {
            return Err(ReplayError::OutOfOrder {
                expected: 1,
                found: record.seq,
            });
        }

        Ok(Self {
            id: record.session_id,
            color: *color,
            color_source: *color_source,
            initial_fen: initial_fen.clone(),
            fen: initial_fen.clone(),
            turn: *turn,
            verdict: Verdict::IN_PROGRESS,
            failure: None,
            moves: Vec::new(),
            version: 1,
            created_at: record.recorded_at,
            updated_at: record.recorded_at,
        })
    }

    /// Rebuild a state by folding a full log from its `Created` record.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] if the log is empty, out of order, or
    /// violates a session invariant.
    pub fn replay(records: &[EventRecord]) -> Result<Self, ReplayError> {
        let (first, rest) = records.split_first().ok_or(ReplayError::Empty)?;
        let mut state = Self::from_created(first)?;
        for record in rest {
            state.apply(record)?;
        }
        Ok(state)
    }

    /// Fold one record onto this state.
    ///
    /// On error the state is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] if the record is foreign, out of order, or
    /// violates a session invariant.
    pub fn apply(&mut self, record: &EventRecord) -> Result<(), ReplayError> {
        if record.session_id != self.id {
            return Err(ReplayError::ForeignRecord {
                expected: self.id,
                found: record.session_id,
            });
        }

        let expected = self.version.saturating_add(1);
        if record.seq != expected {
            return Err(ReplayError::OutOfOrder {
                expected,
                found: record.seq,
            });
        }

        if let SessionEvent::Created { .. } = record.event {
            return Err(ReplayError::DuplicateCreated {
                session_id: self.id,
            });
        }

        if self.verdict.is_terminal() {
            return Err(ReplayError::AlreadyTerminal {
                session_id: self.id,
                kind: record.event.kind(),
            });
        }

        match &record.event {
            SessionEvent::Created { .. } => {}
            SessionEvent::MoveApplied { by, uci, fen_after } => {
                if *by != self.turn {
                    return Err(ReplayError::WrongTurn {
                        by: *by,
                        turn: self.turn,
                    });
                }
                self.fen.clone_from(fen_after);
                self.moves.push(uci.clone());
                self.turn = self.turn.flipped();
            }
            SessionEvent::Resigned { side } => {
                self.verdict = Verdict::resignation(*side);
            }
            SessionEvent::Concluded { verdict } => {
                if !verdict.is_terminal() {
                    return Err(ReplayError::OpenVerdict);
                }
                self.verdict = *verdict;
            }
            SessionEvent::Failed { method, reason } => {
                self.verdict = Verdict::failed(*method);
                self.failure = Some(reason.clone());
            }
        }

        self.version = record.seq;
        self.updated_at = record.recorded_at;
        Ok(())
    }

    /// Whether the outcome is final.
    pub const fn is_terminal(&self) -> bool {
        self.verdict.is_terminal()
    }

    /// The engine phase implied by this state.
    pub const fn phase(&self) -> EnginePhase {
        if self.verdict.is_terminal() {
            EnginePhase::Terminal
        } else {
            match self.turn {
                Turn::Human => EnginePhase::WaitingForHuman,
                Turn::Machine => EnginePhase::WaitingForMachine,
            }
        }
    }

    /// The record that would fail this session with `method` and `reason`.
    pub fn failure_event(method: Method, reason: impl Into<String>) -> SessionEvent {
        SessionEvent::Failed {
            method,
            reason: reason.into(),
        }
    }
}
