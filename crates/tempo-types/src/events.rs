//! Append-only session event log entries.
//!
//! Every committed change to a session is one [`SessionEvent`], wrapped in
//! an [`EventRecord`] carrying its sequence number. A session's state is
//! the left fold of its records (see [`crate::state::SessionState::replay`]).
//! Move events carry the resulting FEN so the fold never needs a rules
//! engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Color, ColorSource, Method, Turn};
use crate::ids::SessionId;
use crate::structs::Verdict;

/// A single committed change to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SessionEvent {
    /// The session was initialised. Always the first record.
    Created {
        /// The human's color, resolved exactly once.
        color: Color,
        /// Whether the color was requested or drawn at random.
        color_source: ColorSource,
        /// Starting position in FEN.
        initial_fen: String,
        /// Who moves first from `initial_fen`.
        turn: Turn,
    },
    /// A move was accepted and applied.
    MoveApplied {
        /// The player who made the move.
        by: Turn,
        /// The move in UCI notation.
        uci: String,
        /// Position after the move, in FEN.
        fen_after: String,
    },
    /// A side resigned.
    Resigned {
        /// The side that resigned.
        side: Color,
    },
    /// The rules reported a terminal position.
    Concluded {
        /// The terminal verdict.
        verdict: Verdict,
    },
    /// The session failed and will process no further turns.
    Failed {
        /// What failed.
        method: Method,
        /// Human-readable failure reason, retained for queries.
        reason: String,
    },
}

impl SessionEvent {
    /// Short name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::MoveApplied { .. } => "move_applied",
            Self::Resigned { .. } => "resigned",
            Self::Concluded { .. } => "concluded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A [`SessionEvent`] with its position in the session's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventRecord {
    /// The session this record belongs to.
    pub session_id: SessionId,
    /// 1-based sequence number, contiguous within a session.
    pub seq: u64,
    /// The event payload.
    pub event: SessionEvent,
    /// Wall-clock time the record was committed.
    pub recorded_at: DateTime<Utc>,
}

impl EventRecord {
    /// Wrap an event as record `seq` of `session_id`, stamped now.
    pub fn new(session_id: SessionId, seq: u64, event: SessionEvent) -> Self {
        Self {
            session_id,
            seq,
            event,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = SessionEvent::MoveApplied {
            by: Turn::Human,
            uci: String::from("e2e4"),
            fen_after: String::from("fen"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "move_applied");
        assert_eq!(json["by"], "Human");
        assert_eq!(json["uci"], "e2e4");
        assert_eq!(event.kind(), "move_applied");
    }

    #[test]
    fn record_survives_a_json_line() {
        let record = EventRecord::new(
            SessionId::new(),
            3,
            SessionEvent::Resigned { side: Color::Black },
        );
        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains('\n'));
        let back: EventRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back, record);
    }
}
