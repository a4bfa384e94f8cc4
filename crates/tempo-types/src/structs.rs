//! Verdicts, creation parameters, and the read-only session view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Color, EnginePhase, GameResult, Method, Outcome, Turn};
use crate::ids::SessionId;
use crate::state::SessionState;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome, method, and PGN result reported together by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Verdict {
    /// High-level outcome.
    pub outcome: Outcome,
    /// How the outcome came about.
    pub method: Method,
    /// PGN result string.
    pub result: GameResult,
}

impl Verdict {
    /// The verdict of a game that is still being played.
    pub const IN_PROGRESS: Self = Self {
        outcome: Outcome::InProgress,
        method: Method::NoMethod,
        result: GameResult::Unfinished,
    };

    /// `loser` resigned.
    pub const fn resignation(loser: Color) -> Self {
        Self {
            outcome: Outcome::Resignation,
            method: Method::Resignation,
            result: GameResult::win_for(loser.opponent()),
        }
    }

    /// `loser` is checkmated.
    pub const fn checkmate(loser: Color) -> Self {
        Self {
            outcome: Outcome::Checkmate,
            method: Method::Checkmate,
            result: GameResult::win_for(loser.opponent()),
        }
    }

    /// A draw for the given reason.
    pub const fn draw(method: Method) -> Self {
        Self {
            outcome: Outcome::Draw,
            method,
            result: GameResult::Drawn,
        }
    }

    /// A failure for the given reason; no winner is recorded.
    pub const fn failed(method: Method) -> Self {
        Self {
            outcome: Outcome::Failed,
            method,
            result: GameResult::Unfinished,
        }
    }

    /// Whether this verdict ends the game.
    pub const fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Self::IN_PROGRESS
    }
}

// ---------------------------------------------------------------------------
// Creation parameters
// ---------------------------------------------------------------------------

/// Parameters for a new session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Color requested by the human; `None` for a fair random pick.
    pub color: Option<Color>,
    /// Starting position in FEN; `None` for the standard position.
    pub fen: Option<String>,
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// Consistent, derived view of a session at one committed version.
///
/// This is what queries return and what the `WebSocket` stream pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionView {
    /// Session identifier.
    pub id: SessionId,
    /// Current position in FEN.
    pub fen: String,
    /// High-level outcome.
    pub outcome: Outcome,
    /// How the outcome came about.
    pub method: Method,
    /// PGN result string.
    pub result: GameResult,
    /// Unicode rendering of the board.
    pub board: String,
    /// Who acts next (frozen once terminal).
    pub turn: Turn,
    /// The human's color.
    pub color: Color,
    /// Legal moves in UCI notation; only populated on the human's turn.
    pub valid_moves: Vec<String>,
    /// Moves played so far, in UCI notation.
    pub moves: Vec<String>,
    /// Engine state machine phase.
    pub phase: EnginePhase,
    /// Retained failure reason when `outcome` is `Failed`.
    pub failure: Option<String>,
    /// Number of committed events reflected in this view.
    pub version: u64,
    /// Time of the last committed event.
    pub updated_at: DateTime<Utc>,
}

impl SessionView {
    /// Build a view of `state` with the given board rendering and legal
    /// moves. The moves are dropped unless it is the human's turn in a game
    /// still in progress.
    pub fn from_state(
        state: &SessionState,
        phase: EnginePhase,
        board: String,
        legal_moves: Vec<String>,
    ) -> Self {
        let human_to_move = state.turn == Turn::Human && !state.verdict.is_terminal();
        Self {
            id: state.id,
            fen: state.fen.clone(),
            outcome: state.verdict.outcome,
            method: state.verdict.method,
            result: state.verdict.result,
            board,
            turn: state.turn,
            color: state.color,
            valid_moves: if human_to_move { legal_moves } else { Vec::new() },
            moves: state.moves.clone(),
            phase,
            failure: state.failure.clone(),
            version: state.version,
            updated_at: state.updated_at,
        }
    }
}
