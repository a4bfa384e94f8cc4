//! Enumeration types for Tempo game sessions.
//!
//! Colors, turn ownership, outcomes and the engine phase reported in
//! session views. Every enum here is part of the public JSON surface and
//! exported to `TypeScript` via `ts-rs`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// One of the two sides of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Color {
    /// The side that moves first from the standard position.
    White,
    /// The side that moves second from the standard position.
    Black,
}

impl Color {
    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Human-readable name (`"White"` / `"Black"`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::White => "White",
            Self::Black => "Black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a color string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown color {0:?} (expected white, black, w or b)")]
pub struct ParseColorError(pub String);

impl FromStr for Color {
    type Err = ParseColorError;

    /// Accepts `white`, `w`, `black`, `b` in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Self::White),
            "black" | "b" => Ok(Self::Black),
            _ => Err(ParseColorError(s.to_owned())),
        }
    }
}

/// How the human's color was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ColorSource {
    /// The creator asked for this color.
    Explicit,
    /// A single fair coin flip, recorded at creation.
    Random,
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// Which player must act next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Turn {
    /// The human player, driven by signals.
    Human,
    /// The automated player, driven by the move provider.
    Machine,
}

impl Turn {
    /// Derive the turn owner from the side to move and the human's color.
    pub fn for_side(side_to_move: Color, human: Color) -> Self {
        if side_to_move == human {
            Self::Human
        } else {
            Self::Machine
        }
    }

    /// The other player.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Human => Self::Machine,
            Self::Machine => Self::Human,
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Human => "Human",
            Self::Machine => "Machine",
        })
    }
}

// ---------------------------------------------------------------------------
// Outcome, method, result
// ---------------------------------------------------------------------------

/// Lifecycle outcome of a session.
///
/// Monotone: once a session leaves `InProgress` it never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Outcome {
    /// The game is still being played.
    InProgress,
    /// The side to move is checkmated.
    Checkmate,
    /// The game was drawn (see [`Method`] for the reason).
    Draw,
    /// One side resigned.
    Resignation,
    /// The automated player or the storage layer failed.
    Failed,
}

impl Outcome {
    /// Whether no further turns will be processed.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// How a session reached its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Method {
    /// No outcome yet.
    NoMethod,
    /// Checkmate on the board.
    Checkmate,
    /// A player resigned.
    Resignation,
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// Neither side can possibly mate.
    InsufficientMaterial,
    /// 75 moves by each side without a capture or pawn move.
    SeventyFiveMoveRule,
    /// The same position occurred five times.
    FivefoldRepetition,
    /// The move provider failed, timed out, or suggested an illegal move.
    ProviderFailure,
    /// A session event could not be persisted.
    StorageFailure,
}

/// Game result in PGN notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum GameResult {
    /// Game not finished (`*`).
    #[serde(rename = "*")]
    Unfinished,
    /// White won (`1-0`).
    #[serde(rename = "1-0")]
    WhiteWon,
    /// Black won (`0-1`).
    #[serde(rename = "0-1")]
    BlackWon,
    /// Drawn (`1/2-1/2`).
    #[serde(rename = "1/2-1/2")]
    Drawn,
}

impl GameResult {
    /// The result in which `winner` won.
    pub const fn win_for(winner: Color) -> Self {
        match winner {
            Color::White => Self::WhiteWon,
            Color::Black => Self::BlackWon,
        }
    }

    /// PGN string for this result.
    pub const fn as_pgn(self) -> &'static str {
        match self {
            Self::Unfinished => "*",
            Self::WhiteWon => "1-0",
            Self::BlackWon => "0-1",
            Self::Drawn => "1/2-1/2",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pgn())
    }
}

// ---------------------------------------------------------------------------
// Engine phase
// ---------------------------------------------------------------------------

/// Where the session engine is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EnginePhase {
    /// Side assignment and starting position are being resolved.
    Init,
    /// The move provider is computing the automated player's move.
    WaitingForMachine,
    /// Suspended until the human signals a move or resignation.
    WaitingForHuman,
    /// The outcome is final; only queries are served.
    Terminal,
}
