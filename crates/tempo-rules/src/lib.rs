//! Rules adapter for Tempo game sessions.
//!
//! The session engine never interprets moves itself. It hands positions
//! and move text to a [`RulesAdapter`] and acts on what comes back: a new
//! position, a rejection, or a [`Verdict`]. Positions are opaque handles
//! (`RulesAdapter::Position`) that the adapter converts to and from FEN,
//! the one canonical notation used on both sides of the boundary. Moves
//! use UCI long algebraic notation (`e2e4`, `e7e8q`).
//!
//! # Modules
//!
//! - [`chess`] -- [`ChessRules`], standard chess backed by `shakmaty`
//! - [`notation`] -- Syntactic validation of UCI move text
//! - [`render`] -- Unicode board rendering
//!
//! [`ChessRules`]: chess::ChessRules

pub mod chess;
pub mod notation;
pub mod render;

use tempo_types::{Color, Verdict};

pub use chess::{ChessPosition, ChessRules};

/// Errors reported by a [`RulesAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    /// The starting position could not be parsed or is not a legal setup.
    #[error("invalid position {fen:?}: {reason}")]
    InvalidPosition {
        /// The rejected FEN.
        fen: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The move text is not well-formed UCI.
    #[error("malformed move {text:?}: expected UCI notation such as e2e4 or e7e8q")]
    MalformedMove {
        /// The rejected text.
        text: String,
    },

    /// The move is well-formed but not legal in the position.
    #[error("illegal move {uci}")]
    IllegalMove {
        /// The rejected move, normalised to lowercase.
        uci: String,
    },
}

impl RulesError {
    /// Whether the error is a validation failure (bad input shape) rather
    /// than a legality failure.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidPosition { .. } | Self::MalformedMove { .. })
    }
}

/// Validates and applies moves, lists legal moves, and decides outcomes.
///
/// Implementations are stateless: every call takes the position it
/// operates on, and applying a move returns a new position rather than
/// mutating the old one. A rejected move therefore cannot disturb the
/// caller's state.
pub trait RulesAdapter: Send + Sync + 'static {
    /// Opaque position handle.
    type Position: Clone + Send + Sync + 'static;

    /// Create a position from `fen`, or the standard start when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidPosition`] if the FEN does not parse or
    /// describes an impossible position.
    fn new_game(&self, fen: Option<&str>) -> Result<Self::Position, RulesError>;

    /// Apply `uci` to `position`, returning the resulting position.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::MalformedMove`] if the text is not UCI, or
    /// [`RulesError::IllegalMove`] if the move is not legal here.
    fn apply_move(&self, position: &Self::Position, uci: &str)
    -> Result<Self::Position, RulesError>;

    /// The outcome of `position` as it stands.
    fn verdict(&self, position: &Self::Position) -> Verdict;

    /// Legal moves for the side to move, in UCI notation.
    fn legal_moves(&self, position: &Self::Position) -> Vec<String>;

    /// The verdict when `side` resigns in `position`.
    fn resign(&self, position: &Self::Position, side: Color) -> Verdict;

    /// `position` in FEN.
    fn fen(&self, position: &Self::Position) -> String;

    /// The side to move.
    fn side_to_move(&self, position: &Self::Position) -> Color;

    /// Human-readable rendering of the board.
    fn render(&self, position: &Self::Position) -> String;

    /// Canonical spelling of a move, as recorded in the session history.
    ///
    /// The default trims surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::MalformedMove`] if the text is not a move in
    /// this adapter's notation.
    fn normalize_move(&self, text: &str) -> Result<String, RulesError> {
        Ok(text.trim().to_owned())
    }

    /// Rebuild a position by replaying `moves` from `initial_fen`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RulesError`] encountered.
    fn replay(&self, initial_fen: &str, moves: &[String]) -> Result<Self::Position, RulesError> {
        let mut position = self.new_game(Some(initial_fen))?;
        for uci in moves {
            position = self.apply_move(&position, uci)?;
        }
        Ok(position)
    }
}
