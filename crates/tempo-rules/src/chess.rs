//! Standard chess rules backed by `shakmaty`.
//!
//! [`ChessRules`] implements [`RulesAdapter`] for orthodox chess. Games end
//! automatically on checkmate, stalemate, insufficient material, the
//! seventy-five-move rule, and fivefold repetition. Claimable draws
//! (threefold repetition, fifty-move rule) are not offered because neither
//! player has a way to claim them.

use std::collections::BTreeMap;

use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};
use tempo_types::{Color, Method, Verdict};
use tracing::debug;

use crate::notation::parse_uci;
use crate::{RulesAdapter, RulesError, render};

/// Half-moves without capture or pawn move after which the game is drawn.
const SEVENTY_FIVE_MOVE_HALFMOVES: u32 = 150;

/// Occurrences of one position after which the game is drawn.
const FIVEFOLD: u32 = 5;

/// A chess position plus the repetition counts needed to detect
/// fivefold repetition.
#[derive(Debug, Clone)]
pub struct ChessPosition {
    position: Chess,
    /// Occurrences of each position since the last irreversible move,
    /// keyed by FEN without the move counters.
    repetitions: BTreeMap<String, u32>,
}

impl ChessPosition {
    fn new(position: Chess) -> Self {
        let mut repetitions = BTreeMap::new();
        repetitions.insert(repetition_key(&position), 1);
        Self {
            position,
            repetitions,
        }
    }

    /// How many times the current position has occurred.
    pub fn occurrences(&self) -> u32 {
        self.repetitions
            .get(&repetition_key(&self.position))
            .copied()
            .unwrap_or(0)
    }
}

/// Standard chess.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessRules;

impl ChessRules {
    /// Create the rules adapter.
    pub const fn new() -> Self {
        Self
    }
}

impl RulesAdapter for ChessRules {
    type Position = ChessPosition;

    fn new_game(&self, fen: Option<&str>) -> Result<ChessPosition, RulesError> {
        let Some(text) = fen.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(ChessPosition::new(Chess::default()));
        };

        let invalid = |reason: String| RulesError::InvalidPosition {
            fen: text.to_owned(),
            reason,
        };

        let parsed: Fen = text.parse().map_err(|e| invalid(format!("{e}")))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))?;

        Ok(ChessPosition::new(position))
    }

    fn apply_move(&self, position: &ChessPosition, uci: &str) -> Result<ChessPosition, RulesError> {
        let wanted = parse_uci(uci)?;

        let chosen = position
            .position
            .legal_moves()
            .into_iter()
            .find(|m| m.to_uci(CastlingMode::Standard).to_string() == wanted)
            .ok_or_else(|| RulesError::IllegalMove {
                uci: wanted.clone(),
            })?;

        let mut next = position.position.clone();
        next.play_unchecked(&chosen);

        let mut repetitions = if next.halfmoves() == 0 {
            // Captures and pawn moves are irreversible, so no earlier
            // position can recur.
            BTreeMap::new()
        } else {
            position.repetitions.clone()
        };
        let seen = repetitions.entry(repetition_key(&next)).or_insert(0);
        *seen = seen.saturating_add(1);

        debug!(uci = %wanted, "Applied move");

        Ok(ChessPosition {
            position: next,
            repetitions,
        })
    }

    fn normalize_move(&self, text: &str) -> Result<String, RulesError> {
        parse_uci(text)
    }

    fn verdict(&self, position: &ChessPosition) -> Verdict {
        let pos = &position.position;
        if pos.is_checkmate() {
            Verdict::checkmate(to_color(pos.turn()))
        } else if pos.is_stalemate() {
            Verdict::draw(Method::Stalemate)
        } else if pos.is_insufficient_material() {
            Verdict::draw(Method::InsufficientMaterial)
        } else if pos.halfmoves() >= SEVENTY_FIVE_MOVE_HALFMOVES {
            Verdict::draw(Method::SeventyFiveMoveRule)
        } else if position.occurrences() >= FIVEFOLD {
            Verdict::draw(Method::FivefoldRepetition)
        } else {
            Verdict::IN_PROGRESS
        }
    }

    fn legal_moves(&self, position: &ChessPosition) -> Vec<String> {
        position
            .position
            .legal_moves()
            .iter()
            .map(|m| m.to_uci(CastlingMode::Standard).to_string())
            .collect()
    }

    fn resign(&self, _position: &ChessPosition, side: Color) -> Verdict {
        Verdict::resignation(side)
    }

    fn fen(&self, position: &ChessPosition) -> String {
        to_fen(&position.position)
    }

    fn side_to_move(&self, position: &ChessPosition) -> Color {
        to_color(position.position.turn())
    }

    fn render(&self, position: &ChessPosition) -> String {
        render::draw(position.position.board())
    }
}

fn to_fen(position: &Chess) -> String {
    Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
}

/// FEN without the halfmove clock and fullmove number.
fn repetition_key(position: &Chess) -> String {
    let fen = to_fen(position);
    fen.split(' ').take(4).collect::<Vec<_>>().join(" ")
}

const fn to_color(color: shakmaty::Color) -> Color {
    match color {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}
