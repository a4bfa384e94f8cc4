//! Unicode board rendering.
//!
//! Produces a small text diagram with file letters across the top and
//! rank numbers down the left, rank 8 first:
//!
//! ```text
//!  A B C D E F G H
//! 8♜ ♞ ♝ ♛ ♚ ♝ ♞ ♜
//! 7♟ ♟ ♟ ♟ ♟ ♟ ♟ ♟
//! 6- - - - - - - -
//! ...
//! ```
//!
//! Every square is followed by a space, and empty squares are drawn as `-`.

use shakmaty::{Board, Color, File, Piece, Rank, Role, Square};

const HEADER: &str = " A B C D E F G H\n";
const RANK_LABELS: [char; 8] = ['1', '2', '3', '4', '5', '6', '7', '8'];

/// Draw `board` as Unicode text.
pub fn draw(board: &Board) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(HEADER);
    for (rank, label) in Rank::ALL.iter().zip(RANK_LABELS).rev() {
        out.push(label);
        for file in File::ALL {
            let square = Square::from_coords(file, *rank);
            out.push(board.piece_at(square).map_or('-', glyph));
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

/// Unicode chess symbol for a piece.
pub const fn glyph(piece: Piece) -> char {
    match (piece.color, piece.role) {
        (Color::White, Role::King) => '♔',
        (Color::White, Role::Queen) => '♕',
        (Color::White, Role::Rook) => '♖',
        (Color::White, Role::Bishop) => '♗',
        (Color::White, Role::Knight) => '♘',
        (Color::White, Role::Pawn) => '♙',
        (Color::Black, Role::King) => '♚',
        (Color::Black, Role::Queen) => '♛',
        (Color::Black, Role::Rook) => '♜',
        (Color::Black, Role::Bishop) => '♝',
        (Color::Black, Role::Knight) => '♞',
        (Color::Black, Role::Pawn) => '♟',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_the_starting_position() {
        let drawn = draw(&Board::default());
        let lines: Vec<&str> = drawn.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines.first().copied(), Some(" A B C D E F G H"));
        assert_eq!(lines.get(1).copied(), Some("8♜ ♞ ♝ ♛ ♚ ♝ ♞ ♜ "));
        assert_eq!(lines.get(4).copied(), Some("5- - - - - - - - "));
        assert_eq!(lines.get(8).copied(), Some("1♖ ♘ ♗ ♕ ♔ ♗ ♘ ♖ "));
    }

    #[test]
    fn empty_board_is_all_dashes() {
        let drawn = draw(&Board::empty());
        assert_eq!(drawn.matches('-').count(), 64);
    }
}
