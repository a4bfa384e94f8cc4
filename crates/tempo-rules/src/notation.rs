//! Syntactic validation of UCI move text.
//!
//! Checking the shape of a move before consulting the position lets the
//! adapter tell a malformed request (`"hello"`) apart from a well-formed
//! move that the rules forbid (`"e2e5"`).

use crate::RulesError;

/// Normalise and validate UCI move text.
///
/// Accepts `<from><to>[promotion]` where squares are `a`-`h` + `1`-`8` and
/// the optional promotion piece is one of `q`, `r`, `b`, `n`. Surrounding
/// whitespace is trimmed and letters are lowercased.
///
/// # Errors
///
/// Returns [`RulesError::MalformedMove`] if the text does not match.
pub fn parse_uci(text: &str) -> Result<String, RulesError> {
    let normalized = text.trim().to_ascii_lowercase();
    let bytes = normalized.as_bytes();

    let well_formed = match bytes {
        [f1, r1, f2, r2] => is_square(*f1, *r1) && is_square(*f2, *r2),
        [f1, r1, f2, r2, promo] => {
            is_square(*f1, *r1) && is_square(*f2, *r2) && matches!(promo, b'q' | b'r' | b'b' | b'n')
        }
        _ => false,
    };

    if well_formed {
        Ok(normalized)
    } else {
        Err(RulesError::MalformedMove {
            text: text.to_owned(),
        })
    }
}

const fn is_square(file: u8, rank: u8) -> bool {
    matches!(file, b'a'..=b'h') && matches!(rank, b'1'..=b'8')
}
