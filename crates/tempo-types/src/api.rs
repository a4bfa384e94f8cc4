//! Request and response bodies of the session API.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::SessionId;

/// Body of `POST /api/games`. Both fields are optional; an empty body is
/// a random-color game from the standard position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CreateGameRequest {
    /// `"white"`, `"black"`, `"w"`, or `"b"`; blank or absent for random.
    #[serde(default)]
    pub color: Option<String>,
    /// Starting position in FEN; blank or absent for the standard start.
    #[serde(default)]
    pub fen: Option<String>,
}

/// Response to a successful creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CreatedGame {
    /// The new session's identifier.
    pub id: SessionId,
}

/// Response to a move or resignation signal.
///
/// `applied` is `false` when the session had already finished and the
/// signal was ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SignalResponse {
    /// Always `true` on a 2xx response.
    pub ok: bool,
    /// Whether the signal changed the session.
    pub applied: bool,
    /// The move as recorded, for accepted moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uci: Option<String>,
}

impl SignalResponse {
    /// An accepted move.
    pub fn moved(uci: impl Into<String>) -> Self {
        Self {
            ok: true,
            applied: true,
            uci: Some(uci.into()),
        }
    }

    /// A signal that changed the session without a move.
    pub const fn applied() -> Self {
        Self {
            ok: true,
            applied: true,
            uci: None,
        }
    }

    /// A signal ignored because the session is over.
    pub const fn ignored() -> Self {
        Self {
            ok: true,
            applied: false,
            uci: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_body_is_all_defaults() {
        let req: CreateGameRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, CreateGameRequest::default());
    }

    #[test]
    fn uci_is_omitted_when_absent() {
        let json = serde_json::to_value(SignalResponse::ignored()).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": true, "applied": false }));
    }
}
