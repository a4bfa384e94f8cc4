//! Error types for the session API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body has the same shape: `{ "error": "...", "status": 404 }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tempo_core::{DirectoryError, GatewayError};

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested session does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed: bad id, body, color, FEN, or move text.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The move is well-formed but not legal in the current position.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// It is not the human's turn.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The session's engine is not running.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::IllegalMove(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(id) => Self::NotFound(format!("game {id}")),
            DirectoryError::InvalidColor(e) => Self::BadRequest(e.to_string()),
            DirectoryError::Validation(e) => Self::BadRequest(e.to_string()),
            other @ (DirectoryError::Store(_) | DirectoryError::Engine(_)) => {
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::IllegalMove(msg)
            | Self::Conflict(msg)
            | Self::Unavailable(msg)
            | Self::Internal(msg) => msg,
        };

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "Request failed");
        }

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
