//! REST endpoint handlers for the session API.
//!
//! Handlers translate HTTP requests into directory calls, gateway signals,
//! and queries. They never hold session state of their own.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `POST` | `/api/games` | Create a session |
//! | `GET` | `/api/games` | List session ids (`?status=active\|all`) |
//! | `GET` | `/api/games/{id}` | Query one session's view |
//! | `POST` | `/api/games/{id}/move/{move}` | Submit the human's move |
//! | `POST` | `/api/games/{id}/resign` | Resign on the human's behalf |
//! | `GET` | `/metrics` | Prometheus text exposition |

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::Json;
use tempo_core::directory::params_from_request;
use tempo_core::{ListFilter, MoveAck, ResignAck, SessionHandle};
use tempo_types::{CreateGameRequest, CreatedGame, SessionId, SessionView, SignalResponse};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/games` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct GamesQuery {
    /// `active` (default) or `all`.
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing session counts and API routes.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let active = state.directory.list(ListFilter::Active).await.len();
    let total = state.directory.len().await;
    let finished = total.saturating_sub(active);

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Tempo</title>
    <style>
        body {{
            background: #101418;
            color: #d0d7de;
            font-family: 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 760px;
            margin: 0 auto;
        }}
        h1 {{ color: #e3b341; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .count {{
            display: inline-block;
            border: 1px solid #30363d;
            border-radius: 4px;
            padding: 0.75rem 1.25rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
        }}
        .count .label {{ color: #8b949e; font-size: 0.8rem; }}
        .count .value {{ color: #e3b341; font-size: 1.4rem; }}
        code {{ color: #7ee787; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.25rem 0; }}
    </style>
</head>
<body>
    <h1>Tempo</h1>
    <p class="subtitle">Durable game sessions</p>

    <div>
        <div class="count"><div class="label">Active</div><div class="value">{active}</div></div>
        <div class="count"><div class="label">Finished</div><div class="value">{finished}</div></div>
        <div class="count"><div class="label">Total</div><div class="value">{total}</div></div>
    </div>

    <h3>Routes</h3>
    <ul>
        <li><code>POST /api/games</code> {{"color"?, "fen"?}}</li>
        <li><code>GET  /api/games?status=active|all</code></li>
        <li><code>GET  /api/games/{{id}}</code></li>
        <li><code>POST /api/games/{{id}}/move/{{move}}</code></li>
        <li><code>POST /api/games/{{id}}/resign</code></li>
        <li><code>GET  /ws/games/{{id}}</code></li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// POST /api/games
// ---------------------------------------------------------------------------

/// Create a session. An empty body means a random color and the standard
/// starting position.
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedGame>), ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateGameRequest::default()
    } else {
        serde_json::from_slice::<CreateGameRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
    };

    let params = params_from_request(request.color.as_deref(), request.fen)?;
    let id = state.directory.create(params).await?;

    tracing::info!(session_id = %id, "Game created via API");
    Ok((StatusCode::CREATED, Json(CreatedGame { id })))
}

// ---------------------------------------------------------------------------
// GET /api/games
// ---------------------------------------------------------------------------

/// List session ids, in creation order.
pub async fn list_games(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GamesQuery>,
) -> Result<Json<Vec<SessionId>>, ApiError> {
    let filter = match params.status.as_deref() {
        None | Some("active") => ListFilter::Active,
        Some("all") => ListFilter::All,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "invalid status filter {other:?}: expected active or all"
            )));
        }
    };
    Ok(Json(state.directory.list(filter).await))
}

// ---------------------------------------------------------------------------
// GET /api/games/{id}
// ---------------------------------------------------------------------------

/// Return the latest committed view of a session.
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = lookup(&state, &id).await?;
    Ok(Json(handle.query()))
}

// ---------------------------------------------------------------------------
// POST /api/games/{id}/move/{move}
// ---------------------------------------------------------------------------

/// Submit the human's move and wait until it is committed or rejected.
pub async fn make_move(
    State(state): State<Arc<AppState>>,
    Path((id, mv)): Path<(String, String)>,
) -> Result<Json<SignalResponse>, ApiError> {
    let handle = lookup(&state, &id).await?;

    match handle.signal_move(&mv).await? {
        MoveAck::Accepted { uci } => Ok(Json(SignalResponse::moved(uci))),
        MoveAck::AlreadyFinished => Ok(Json(SignalResponse::ignored())),
        MoveAck::NotYourTurn => Err(ApiError::Conflict(format!(
            "game {} is waiting for the automated player",
            handle.id()
        ))),
        MoveAck::Rejected(e) if e.is_validation() => Err(ApiError::BadRequest(e.to_string())),
        MoveAck::Rejected(e) => Err(ApiError::IllegalMove(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// POST /api/games/{id}/resign
// ---------------------------------------------------------------------------

/// Resign on the human's behalf.
pub async fn resign_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SignalResponse>, ApiError> {
    let handle = lookup(&state, &id).await?;

    match handle.signal_resign().await? {
        ResignAck::Resigned => Ok(Json(SignalResponse::applied())),
        ResignAck::AlreadyFinished => Ok(Json(SignalResponse::ignored())),
    }
}

// ---------------------------------------------------------------------------
// GET /metrics
// ---------------------------------------------------------------------------

/// Render the directory's metrics in the Prometheus text format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .directory
        .metrics()
        .encode()
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {e}")))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a session id from a path segment.
pub(crate) fn parse_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse::<SessionId>()
        .map_err(|e| ApiError::BadRequest(format!("invalid game id {raw:?}: {e}")))
}

/// Resolve a path segment to a running session's handle.
pub(crate) async fn lookup(state: &AppState, raw: &str) -> Result<SessionHandle, ApiError> {
    let id = parse_id(raw)?;
    Ok(state.directory.lookup(id).await?)
}
