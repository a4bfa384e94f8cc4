//! `WebSocket` handler for live session views.
//!
//! Clients connect to `GET /ws/games/{id}` and receive the current
//! [`SessionView`](tempo_types::SessionView) as a JSON text frame, then one
//! frame per committed change. The stream follows the session's `watch`
//! channel, so a slow client skips intermediate views and always catches up
//! on the latest one.
//!
//! When the session's engine stops (the game ended or the server is
//! shutting down) the final view has already been sent and the socket is
//! closed.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tempo_types::SessionView;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::handlers::lookup;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection streaming one
/// session's views.
///
/// Unknown or malformed ids are rejected before the upgrade.
///
/// # Route
///
/// `GET /ws/games/{id}`
pub async fn ws_game(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = lookup(&state, &id).await?;
    let rx = handle.subscribe();
    Ok(ws.on_upgrade(move |socket| stream_views(socket, rx)))
}

async fn stream_views(mut socket: WebSocket, mut rx: watch::Receiver<SessionView>) {
    let initial = rx.borrow_and_update().clone();
    let session_id = initial.id;
    debug!(session_id = %session_id, "WebSocket client connected");

    if !send_view(&mut socket, &initial).await {
        return;
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!(session_id = %session_id, "Session engine stopped, closing WebSocket");
                    let _ = socket.send(Message::Close(None)).await;
                    return;
                }
                let view = rx.borrow_and_update().clone();
                if !send_view(&mut socket, &view).await {
                    return;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session_id = %session_id, "WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(session_id = %session_id, "WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(session_id = %session_id, "WebSocket error: {e}");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Send one view as a text frame. Returns `false` once the client is gone.
async fn send_view(socket: &mut WebSocket, view: &SessionView) -> bool {
    let json = match serde_json::to_string(view) {
        Ok(j) => j,
        Err(e) => {
            warn!(session_id = %view.id, "Failed to serialize session view: {e}");
            return true;
        }
    };
    if socket.send(Message::Text(json.into())).await.is_err() {
        debug!(session_id = %view.id, "WebSocket client disconnected (send failed)");
        return false;
    }
    true
}
