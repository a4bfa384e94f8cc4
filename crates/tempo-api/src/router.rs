//! Axum router construction for the session API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for the browser client.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `POST /api/games` -- create a session
/// - `GET /api/games` -- list session ids
/// - `GET /api/games/{id}` -- query a session
/// - `POST /api/games/{id}/move/{move}` -- submit the human's move
/// - `POST /api/games/{id}/resign` -- resign
/// - `GET /ws/games/{id}` -- `WebSocket` view stream
/// - `GET /metrics` -- Prometheus metrics
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws/games/{id}", get(ws::ws_game))
        .route(
            "/api/games",
            get(handlers::list_games).post(handlers::create_game),
        )
        .route("/api/games/{id}", get(handlers::get_game))
        .route("/api/games/{id}/move/{move}", post(handlers::make_move))
        .route("/api/games/{id}/resign", post(handlers::resign_game))
        .route("/metrics", get(handlers::metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
