//! End-to-end tests for the `WebSocket` view stream.
//!
//! These bind a real listener on an ephemeral port and connect with a
//! `WebSocket` client, so the upgrade, framing, and close handshake are all
//! exercised. The automated player never answers.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tempo_api::{AppState, spawn_api};
use tempo_core::config::{EngineConfig, ServerConfig};
use tempo_core::{EngineContext, Metrics, MoveProvider, ProviderError, SessionDirectory};
use tempo_rules::ChessRules;
use tempo_store::MemoryStore;
use tempo_types::{Color, Method, Outcome, SessionParams, SessionView, Turn};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::{self, Message};

/// A provider that thinks forever.
struct StalledProvider;

#[async_trait]
impl MoveProvider for StalledProvider {
    async fn suggest(&self, _fen: &str, _budget: Duration) -> Result<String, ProviderError> {
        std::future::pending().await
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}

/// A directory served on `127.0.0.1:0`, stopped by dropping or firing `stop`.
struct TestServer {
    directory: Arc<SessionDirectory>,
    url: String,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

async fn start() -> TestServer {
    let directory = Arc::new(SessionDirectory::new(EngineContext {
        rules: Arc::new(ChessRules::new()),
        provider: Arc::new(StalledProvider),
        store: Arc::new(MemoryStore::new()),
        config: EngineConfig {
            move_time_ms: 10,
            provider_deadline_ms: 600_000,
            signal_queue_capacity: 8,
        },
        metrics: Arc::new(Metrics::new().unwrap()),
    }));
    let state = Arc::new(AppState::new(Arc::clone(&directory)));
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    let (stop, stopped) = oneshot::channel::<()>();
    let (task, addr) = spawn_api(&config, state, async {
        let _ = stopped.await;
    })
    .await
    .unwrap();

    TestServer {
        directory,
        url: format!("ws://{addr}"),
        stop,
        task,
    }
}

/// Wait for the next text frame and decode it as a view.
async fn next_view<S>(socket: &mut S) -> SessionView
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn stream_follows_moves_and_closes_after_resignation() {
    let server = start().await;
    let id = server
        .directory
        .create(SessionParams {
            color: Some(Color::White),
            fen: None,
        })
        .await
        .unwrap();

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("{}/ws/games/{id}", server.url))
        .await
        .unwrap();

    let initial = next_view(&mut socket).await;
    assert_eq!(initial.id, id);
    assert_eq!(initial.version, 1);
    assert_eq!(initial.turn, Turn::Human);
    assert!(initial.moves.is_empty());
    assert_eq!(initial.valid_moves.len(), 20);

    let handle = server.directory.lookup(id).await.unwrap();
    handle.signal_move("e2e4").await.unwrap();

    let moved = next_view(&mut socket).await;
    assert_eq!(moved.version, 2);
    assert_eq!(moved.moves, vec![String::from("e2e4")]);
    assert_eq!(moved.turn, Turn::Machine);

    handle.signal_resign().await.unwrap();

    let resigned = next_view(&mut socket).await;
    assert_eq!(resigned.outcome, Outcome::Resignation);
    assert_eq!(resigned.method, Method::Resignation);

    // The engine is finished, so the server closes the stream.
    let end = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap();
    assert!(
        matches!(end, None | Some(Ok(Message::Close(_)))),
        "expected close, got {end:?}"
    );

    server.stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .unwrap()
        .unwrap();
    server.directory.shutdown().await;
}

#[tokio::test]
async fn unknown_game_is_refused_before_the_upgrade() {
    let server = start().await;
    let missing = tempo_types::SessionId::new();

    let err = tokio_tungstenite::connect_async(format!("{}/ws/games/{missing}", server.url))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, tungstenite::Error::Http(response) if response.status() == 404),
        "expected 404, got {err:?}"
    );

    server.stop.send(()).unwrap();
}
