//! Process-wide registry of sessions.
//!
//! The [`SessionDirectory`] creates sessions, hands out [`SessionHandle`]s,
//! lists what exists, rebuilds everything from the store at startup, and
//! stops every engine at shutdown. The id-to-handle map sits behind a
//! `tokio::sync::RwLock`: lookups and listings share the read lock, and the
//! write lock is only taken to insert.

use std::collections::BTreeMap;
use std::sync::Arc;

use tempo_rules::{ChessRules, RulesAdapter, RulesError};
use tempo_store::StoreError;
use tempo_types::{Color, ParseColorError, SessionId, SessionParams};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::engine::{EngineContext, EngineError, SessionEngine};
use crate::gateway::SessionHandle;
use crate::metrics::Metrics;

/// Errors returned by directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// No session has this id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The requested color is not recognised.
    #[error(transparent)]
    InvalidColor(#[from] ParseColorError),

    /// The starting position was rejected.
    #[error("invalid session parameters: {0}")]
    Validation(RulesError),

    /// Storage failed while creating or recovering sessions.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An engine could not be started.
    #[error("engine error: {0}")]
    Engine(EngineError),
}

impl From<EngineError> for DirectoryError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Rules(e) if e.is_validation() => Self::Validation(e),
            EngineError::Store(e) => Self::Store(e),
            other => Self::Engine(other),
        }
    }
}

/// Which sessions [`SessionDirectory::list`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFilter {
    /// Sessions still in progress.
    #[default]
    Active,
    /// Every known session.
    All,
}

/// Build creation parameters from loosely-typed request fields.
///
/// A missing or blank color means a random pick; a blank FEN means the
/// standard starting position.
///
/// # Errors
///
/// Returns [`DirectoryError::InvalidColor`] for an unrecognised color.
pub fn params_from_request(
    color: Option<&str>,
    fen: Option<String>,
) -> Result<SessionParams, DirectoryError> {
    let color = match color.map(str::trim).filter(|c| !c.is_empty()) {
        Some(text) => Some(text.parse::<Color>()?),
        None => None,
    };
    let fen = fen.filter(|f| !f.trim().is_empty());
    Ok(SessionParams { color, fen })
}

/// Owns every session engine in the process.
pub struct SessionDirectory<R: RulesAdapter = ChessRules> {
    ctx: EngineContext<R>,
    sessions: RwLock<BTreeMap<SessionId, SessionHandle>>,
    tasks: Mutex<JoinSet<()>>,
    shutdown: watch::Sender<bool>,
}

impl<R: RulesAdapter> SessionDirectory<R> {
    /// Create an empty directory whose engines share `ctx`.
    pub fn new(ctx: EngineContext<R>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            ctx,
            sessions: RwLock::new(BTreeMap::new()),
            tasks: Mutex::new(JoinSet::new()),
            shutdown,
        }
    }

    /// Create and start a new session, returning its id once the `Created`
    /// record is durable. The first turn runs in the background.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Validation`] for a bad starting position,
    /// or [`DirectoryError::Store`] if the session cannot be persisted.
    pub async fn create(&self, params: SessionParams) -> Result<SessionId, DirectoryError> {
        let (engine, handle) =
            SessionEngine::initialize(self.ctx.clone(), &params, self.shutdown.subscribe()).await?;
        let id = handle.id();
        self.ctx.metrics.game_created();
        self.register(engine, handle).await;
        Ok(id)
    }

    /// Point-in-time list of session ids, ordered by id (creation order).
    pub async fn list(&self, filter: ListFilter) -> Vec<SessionId> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(_, handle)| match filter {
                ListFilter::All => true,
                ListFilter::Active => !handle.query().outcome.is_terminal(),
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// The handle for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::NotFound`] if the id is unknown.
    pub async fn lookup(&self, id: SessionId) -> Result<SessionHandle, DirectoryError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::NotFound(id))
    }

    /// Rebuild every stored session. Sessions that fail to load are logged
    /// and skipped. Returns how many were recovered.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Store`] if the store cannot be listed.
    pub async fn recover(&self) -> Result<usize, DirectoryError> {
        let ids = self.ctx.store.list().await?;
        let mut recovered: usize = 0;

        for id in ids {
            if self.sessions.read().await.contains_key(&id) {
                continue;
            }
            let state = match tempo_store::recover(self.ctx.store.as_ref(), id).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Skipping unrecoverable session");
                    continue;
                }
            };
            match SessionEngine::resume(self.ctx.clone(), state, self.shutdown.subscribe()).await {
                Ok((engine, handle)) => {
                    self.register(engine, handle).await;
                    recovered = recovered.saturating_add(1);
                }
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Skipping session that no longer replays");
                }
            }
        }

        info!(recovered, "Recovered sessions from store");
        Ok(recovered)
    }

    /// Ask every engine to stop and wait for them. Handles keep answering
    /// queries afterwards; signals report the session unavailable.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let mut tasks = self.tasks.lock().await;
        let mut stopped: usize = 0;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Session task ended abnormally");
            }
            stopped = stopped.saturating_add(1);
        }
        info!(stopped, "All session engines stopped");
    }

    /// The metrics shared by every engine in this directory.
    pub fn metrics(&self) -> &Metrics {
        &self.ctx.metrics
    }

    /// Number of known sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is known.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn register(&self, engine: SessionEngine<R>, handle: SessionHandle) {
        let id = handle.id();
        self.sessions.write().await.insert(id, handle);
        let mut tasks = self.tasks.lock().await;
        // Reap engines that already finished.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(engine.run());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tempo_store::{FileStore, MemoryStore, SessionStore};
    use tempo_types::{Outcome, SessionView, Turn};

    use super::*;
    use crate::config::EngineConfig;
    use crate::gateway::{GatewayError, MoveAck, ResignAck};
    use crate::provider::testing::ScriptedProvider;
    use crate::provider::{MoveProvider, RandomMoveProvider};

    fn directory(
        provider: Arc<dyn MoveProvider>,
        store: Arc<dyn SessionStore>,
    ) -> SessionDirectory {
        SessionDirectory::new(EngineContext {
            rules: Arc::new(ChessRules::new()),
            provider,
            store,
            config: EngineConfig::default(),
            metrics: Arc::new(Metrics::new().unwrap()),
        })
    }

    fn white() -> SessionParams {
        SessionParams {
            color: Some(Color::White),
            fen: None,
        }
    }

    async fn wait_until(handle: &SessionHandle, done: impl Fn(&SessionView) -> bool) -> SessionView {
        let mut rx = handle.subscribe();
        let view = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| done(v)))
            .await
            .unwrap()
            .unwrap()
            .clone();
        view
    }

    #[test]
    fn request_params_are_parsed() {
        let params = params_from_request(Some(" B "), Some(String::from("  "))).unwrap();
        assert_eq!(params.color, Some(Color::Black));
        assert_eq!(params.fen, None);

        assert_eq!(params_from_request(None, None).unwrap(), SessionParams::default());
        assert_eq!(params_from_request(Some(""), None).unwrap().color, None);

        let err = params_from_request(Some("purple"), None).unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidColor(_)));
    }

    #[tokio::test]
    async fn create_then_lookup_and_list() {
        let dir = directory(Arc::new(ScriptedProvider::new(&[])), Arc::new(MemoryStore::new()));
        let first = dir.create(white()).await.unwrap();
        let second = dir.create(white()).await.unwrap();

        let handle = dir.lookup(first).await.unwrap();
        assert_eq!(handle.id(), first);
        assert_eq!(handle.query().turn, Turn::Human);

        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(dir.list(ListFilter::Active).await, expected);
        assert_eq!(dir.len().await, 2);

        let text = dir.metrics().encode().unwrap();
        assert!(text.contains("tempo_games_created_total 2"));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let dir = directory(Arc::new(ScriptedProvider::new(&[])), Arc::new(MemoryStore::new()));
        let missing = SessionId::new();
        assert!(matches!(
            dir.lookup(missing).await,
            Err(DirectoryError::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn bad_fen_is_a_validation_error() {
        let dir = directory(Arc::new(ScriptedProvider::new(&[])), Arc::new(MemoryStore::new()));
        let params = SessionParams {
            color: None,
            fen: Some(String::from("8/8/8/8")),
        };
        assert!(matches!(
            dir.create(params).await,
            Err(DirectoryError::Validation(_))
        ));
        assert!(dir.is_empty().await);
        assert!(dir.metrics().encode().unwrap().contains("tempo_games_created_total 0"));
    }

    #[tokio::test]
    async fn finished_sessions_leave_the_active_list() {
        let dir = directory(Arc::new(ScriptedProvider::new(&[])), Arc::new(MemoryStore::new()));
        let open = dir.create(white()).await.unwrap();
        let resigned = dir.create(white()).await.unwrap();

        let handle = dir.lookup(resigned).await.unwrap();
        assert_eq!(handle.signal_resign().await.unwrap(), ResignAck::Resigned);

        assert_eq!(dir.list(ListFilter::Active).await, vec![open]);
        assert_eq!(dir.list(ListFilter::All).await.len(), 2);
        assert_eq!(
            dir.lookup(resigned).await.unwrap().query().outcome,
            Outcome::Resignation
        );
    }

    #[tokio::test]
    async fn sessions_survive_a_restart() {
        let data = tempfile::tempdir().unwrap();
        let rules = Arc::new(ChessRules::new());

        let (active, finished) = {
            let store: Arc<dyn SessionStore> = Arc::new(FileStore::open(data.path()).await.unwrap());
            let dir = directory(Arc::new(ScriptedProvider::new(&["e7e5"])), store);
            let active = dir.create(white()).await.unwrap();
            let finished = dir.create(white()).await.unwrap();

            let handle = dir.lookup(active).await.unwrap();
            handle.signal_move("e2e4").await.unwrap();
            wait_until(&handle, |v| v.moves.len() == 2).await;
            dir.lookup(finished).await.unwrap().signal_resign().await.unwrap();

            dir.shutdown().await;
            assert!(matches!(
                handle.signal_move("g1f3").await,
                Err(GatewayError::Unavailable { .. })
            ));
            (active, finished)
        };

        let store: Arc<dyn SessionStore> = Arc::new(FileStore::open(data.path()).await.unwrap());
        let dir = directory(Arc::new(RandomMoveProvider::new(rules)), store);
        assert_eq!(dir.recover().await.unwrap(), 2);
        assert_eq!(dir.list(ListFilter::Active).await, vec![active]);

        let done = dir.lookup(finished).await.unwrap();
        assert_eq!(done.query().outcome, Outcome::Resignation);
        assert_eq!(done.signal_move("e2e4").await.unwrap(), MoveAck::AlreadyFinished);

        let handle = dir.lookup(active).await.unwrap();
        let view = handle.query();
        assert_eq!(view.moves, vec![String::from("e2e4"), String::from("e7e5")]);
        assert_eq!(view.color, Color::White);
        assert!(matches!(
            handle.signal_move("g1f3").await.unwrap(),
            MoveAck::Accepted { .. }
        ));
        let view = wait_until(&handle, |v| v.moves.len() == 4).await;
        assert_eq!(view.turn, Turn::Human);

        dir.shutdown().await;
    }
}
