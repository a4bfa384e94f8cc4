//! The per-session turn loop.
//!
//! A [`SessionEngine`] owns one game. It is the only writer of its
//! [`SessionState`], and it runs as a single tokio task, so the state is
//! never shared. The engine alternates between two waits:
//!
//! - **Machine's turn**: race the move provider (bounded by the hard
//!   deadline) against the signal queue. A resignation wins immediately and
//!   the provider call is dropped; a move signal is answered `NotYourTurn`.
//! - **Human's turn**: suspend on the signal queue, one signal per
//!   iteration, in FIFO order. Malformed or illegal moves are rejected
//!   without consuming the turn.
//!
//! # Commit protocol
//!
//! Every change is an [`EventRecord`] folded into a copy of the state and
//! appended to the store. The append is the commit point: once it succeeds
//! the new state is adopted and published to the gateway, so a query never
//! observes a move the log does not hold. The snapshot is written after
//! that; if it fails the log is simply ahead of the snapshot, which
//! recovery folds forward, and the engine carries on.
//!
//! When the append itself is refused the session is failed in memory
//! (`StorageFailure`) and the engine halts; the durable log still ends at
//! the last good record.

use std::sync::Arc;
use std::time::Instant;

use tempo_rules::{RulesAdapter, RulesError};
use tempo_store::{SessionStore, StoreError};
use tempo_types::{
    Color, ColorSource, EventRecord, Method, ReplayError, SessionEvent, SessionId, SessionParams,
    SessionState, SessionView, Turn,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::gateway::{MoveAck, ResignAck, SessionHandle, Signal};
use crate::metrics::Metrics;
use crate::provider::{MoveProvider, ProviderError, suggest_within};

/// Errors that prevent an engine from starting.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The starting position or a recorded move was rejected by the rules.
    #[error("rules error: {0}")]
    Rules(#[from] RulesError),

    /// The `Created` record could not be persisted.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The stored records do not describe a valid session.
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),
}

/// The collaborators every engine needs, shared across sessions.
pub struct EngineContext<R: RulesAdapter> {
    /// Move validation and outcomes.
    pub rules: Arc<R>,
    /// Moves for the automated side.
    pub provider: Arc<dyn MoveProvider>,
    /// Event log and snapshots.
    pub store: Arc<dyn SessionStore>,
    /// Timing and queue sizing.
    pub config: EngineConfig,
    /// Session and provider metrics.
    pub metrics: Arc<Metrics>,
}

impl<R: RulesAdapter> Clone for EngineContext<R> {
    fn clone(&self) -> Self {
        Self {
            rules: Arc::clone(&self.rules),
            provider: Arc::clone(&self.provider),
            store: Arc::clone(&self.store),
            config: self.config,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Whether the loop keeps going after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Drives one session from creation (or resumption) to a terminal outcome.
pub struct SessionEngine<R: RulesAdapter> {
    ctx: EngineContext<R>,
    state: SessionState,
    position: R::Position,
    views: watch::Sender<SessionView>,
    signals: mpsc::Receiver<Signal>,
    shutdown: watch::Receiver<bool>,
}

impl<R: RulesAdapter> SessionEngine<R> {
    /// Create a brand-new session.
    ///
    /// Validates the starting position, resolves the human's color (the
    /// requested one, or a single fair coin flip), and commits the
    /// `Created` record before anything else reads the color. A starting
    /// position that is already over is concluded on the spot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Rules`] for an invalid FEN, or
    /// [`EngineError::Store`] if the `Created` record cannot be persisted.
    pub async fn initialize(
        ctx: EngineContext<R>,
        params: &SessionParams,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(Self, SessionHandle), EngineError> {
        let position = ctx.rules.new_game(params.fen.as_deref())?;

        let (color, color_source) = match params.color {
            Some(color) => (color, ColorSource::Explicit),
            None => (coin_flip(), ColorSource::Random),
        };
        let turn = Turn::for_side(ctx.rules.side_to_move(&position), color);

        let id = SessionId::new();
        let record = EventRecord::new(
            id,
            1,
            SessionEvent::Created {
                color,
                color_source,
                initial_fen: ctx.rules.fen(&position),
                turn,
            },
        );
        let state = SessionState::from_created(&record)?;
        ctx.store.append(&record).await?;
        ctx.store.save_snapshot(&state).await?;

        info!(
            session_id = %id,
            color = %color,
            color_source = ?color_source,
            turn = %turn,
            "Session created"
        );

        let (mut engine, handle) = Self::assemble(ctx, state, position, shutdown);
        engine.conclude_if_over().await;
        Ok((engine, handle))
    }

    /// Rebuild an engine for a session recovered from the store.
    ///
    /// The rules position is reconstructed by replaying the recorded moves
    /// from the initial position, so repetition history survives restarts.
    /// Terminal sessions get an engine that exits as soon as it runs.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Rules`] if the recorded moves no longer
    /// replay.
    pub async fn resume(
        ctx: EngineContext<R>,
        state: SessionState,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(Self, SessionHandle), EngineError> {
        let position = ctx.rules.replay(&state.initial_fen, &state.moves)?;

        info!(
            session_id = %state.id,
            version = state.version,
            phase = ?state.phase(),
            "Session resumed"
        );

        let (mut engine, handle) = Self::assemble(ctx, state, position, shutdown);
        engine.conclude_if_over().await;
        Ok((engine, handle))
    }

    fn assemble(
        ctx: EngineContext<R>,
        state: SessionState,
        position: R::Position,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, SessionHandle) {
        let view = render_view(ctx.rules.as_ref(), &state, &position);
        let (views, view_rx) = watch::channel(view);
        let (signal_tx, signals) = mpsc::channel(ctx.config.signal_queue_capacity.max(1));
        let handle = SessionHandle::new(state.id, signal_tx, view_rx);
        let engine = Self {
            ctx,
            state,
            position,
            views,
            signals,
            shutdown,
        };
        (engine, handle)
    }

    /// The session's identifier.
    pub const fn id(&self) -> SessionId {
        self.state.id
    }

    /// The engine's current state.
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run turns until the session is terminal, the engine halts, or a
    /// shutdown is requested.
    pub async fn run(mut self) {
        let metrics = Arc::clone(&self.ctx.metrics);
        let counted = !self.state.is_terminal();
        if counted {
            metrics.engine_started();
        }
        self.turns().await;
        if counted {
            metrics.engine_stopped();
        }
    }

    async fn turns(&mut self) {
        let id = self.state.id;
        loop {
            if self.state.is_terminal() {
                self.refuse_pending();
                info!(session_id = %id, outcome = ?self.state.verdict.outcome, "Session finished");
                return;
            }
            if *self.shutdown.borrow() {
                info!(session_id = %id, "Session suspended for shutdown");
                return;
            }

            let flow = match self.state.turn {
                Turn::Machine => self.machine_turn().await,
                Turn::Human => self.human_turn().await,
            };
            if flow == Flow::Stop && !self.state.is_terminal() {
                info!(session_id = %id, version = self.state.version, "Session engine stopped");
                return;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    async fn machine_turn(&mut self) -> Flow {
        let fen = self.state.fen.clone();
        let provider = Arc::clone(&self.ctx.provider);
        let metrics = Arc::clone(&self.ctx.metrics);
        let config = self.ctx.config;

        debug!(session_id = %self.state.id, provider = provider.name(), "Awaiting machine move");
        let suggestion = async move {
            let started = Instant::now();
            let result = suggest_within(
                provider.as_ref(),
                &fen,
                config.move_time(),
                config.provider_deadline(),
            )
            .await;
            metrics.observe_provider(started.elapsed().as_secs_f64());
            result
        };
        tokio::pin!(suggestion);

        loop {
            tokio::select! {
                result = &mut suggestion => return self.play_machine_move(result).await,
                signal = self.signals.recv() => match signal {
                    Some(Signal::Resign { reply }) => {
                        let (ack, flow) = self.resign().await;
                        if let Some(ack) = ack {
                            let _ = reply.send(ack);
                        }
                        return flow;
                    }
                    Some(Signal::Move { reply, .. }) => {
                        let _ = reply.send(MoveAck::NotYourTurn);
                    }
                    None => return Flow::Stop,
                },
                () = shutdown_requested(&mut self.shutdown) => return Flow::Stop,
            }
        }
    }

    async fn play_machine_move(&mut self, result: Result<String, ProviderError>) -> Flow {
        let suggested = match result {
            Ok(uci) => uci,
            Err(e) => {
                warn!(session_id = %self.state.id, error = %e, "Move provider failed");
                return self.fail(Method::ProviderFailure, e.to_string()).await;
            }
        };

        let applied = self
            .ctx
            .rules
            .normalize_move(&suggested)
            .and_then(|uci| Ok((self.ctx.rules.apply_move(&self.position, &uci)?, uci)));
        match applied {
            Ok((next, uci)) => {
                if self.commit_move(Turn::Machine, uci, next).await {
                    Flow::Continue
                } else {
                    Flow::Stop
                }
            }
            Err(e) => {
                warn!(
                    session_id = %self.state.id,
                    suggested = %suggested,
                    error = %e,
                    "Move provider suggested an unplayable move"
                );
                self.fail(
                    Method::ProviderFailure,
                    format!("provider suggested {suggested:?}: {e}"),
                )
                .await
            }
        }
    }

    async fn human_turn(&mut self) -> Flow {
        tokio::select! {
            signal = self.signals.recv() => match signal {
                Some(Signal::Move { text, reply }) => {
                    let (ack, flow) = self.human_move(&text).await;
                    if let Some(ack) = ack {
                        let _ = reply.send(ack);
                    }
                    flow
                }
                Some(Signal::Resign { reply }) => {
                    let (ack, flow) = self.resign().await;
                    if let Some(ack) = ack {
                        let _ = reply.send(ack);
                    }
                    flow
                }
                None => Flow::Stop,
            },
            () = shutdown_requested(&mut self.shutdown) => Flow::Stop,
        }
    }

    /// Returns `None` for the ack when the commit failed; the dropped reply
    /// surfaces to the caller as an unavailable engine.
    async fn human_move(&mut self, text: &str) -> (Option<MoveAck>, Flow) {
        let applied = self
            .ctx
            .rules
            .normalize_move(text)
            .and_then(|uci| Ok((self.ctx.rules.apply_move(&self.position, &uci)?, uci)));

        match applied {
            Ok((next, uci)) => {
                if self.commit_move(Turn::Human, uci.clone(), next).await {
                    (Some(MoveAck::Accepted { uci }), Flow::Continue)
                } else {
                    (None, Flow::Stop)
                }
            }
            Err(e) => {
                debug!(session_id = %self.state.id, text, error = %e, "Rejected human move");
                (Some(MoveAck::Rejected(e)), Flow::Continue)
            }
        }
    }

    async fn resign(&mut self) -> (Option<ResignAck>, Flow) {
        let side = self.state.color;
        let verdict = self.ctx.rules.resign(&self.position, side);
        if self.commit(SessionEvent::Resigned { side }).await {
            info!(session_id = %self.state.id, side = %side, result = %verdict.result, "Human resigned");
            (Some(ResignAck::Resigned), Flow::Continue)
        } else {
            (None, Flow::Stop)
        }
    }

    /// Answer signals that raced the final commit.
    fn refuse_pending(&mut self) {
        self.signals.close();
        while let Ok(signal) = self.signals.try_recv() {
            match signal {
                Signal::Move { reply, .. } => {
                    let _ = reply.send(MoveAck::AlreadyFinished);
                }
                Signal::Resign { reply } => {
                    let _ = reply.send(ResignAck::AlreadyFinished);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    async fn commit_move(&mut self, by: Turn, uci: String, next: R::Position) -> bool {
        let event = SessionEvent::MoveApplied {
            by,
            uci: uci.clone(),
            fen_after: self.ctx.rules.fen(&next),
        };
        let previous = std::mem::replace(&mut self.position, next);
        if !self.commit(event).await {
            self.position = previous;
            self.publish();
            return false;
        }
        self.ctx.metrics.move_played(by);
        info!(session_id = %self.state.id, by = %by, uci = %uci, "Move applied");
        self.conclude_if_over().await;
        true
    }

    async fn conclude_if_over(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let verdict = self.ctx.rules.verdict(&self.position);
        if verdict.is_terminal() && self.commit(SessionEvent::Concluded { verdict }).await {
            info!(
                session_id = %self.state.id,
                outcome = ?verdict.outcome,
                method = ?verdict.method,
                result = %verdict.result,
                "Session concluded"
            );
        }
    }

    async fn fail(&mut self, method: Method, reason: String) -> Flow {
        let event = SessionState::failure_event(method, reason);
        if self.commit(event).await {
            warn!(session_id = %self.state.id, method = ?method, "Session failed");
        }
        Flow::Stop
    }

    /// Fold, append, adopt, publish, snapshot. Returns `false` (after
    /// failing the session in memory) if the event does not fold or the
    /// append is refused. A refused snapshot is only logged.
    async fn commit(&mut self, event: SessionEvent) -> bool {
        let record = EventRecord::new(self.state.id, self.state.version.saturating_add(1), event);
        let mut next = self.state.clone();
        if let Err(e) = next.apply(&record) {
            error!(session_id = %self.state.id, error = %e, "Refusing inconsistent event");
            self.fail_in_memory(Method::StorageFailure, e.to_string());
            return false;
        }

        if let Err(e) = self.ctx.store.append(&record).await {
            error!(
                session_id = %self.state.id,
                seq = record.seq,
                kind = record.event.kind(),
                error = %e,
                "Failed to append event"
            );
            self.fail_in_memory(Method::StorageFailure, e.to_string());
            return false;
        }

        self.adopt(next);

        if let Err(e) = self.ctx.store.save_snapshot(&self.state).await {
            warn!(
                session_id = %self.state.id,
                version = self.state.version,
                error = %e,
                "Failed to save snapshot; log is ahead of it"
            );
        }
        true
    }

    /// Replace the live state and publish it.
    fn adopt(&mut self, next: SessionState) {
        let finished = !self.state.is_terminal() && next.is_terminal();
        self.state = next;
        if finished {
            self.ctx.metrics.game_completed(self.state.verdict.outcome);
        }
        self.publish();
    }

    /// Mark the session failed without writing anything.
    fn fail_in_memory(&mut self, method: Method, reason: String) {
        let record = EventRecord::new(
            self.state.id,
            self.state.version.saturating_add(1),
            SessionState::failure_event(method, reason),
        );
        let mut next = self.state.clone();
        match next.apply(&record) {
            Ok(()) => self.adopt(next),
            Err(e) => {
                error!(session_id = %self.state.id, error = %e, "Could not mark session failed");
                self.publish();
            }
        }
    }

    fn publish(&self) {
        let view = render_view(self.ctx.rules.as_ref(), &self.state, &self.position);
        self.views.send_replace(view);
    }
}

fn render_view<R: RulesAdapter>(
    rules: &R,
    state: &SessionState,
    position: &R::Position,
) -> SessionView {
    let human_to_move = state.turn == Turn::Human && !state.is_terminal();
    let legal = if human_to_move {
        rules.legal_moves(position)
    } else {
        Vec::new()
    };
    SessionView::from_state(state, state.phase(), rules.render(position), legal)
}

/// Resolves once shutdown is requested. Never resolves if the directory
/// dropped its sender without asking.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn coin_flip() -> Color {
    use rand::Rng;

    if rand::rng().random_bool(0.5) {
        Color::White
    } else {
        Color::Black
    }
}
