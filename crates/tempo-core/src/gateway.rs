//! Signal and query boundary of one session.
//!
//! A [`SessionHandle`] is the only way callers reach a running session.
//! Queries read the last committed [`SessionView`] from a `watch` channel
//! and never wait on the engine. Signals travel through the session's
//! single bounded `mpsc` queue and are answered over a `oneshot` channel
//! once the engine has processed them, in the order they were accepted.
//!
//! ```text
//! caller --signal_move/signal_resign--> [mpsc queue] --> SessionEngine
//!    ^                                                       |
//!    +------------- query / subscribe <--- [watch view] <----+
//! ```

use tempo_rules::RulesError;
use tempo_types::{SessionId, SessionView, Turn};
use tokio::sync::{mpsc, oneshot, watch};

/// Answer to a move signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveAck {
    /// The move was applied and committed.
    Accepted {
        /// The move as recorded.
        uci: String,
    },
    /// The move was malformed or illegal; the turn was not consumed.
    Rejected(RulesError),
    /// It is the automated side's turn.
    NotYourTurn,
    /// The session already has a terminal outcome.
    AlreadyFinished,
}

/// Answer to a resignation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResignAck {
    /// The resignation was committed.
    Resigned,
    /// The session already has a terminal outcome.
    AlreadyFinished,
}

/// Errors reaching a session's engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The engine task is gone (shut down or halted) and cannot answer.
    #[error("session {session_id} is unavailable")]
    Unavailable {
        /// The session.
        session_id: SessionId,
    },
}

/// A request queued for the engine.
#[derive(Debug)]
pub enum Signal {
    /// The human submits a move.
    Move {
        /// Move text as submitted.
        text: String,
        /// Where the engine sends its answer.
        reply: oneshot::Sender<MoveAck>,
    },
    /// The human resigns.
    Resign {
        /// Where the engine sends its answer.
        reply: oneshot::Sender<ResignAck>,
    },
}

/// Cloneable handle to one session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    signals: mpsc::Sender<Signal>,
    views: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Wrap the two ends the engine listens and publishes on.
    pub const fn new(
        id: SessionId,
        signals: mpsc::Sender<Signal>,
        views: watch::Receiver<SessionView>,
    ) -> Self {
        Self { id, signals, views }
    }

    /// The session's identifier.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The most recently committed view.
    pub fn query(&self) -> SessionView {
        self.views.borrow().clone()
    }

    /// A receiver that observes every newly committed view.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.views.clone()
    }

    /// Submit a move on the human's behalf and wait for the verdict.
    ///
    /// Terminal sessions and the automated side's turn are answered
    /// immediately without touching the queue.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the engine is not running.
    pub async fn signal_move(&self, text: &str) -> Result<MoveAck, GatewayError> {
        let view = self.query();
        if view.outcome.is_terminal() {
            return Ok(MoveAck::AlreadyFinished);
        }
        if view.turn == Turn::Machine {
            return Ok(MoveAck::NotYourTurn);
        }

        let (reply, answer) = oneshot::channel();
        self.enqueue(Signal::Move {
            text: text.to_owned(),
            reply,
        })
        .await?;
        answer.await.map_err(|e| self.dropped(&e))
    }

    /// Resign on the human's behalf.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the engine is not running.
    pub async fn signal_resign(&self) -> Result<ResignAck, GatewayError> {
        if self.query().outcome.is_terminal() {
            return Ok(ResignAck::AlreadyFinished);
        }

        let (reply, answer) = oneshot::channel();
        self.enqueue(Signal::Resign { reply }).await?;
        answer.await.map_err(|e| self.dropped(&e))
    }

    async fn enqueue(&self, signal: Signal) -> Result<(), GatewayError> {
        tracing::debug!(session_id = %self.id, "Enqueueing signal");
        self.signals
            .send(signal)
            .await
            .map_err(|e| self.dropped(&e))
    }

    fn dropped(&self, cause: &dyn std::error::Error) -> GatewayError {
        tracing::warn!(session_id = %self.id, cause = %cause, "Session engine is not running");
        GatewayError::Unavailable {
            session_id: self.id,
        }
    }
}
