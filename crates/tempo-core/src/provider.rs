//! Move provider trait, deadline wrapper, and the random bot.
//!
//! While it is the automated side's turn, the engine hands the current FEN
//! and a thinking budget to a [`MoveProvider`] and awaits a move in UCI
//! notation. The trait abstracts how that move is produced: an external
//! UCI engine process, a random bot, or a test stub.
//!
//! The provider is trusted to respect the budget but not relied upon to:
//! [`suggest_within`] bounds every call with a hard deadline, and a
//! missed deadline is a provider failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use tempo_rules::{ChessRules, RulesAdapter};

/// Errors that can occur while obtaining a move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider did not answer within the deadline.
    #[error("move provider timed out (deadline: {deadline_ms}ms)")]
    Timeout {
        /// The deadline in milliseconds.
        deadline_ms: u64,
    },

    /// The position has no legal move to suggest.
    #[error("no legal move in position {fen}")]
    NoMove {
        /// The position.
        fen: String,
    },

    /// An internal error in the provider.
    #[error("move provider error: {message}")]
    Internal {
        /// Description of the error.
        message: String,
    },
}

/// A source of moves for the automated side.
#[async_trait]
pub trait MoveProvider: Send + Sync {
    /// Suggest a move in UCI notation for the side to move in `fen`,
    /// thinking for roughly `budget`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if no move can be produced.
    async fn suggest(&self, fen: &str, budget: Duration) -> Result<String, ProviderError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Ask `provider` for a move, failing with [`ProviderError::Timeout`] if it
/// has not answered within `deadline`.
///
/// # Errors
///
/// Returns the provider's own error, or [`ProviderError::Timeout`].
pub async fn suggest_within(
    provider: &dyn MoveProvider,
    fen: &str,
    budget: Duration,
    deadline: Duration,
) -> Result<String, ProviderError> {
    tokio::time::timeout(deadline, provider.suggest(fen, budget))
        .await
        .unwrap_or_else(|_| {
            Err(ProviderError::Timeout {
                deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            })
        })
}

/// Plays a uniformly random legal move, instantly.
#[derive(Debug, Clone, Default)]
pub struct RandomMoveProvider<R: RulesAdapter = ChessRules> {
    rules: Arc<R>,
}

impl<R: RulesAdapter> RandomMoveProvider<R> {
    /// Create a random provider that asks `rules` for the legal moves.
    pub const fn new(rules: Arc<R>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl<R: RulesAdapter> MoveProvider for RandomMoveProvider<R> {
    async fn suggest(&self, fen: &str, _budget: Duration) -> Result<String, ProviderError> {
        let position = self
            .rules
            .new_game(Some(fen))
            .map_err(|e| ProviderError::Internal {
                message: e.to_string(),
            })?;
        let moves = self.rules.legal_moves(&position);

        let choice = {
            let mut rng = rand::rng();
            moves.choose(&mut rng).cloned()
        };
        choice.ok_or_else(|| ProviderError::NoMove {
            fen: fen.to_owned(),
        })
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    //! Scripted providers for engine tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Answers with a fixed list of moves, in order.
    pub struct ScriptedProvider {
        moves: Mutex<VecDeque<String>>,
        delay: Duration,
    }

    impl ScriptedProvider {
        pub fn new(moves: &[&str]) -> Self {
            Self::delayed(moves, Duration::ZERO)
        }

        pub fn delayed(moves: &[&str], delay: Duration) -> Self {
            Self {
                moves: Mutex::new(moves.iter().map(|m| (*m).to_owned()).collect()),
                delay,
            }
        }
    }

    #[async_trait]
    impl MoveProvider for ScriptedProvider {
        async fn suggest(&self, fen: &str, _budget: Duration) -> Result<String, ProviderError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.moves.lock().unwrap().pop_front();
            next.ok_or_else(|| ProviderError::NoMove {
                fen: fen.to_owned(),
            })
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Always fails.
    pub struct BrokenProvider;

    #[async_trait]
    impl MoveProvider for BrokenProvider {
        async fn suggest(&self, _fen: &str, _budget: Duration) -> Result<String, ProviderError> {
            Err(ProviderError::Internal {
                message: String::from("engine crashed"),
            })
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::testing::*;
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const FOOLS_MATE: &str = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";

    #[tokio::test]
    async fn random_provider_plays_a_legal_move() {
        let rules = Arc::new(ChessRules::new());
        let provider = RandomMoveProvider::new(Arc::clone(&rules));
        let uci = provider.suggest(START, Duration::ZERO).await.unwrap();

        let position = rules.new_game(Some(START)).unwrap();
        assert!(rules.legal_moves(&position).contains(&uci));
    }

    #[tokio::test]
    async fn random_provider_has_nothing_in_a_mated_position() {
        let provider = RandomMoveProvider::new(Arc::new(ChessRules::new()));
        let err = provider.suggest(FOOLS_MATE, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoMove { .. }));
    }

    #[tokio::test]
    async fn random_provider_reports_bad_fen() {
        let provider = RandomMoveProvider::new(Arc::new(ChessRules::new()));
        let err = provider.suggest("garbage", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, ProviderError::Internal { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_a_slow_answer_into_a_timeout() {
        let provider = ScriptedProvider::delayed(&["e2e4"], Duration::from_secs(10));
        let err = suggest_within(
            &provider,
            START,
            Duration::from_millis(250),
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();
        assert_eq!(err, ProviderError::Timeout { deadline_ms: 2000 });
    }

    #[tokio::test]
    async fn answer_inside_the_deadline_passes_through() {
        let provider = ScriptedProvider::new(&["e2e4"]);
        let uci = suggest_within(&provider, START, Duration::ZERO, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(uci, "e2e4");

        let err = suggest_within(&BrokenProvider, START, Duration::ZERO, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Internal { .. }));
    }
}
