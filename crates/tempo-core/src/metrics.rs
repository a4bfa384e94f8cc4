//! Prometheus metrics for game sessions.
//!
//! [`Metrics`] owns its own [`Registry`] so every directory (and every
//! test) counts in isolation. The engine and directory update it as
//! sessions are created, moved, and finished; the API renders it in the
//! Prometheus text format on `GET /metrics`.
//!
//! | Metric                          | Type      | Labels    |
//! |---------------------------------|-----------|-----------|
//! | `tempo_games_created_total`     | counter   |           |
//! | `tempo_games_completed_total`   | counter   | `outcome` |
//! | `tempo_moves_played_total`      | counter   | `by`      |
//! | `tempo_games_active`            | gauge     |           |
//! | `tempo_provider_move_seconds`   | histogram |           |

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tempo_types::{Outcome, Turn};

/// Provider latency buckets, in seconds.
const PROVIDER_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Errors from building or rendering the metrics registry.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A collector could not be created, registered, or encoded.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The encoder produced text that is not UTF-8.
    #[error("metrics output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Session counters, gauges, and latency histograms.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    games_created: IntCounter,
    games_completed: IntCounterVec,
    moves_played: IntCounterVec,
    games_active: IntGauge,
    provider_move_seconds: Histogram,
}

impl Metrics {
    /// Create and register every collector.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Prometheus`] if a collector is rejected by
    /// the registry.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let games_created = IntCounter::with_opts(Opts::new(
            "tempo_games_created_total",
            "Sessions created since startup",
        ))?;
        let games_completed = IntCounterVec::new(
            Opts::new(
                "tempo_games_completed_total",
                "Sessions that reached a terminal outcome",
            ),
            &["outcome"],
        )?;
        let moves_played = IntCounterVec::new(
            Opts::new("tempo_moves_played_total", "Moves committed to a session"),
            &["by"],
        )?;
        let games_active = IntGauge::with_opts(Opts::new(
            "tempo_games_active",
            "Sessions with a running engine that have not finished",
        ))?;
        let provider_move_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "tempo_provider_move_seconds",
                "Time the move provider took to answer",
            )
            .buckets(PROVIDER_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(games_created.clone()))?;
        registry.register(Box::new(games_completed.clone()))?;
        registry.register(Box::new(moves_played.clone()))?;
        registry.register(Box::new(games_active.clone()))?;
        registry.register(Box::new(provider_move_seconds.clone()))?;

        Ok(Self {
            registry,
            games_created,
            games_completed,
            moves_played,
            games_active,
            provider_move_seconds,
        })
    }

    /// A session's `Created` record was committed.
    pub fn game_created(&self) {
        self.games_created.inc();
    }

    /// A session reached `outcome`.
    pub fn game_completed(&self, outcome: Outcome) {
        self.games_completed
            .with_label_values(&[outcome_label(outcome)])
            .inc();
    }

    /// A move by `by` was committed.
    pub fn move_played(&self, by: Turn) {
        let label = match by {
            Turn::Human => "human",
            Turn::Machine => "machine",
        };
        self.moves_played.with_label_values(&[label]).inc();
    }

    /// An engine started driving an unfinished session.
    pub fn engine_started(&self) {
        self.games_active.inc();
    }

    /// An engine that was counted by [`Metrics::engine_started`] exited.
    pub fn engine_stopped(&self) {
        self.games_active.dec();
    }

    /// Record how long the move provider took, in seconds.
    pub fn observe_provider(&self, seconds: f64) {
        self.provider_move_seconds.observe(seconds);
    }

    /// Render every collector in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if encoding fails.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

const fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::InProgress => "in_progress",
        Outcome::Checkmate => "checkmate",
        Outcome::Draw => "draw",
        Outcome::Resignation => "resignation",
        Outcome::Failed => "failed",
    }
}
