//! Move provider backed by external UCI engine processes.
//!
//! [`UciEngineProvider`] drives an engine such as Stockfish over its
//! stdin/stdout. Every request checks a process out of an idle pool, or
//! starts a new one when the pool is empty, so concurrent sessions never
//! wait on each other's searches. Each request runs:
//!
//! ```text
//! ucinewgame
//! position fen <fen>
//! isready            -> readyok
//! go movetime <ms>   -> bestmove <uci>
//! ```
//!
//! A process goes back to the pool only after it answered. If a request is
//! abandoned halfway (the session's deadline fired and dropped the future)
//! the engine may still be searching, so its process is dropped with the
//! future and killed. The pool keeps at most `max_idle` processes; extra
//! ones exit when their request completes.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempo_core::{MoveProvider, ProviderError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A running engine process and its pipes.
struct EngineProcess {
    /// Held so the process is killed when dropped.
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl EngineProcess {
    /// Ask for the best move in `fen`, returning the raw `bestmove` line.
    async fn search(&mut self, fen: &str, budget: Duration) -> Result<String, ProviderError> {
        send(&mut self.stdin, "ucinewgame").await?;
        send(&mut self.stdin, &format!("position fen {fen}")).await?;
        send(&mut self.stdin, "isready").await?;
        read_until(&mut self.stdout, |line| line == "readyok").await?;

        send(&mut self.stdin, &format!("go movetime {}", budget.as_millis())).await?;
        read_until(&mut self.stdout, |line| parse_bestmove(line).is_some()).await
    }
}

/// Suggests moves by asking external UCI engines.
pub struct UciEngineProvider {
    path: String,
    args: Vec<String>,
    max_idle: usize,
    idle: Mutex<Vec<EngineProcess>>,
}

impl UciEngineProvider {
    /// Create a provider that launches the engine at `path` on demand and
    /// keeps up to `max_idle` finished processes for reuse.
    pub fn new(path: impl Into<String>, max_idle: usize) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            max_idle,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Pass `args` to every engine process this provider starts.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Take an idle process, or start one if none is waiting.
    async fn checkout(&self) -> Result<EngineProcess, ProviderError> {
        let reused = self.idle.lock().await.pop();
        match reused {
            Some(process) => Ok(process),
            None => self.launch().await,
        }
    }

    /// Return a process that completed its request.
    async fn checkin(&self, process: EngineProcess) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.max_idle {
            idle.push(process);
        } else {
            debug!(engine = %self.path, max_idle = self.max_idle, "Engine pool full, stopping process");
        }
    }

    /// Start the engine and complete the `uci` handshake.
    async fn launch(&self) -> Result<EngineProcess, ProviderError> {
        let mut child = Command::new(&self.path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| internal(format!("failed to start engine {:?}: {e}", self.path)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| internal("engine stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| internal("engine stdout is not piped"))?;

        let mut process = EngineProcess {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        send(&mut process.stdin, "uci").await?;
        read_until(&mut process.stdout, |line| line == "uciok").await?;

        info!(engine = %self.path, "UCI engine started");
        Ok(process)
    }
}

#[async_trait]
impl MoveProvider for UciEngineProvider {
    async fn suggest(&self, fen: &str, budget: Duration) -> Result<String, ProviderError> {
        let mut process = self.checkout().await?;
        let line = process.search(fen, budget).await?;
        self.checkin(process).await;

        let suggestion = parse_bestmove(&line).and_then(playable);
        debug!(fen, bestmove = ?suggestion, "UCI engine answered");
        suggestion.ok_or_else(|| ProviderError::NoMove {
            fen: fen.to_owned(),
        })
    }

    fn name(&self) -> &'static str {
        "uci"
    }
}

// ---------------------------------------------------------------------------
// Protocol helpers
// ---------------------------------------------------------------------------

async fn send(stdin: &mut ChildStdin, command: &str) -> Result<(), ProviderError> {
    stdin
        .write_all(format!("{command}\n").as_bytes())
        .await
        .map_err(|e| internal(format!("failed to write {command:?} to engine: {e}")))?;
    stdin
        .flush()
        .await
        .map_err(|e| internal(format!("failed to flush engine stdin: {e}")))
}

/// Read lines until `done` accepts one, returning that line. Info lines
/// and anything else are skipped.
async fn read_until<R, F>(lines: &mut Lines<R>, done: F) -> Result<String, ProviderError>
where
    R: AsyncBufRead + Unpin,
    F: Fn(&str) -> bool,
{
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim().to_owned();
                if done(&line) {
                    return Ok(line);
                }
            }
            Ok(None) => return Err(internal("engine closed its output")),
            Err(e) => return Err(internal(format!("failed to read engine output: {e}"))),
        }
    }
}

/// The move token of a `bestmove` line, if `line` is one.
fn parse_bestmove(line: &str) -> Option<&str> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "bestmove" {
        return None;
    }
    Some(tokens.next().unwrap_or("(none)"))
}

/// Engines report "no move" as `(none)` or the null move `0000`.
fn playable(token: &str) -> Option<String> {
    match token {
        "(none)" | "0000" => None,
        other => Some(other.to_owned()),
    }
}

fn internal(message: impl Into<String>) -> ProviderError {
    ProviderError::Internal {
        message: message.into(),
    }
}
