//! Configuration loading and typed config structures for the Tempo service.
//!
//! The configuration lives in `tempo-config.yaml` next to the binary. This
//! module defines strongly-typed structs that mirror the YAML structure, and
//! provides a loader that reads the file and applies environment overrides.
//! Every field has a default, so an empty or missing file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value {value:?} for {key}")]
    InvalidOverride {
        /// The environment variable.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
///
/// Mirrors the structure of `tempo-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Session engine timing and queue sizing.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Which move provider plays the automated side.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Where session logs and snapshots are kept.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `TEMPO_HOST` overrides `server.host`
    /// - `TEMPO_PORT` overrides `server.port`
    /// - `TEMPO_DATA_DIR` overrides `storage.data_dir`
    /// - `TEMPO_ENGINE_PATH` overrides `provider.engine_path`
    /// - `TEMPO_PROVIDER` overrides `provider.kind`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] if an override does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults. Environment
    /// overrides apply either way.
    ///
    /// # Errors
    ///
    /// See [`ServiceConfig::from_file`].
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        tracing::info!(path = %path.display(), "No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string, without environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override values with `TEMPO_*` environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if `TEMPO_PORT` or
    /// `TEMPO_PROVIDER` does not parse.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("TEMPO_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("TEMPO_PORT") {
            self.server.port = match val.trim().parse() {
                Ok(port) => port,
                Err(_) => {
                    return Err(ConfigError::InvalidOverride {
                        key: "TEMPO_PORT",
                        value: val,
                    });
                }
            };
        }
        if let Some(val) = lookup("TEMPO_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("TEMPO_ENGINE_PATH") {
            self.provider.engine_path = val;
        }
        if let Some(val) = lookup("TEMPO_PROVIDER") {
            self.provider.kind = match val.trim().to_ascii_lowercase().as_str() {
                "random" => ProviderKind::Random,
                "uci" => ProviderKind::Uci,
                _ => {
                    return Err(ConfigError::InvalidOverride {
                        key: "TEMPO_PROVIDER",
                        value: val,
                    });
                }
            };
        }
        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Session engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Thinking time handed to the move provider, in milliseconds.
    #[serde(default = "default_move_time_ms")]
    pub move_time_ms: u64,

    /// Hard deadline for a provider call, in milliseconds. Exceeding it
    /// fails the session.
    #[serde(default = "default_provider_deadline_ms")]
    pub provider_deadline_ms: u64,

    /// Capacity of each session's signal queue.
    #[serde(default = "default_signal_queue_capacity")]
    pub signal_queue_capacity: usize,
}

impl EngineConfig {
    /// Thinking time handed to the move provider.
    pub const fn move_time(&self) -> Duration {
        Duration::from_millis(self.move_time_ms)
    }

    /// Hard deadline for a provider call.
    pub const fn provider_deadline(&self) -> Duration {
        Duration::from_millis(self.provider_deadline_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            move_time_ms: default_move_time_ms(),
            provider_deadline_ms: default_provider_deadline_ms(),
            signal_queue_capacity: default_signal_queue_capacity(),
        }
    }
}

/// Which move provider drives the automated side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Uniformly random legal moves.
    #[default]
    Random,
    /// An external UCI engine process.
    Uci,
}

/// Move provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Provider implementation.
    #[serde(default)]
    pub kind: ProviderKind,

    /// Executable for the UCI provider.
    #[serde(default = "default_engine_path")]
    pub engine_path: String,

    /// Extra command-line arguments for the engine executable.
    #[serde(default)]
    pub engine_args: Vec<String>,

    /// Engine processes kept warm between requests. Concurrent requests
    /// beyond this start extra processes that exit when they finish.
    #[serde(default = "default_max_idle_engines")]
    pub max_idle_engines: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            engine_path: default_engine_path(),
            engine_args: Vec::new(),
            max_idle_engines: default_max_idle_engines(),
        }
    }
}

/// Storage backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One directory per session under `data_dir`.
    #[default]
    File,
    /// In-process only; sessions do not survive a restart.
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Backend implementation.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the file backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    9999
}

const fn default_move_time_ms() -> u64 {
    250
}

const fn default_provider_deadline_ms() -> u64 {
    2000
}

const fn default_signal_queue_capacity() -> usize {
    32
}

fn default_engine_path() -> String {
    String::from("stockfish")
}

const fn default_max_idle_engines() -> usize {
    4
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/sessions")
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.engine.move_time(), Duration::from_millis(250));
        assert_eq!(config.engine.provider_deadline(), Duration::from_secs(2));
        assert_eq!(config.engine.signal_queue_capacity, 32);
        assert_eq!(config.provider.kind, ProviderKind::Random);
        assert!(config.provider.engine_args.is_empty());
        assert_eq!(config.provider.max_idle_engines, 4);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080

engine:
  move_time_ms: 100
  provider_deadline_ms: 500
  signal_queue_capacity: 8

provider:
  kind: uci
  engine_path: "/usr/games/stockfish"
  engine_args: ["--threads", "1"]
  max_idle_engines: 2

storage:
  backend: memory
  data_dir: "/tmp/tempo"

logging:
  level: "debug"
  format: json
"#;
        let config = ServiceConfig::parse(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.provider_deadline_ms, 500);
        assert_eq!(config.provider.kind, ProviderKind::Uci);
        assert_eq!(config.provider.engine_path, "/usr/games/stockfish");
        assert_eq!(config.provider.engine_args, vec!["--threads", "1"]);
        assert_eq!(config.provider.max_idle_engines, 2);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = ServiceConfig::parse("engine:\n  move_time_ms: 50\n").unwrap();
        assert_eq!(config.engine.move_time_ms, 50);
        assert_eq!(config.engine.provider_deadline_ms, 2000);
        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn parse_empty_yaml() {
        assert_eq!(ServiceConfig::parse("").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let env: BTreeMap<&str, &str> = [
            ("TEMPO_HOST", "127.0.0.1"),
            ("TEMPO_PORT", "7000"),
            ("TEMPO_DATA_DIR", "/var/lib/tempo"),
            ("TEMPO_ENGINE_PATH", "/opt/sf"),
            ("TEMPO_PROVIDER", "UCI"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| (*v).to_owned()))
            .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/tempo"));
        assert_eq!(config.provider.engine_path, "/opt/sf");
        assert_eq!(config.provider.kind, ProviderKind::Uci);
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_overrides(|key| (key == "TEMPO_PORT").then(|| String::from("high")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { key: "TEMPO_PORT", .. }));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("tempo-config.yaml");
        if path.exists() {
            let config = ServiceConfig::parse(&std::fs::read_to_string(&path).unwrap());
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
