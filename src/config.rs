//! Runtime configuration and compile-time limits.
//!
//! `Config` carries the values the core consumes (cache age, timeouts, event
//! buffering, backend location). It is usually loaded from the JSON file
//! passed on the command line; a `.toml` file is accepted as well.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum path depth (segments below the root)
pub const MAX_PATH_DEPTH: usize = 16;

/// Maximum shell input line length
pub const MAX_INPUT: usize = 256;

/// Shell command history size
pub const HISTORY_SIZE: usize = 32;

/// Default freshness window in seconds
pub const DEFAULT_MAX_AGE: u64 = 300;

/// Default backend call timeout in seconds
pub const DEFAULT_BACKEND_TIMEOUT: u64 = 30;

/// Default per-subscriber change buffer
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Default backend poll period of `events` mode in seconds
pub const DEFAULT_POLL_INTERVAL: u64 = 60;

/// Configuration consumed by the core.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds a fetched value stays fresh
    pub max_age: u64,

    /// Refresh on every read
    pub no_cache: bool,

    /// Seconds before a backend call counts as failed
    pub backend_timeout: u64,

    /// Records buffered per `events` subscriber before the oldest are dropped
    pub event_buffer: usize,

    /// Seconds between whole-tree refreshes while `events` is running
    pub poll_interval: u64,

    /// Where the backend reads its data from
    pub backend: BackendConfig,
}

/// Backend location.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// JSON document served by the file backend
    pub file: Option<PathBuf>,
}

/// Configuration loading failures (fatal at bootstrap).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("could not read configuration file {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON
    #[error("could not load configuration file {path}: {source}")]
    Json {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// File is not valid TOML
    #[error("could not load configuration file {path}: {source}")]
    Toml {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            no_cache: false,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            event_buffer: DEFAULT_EVENT_BUFFER,
            poll_interval: DEFAULT_POLL_INTERVAL,
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Load from a file. `.toml` files are parsed as TOML, everything else as JSON.
    ///
    /// A relative `backend.file` is resolved against the configuration file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str::<Config>(&text).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_json::from_str::<Config>(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        };

        if let (Some(file), Some(dir)) = (config.backend.file.as_ref(), path.parent())
            && file.is_relative()
        {
            config.backend.file = Some(dir.join(file));
        }

        Ok(config)
    }

    /// Freshness window as a duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age)
    }

    /// Backend timeout as a duration.
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout)
    }

    /// Poll period as a duration (at least one second).
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }
}
