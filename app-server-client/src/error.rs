use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

/// Failure talking to an app-server. Callers treat every variant the same way
/// except for logging.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("workspace `{0}` is not connected")]
    WorkspaceNotConnected(String),

    #[error("app-server connection closed")]
    ConnectionClosed,

    #[error("app-server error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("failed to encode request: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve the monitor home directory: {0}")]
    Home(#[source] std::io::Error),

    #[error("could not find the user home directory; set CODEX_MONITOR_HOME")]
    NoUserHome,

    #[error("monitor home {} is not a directory", .0.display())]
    HomeNotADirectory(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum ActivityStoreError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode activity map: {0}")]
    Encode(#[from] serde_json::Error),
}
