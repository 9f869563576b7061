use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the HTTP server, its collaborators and the runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("settings error: {0}")]
    Core(#[from] ghost_core::CoreError),

    #[error(transparent)]
    Lifecycle(#[from] ghost_lifecycle::LifecycleError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An external tool (site listing, git) could not be run or failed.
    #[error("{tool} failed: {message}")]
    Collaborator { tool: &'static str, message: String },

    #[error("failed to send email: {0}")]
    Mail(String),

    #[error("{0}")]
    Configuration(String),

    #[error("server error: {0}")]
    Server(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
