use std::time::Duration;

use ghost_core::CoreError;
use ghost_detector::DetectError;
use ghost_engine::EngineError;
use thiserror::Error;

/// Failure of a lifecycle operation, classified the way callers report it.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Engine unreachable after every recovery attempt.
    #[error("{hint}")]
    ServiceUnavailable { hint: String },

    #[error("project '{project}' is not cloned")]
    NotFound { project: String },

    #[error("{stderr}")]
    EngineOperationFailed {
        operation: &'static str,
        stderr: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid project name '{name}': {reason}")]
    InvalidProject { name: String, reason: &'static str },

    #[error("engine {operation} timed out after {}s", after.as_secs())]
    EngineTimeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("engine error: {0}")]
    Engine(EngineError),

    #[error("detection error: {0}")]
    Detect(#[from] DetectError),

    #[error("core error: {0}")]
    Core(CoreError),

    /// A blocking filesystem task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<EngineError> for LifecycleError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable { hint, .. } => LifecycleError::ServiceUnavailable { hint },
            EngineError::Failed { operation, stderr } => {
                LifecycleError::EngineOperationFailed { operation, stderr }
            }
            EngineError::Timeout { operation, after } => {
                LifecycleError::EngineTimeout { operation, after }
            }
            other => LifecycleError::Engine(other),
        }
    }
}

impl From<CoreError> for LifecycleError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidProjectName { name, reason } => {
                LifecycleError::InvalidProject { name, reason }
            }
            other => LifecycleError::Core(other),
        }
    }
}
