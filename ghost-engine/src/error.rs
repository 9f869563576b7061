use std::time::Duration;

use thiserror::Error;

/// Error surface for container engine invocations and the availability gate.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine {operation} timed out after {}s", after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("engine {operation} failed: {stderr}")]
    Failed {
        operation: &'static str,
        stderr: String,
    },

    #[error("could not parse engine {operation} output: {message}")]
    Parse {
        operation: &'static str,
        message: String,
    },

    #[error("{hint}")]
    Unavailable { hint: String, attempts: usize },
}

impl EngineError {
    /// True for a `run` failure caused by the host port already being bound.
    pub fn is_port_conflict(&self) -> bool {
        match self {
            EngineError::Failed { stderr, .. } => {
                let lower = stderr.to_ascii_lowercase();
                lower.contains("address already in use")
                    || lower.contains("port is already allocated")
                    || lower.contains("bind: address in use")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_conflict_is_recognised() {
        let err = EngineError::Failed {
            operation: "run",
            stderr: "Error: rootlessport listen tcp 0.0.0.0:41000: bind: address already in use"
                .to_string(),
        };
        assert!(err.is_port_conflict());

        let other = EngineError::Failed {
            operation: "run",
            stderr: "Error: image not known".to_string(),
        };
        assert!(!other.is_port_conflict());
    }

    #[test]
    fn timeout_message_has_seconds() {
        let err = EngineError::Timeout {
            operation: "run",
            after: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "engine run timed out after 60s");
    }
}
