//! Lifecycle orchestration for preview containers: start, stop, stop-all,
//! status, logs, stats and start-up reconciliation.

mod error;
pub mod orchestrator;

pub use error::LifecycleError;
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, ReconcileReport, DEFAULT_MEMORY_LIMIT, LOG_TAIL_LINES,
    MAX_START_ATTEMPTS,
};
