//! Engine availability gate.
//!
//! Checked before every mutating lifecycle operation. When the engine does
//! not answer, the configured recovery actions are tried in order, re-checking
//! after each one; the first healthy answer ends the attempt.

use std::sync::Arc;

use crate::engine::{ContainerEngine, RecoveryAction};
use crate::error::EngineError;

pub const DEFAULT_HINT: &str =
    "Podman service is not available. Start it with: systemctl --user start podman.socket";

#[derive(Clone)]
pub struct EngineGate {
    engine: Arc<dyn ContainerEngine>,
    recovery: Vec<RecoveryAction>,
    hint: String,
}

impl EngineGate {
    pub fn new(engine: Arc<dyn ContainerEngine>, recovery: Vec<RecoveryAction>) -> Self {
        Self {
            engine,
            recovery,
            hint: DEFAULT_HINT.to_string(),
        }
    }

    /// Gate with the rootless Podman recovery actions.
    pub fn podman(engine: Arc<dyn ContainerEngine>) -> Self {
        Self::new(engine, RecoveryAction::podman_defaults())
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    pub fn recovery_actions(&self) -> &[RecoveryAction] {
        &self.recovery
    }

    /// Return once the engine is healthy, or fail with [`EngineError::Unavailable`].
    pub async fn ensure_available(&self) -> Result<(), EngineError> {
        if self.engine.healthy().await {
            return Ok(());
        }
        tracing::warn!("container engine not responding; attempting recovery");

        for (attempt, action) in self.recovery.iter().enumerate() {
            let attempt = attempt + 1;
            if let Err(err) = self.engine.run_recovery(action).await {
                tracing::warn!(attempt, action = %action, error = %err, "recovery action failed");
            }
            if self.engine.healthy().await {
                tracing::info!(attempt, action = %action, "container engine recovered");
                return Ok(());
            }
        }

        tracing::error!(
            attempts = self.recovery.len(),
            "container engine unavailable after recovery attempts"
        );
        Err(EngineError::Unavailable {
            hint: self.hint.clone(),
            attempts: self.recovery.len(),
        })
    }
}

impl std::fmt::Debug for EngineGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineGate")
            .field("recovery", &self.recovery)
            .field("hint", &self.hint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{EngineCall, FakeEngine};

    #[tokio::test]
    async fn healthy_engine_passes_without_recovery() {
        let engine = Arc::new(FakeEngine::new());
        let gate = EngineGate::podman(engine.clone());
        gate.ensure_available().await.expect("available");
        assert_eq!(engine.recovery_attempts(), 0);
        assert_eq!(engine.calls(), vec![EngineCall::Healthy]);
    }

    #[tokio::test]
    async fn recovers_on_second_action() {
        let engine = Arc::new(FakeEngine::recovering_after(2));
        let gate = EngineGate::podman(engine.clone());
        gate.ensure_available().await.expect("recovered");
        assert_eq!(engine.recovery_attempts(), 2);
    }

    #[tokio::test]
    async fn stops_at_first_successful_recovery() {
        let engine = Arc::new(FakeEngine::recovering_after(1));
        let gate = EngineGate::podman(engine.clone());
        gate.ensure_available().await.expect("recovered");
        assert_eq!(engine.recovery_attempts(), 1);
    }

    #[tokio::test]
    async fn unavailable_after_exactly_all_actions() {
        let engine = Arc::new(FakeEngine::unavailable());
        let gate = EngineGate::podman(engine.clone());
        let err = gate.ensure_available().await.unwrap_err();
        match err {
            EngineError::Unavailable { hint, attempts } => {
                assert_eq!(attempts, 2);
                assert!(hint.contains("systemctl --user start podman.socket"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
        assert_eq!(engine.recovery_attempts(), 2);
    }

    #[tokio::test]
    async fn custom_hint_and_no_actions() {
        let engine = Arc::new(FakeEngine::unavailable());
        let gate = EngineGate::new(engine.clone(), Vec::new()).with_hint("start docker");
        let err = gate.ensure_available().await.unwrap_err();
        assert_eq!(err.to_string(), "start docker");
        assert_eq!(engine.recovery_attempts(), 0);
    }
}
