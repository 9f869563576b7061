//! In-memory container engine for tests.
//!
//! Mirrors the observable behaviour of the Podman client: `run` refuses a
//! name that is already taken, `stop`/`remove` ignore unknown names, and
//! `logs` is empty for an unknown container. Every call is recorded.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ghost_core::{ContainerName, ContainerStats};

use crate::engine::{ContainerEngine, RecoveryAction, RunSpec};
use crate::error::EngineError;

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Healthy,
    Recovery(String),
    Inspect(String),
    Remove(String),
    Run(String),
    Stop(Vec<String>),
    Logs(String),
    List(String),
    Stats,
    HostPort(String),
}

impl EngineCall {
    /// Calls that change container state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            EngineCall::Remove(_) | EngineCall::Run(_) | EngineCall::Stop(_)
        )
    }
}

/// A container as the fake engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeContainer {
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub running: bool,
    pub command: Vec<String>,
    pub memory_limit: String,
}

#[derive(Debug, Default)]
struct FakeState {
    healthy: bool,
    /// Become healthy once this many recovery actions have run.
    recover_after: Option<usize>,
    recovery_attempts: usize,
    containers: BTreeMap<String, FakeContainer>,
    run_failures: VecDeque<String>,
    calls: Vec<EngineCall>,
}

#[derive(Debug)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
    run_delay: Duration,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    /// A healthy engine with no containers.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                healthy: true,
                ..FakeState::default()
            }),
            run_delay: Duration::ZERO,
        }
    }

    /// An engine whose daemon is down and never recovers.
    pub fn unavailable() -> Self {
        let engine = Self::new();
        engine.lock().healthy = false;
        engine
    }

    /// An engine that is down until `attempts` recovery actions have run.
    pub fn recovering_after(attempts: usize) -> Self {
        let engine = Self::unavailable();
        engine.lock().recover_after = Some(attempts);
        engine
    }

    /// Make every `run` take `delay` before it lands.
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.lock().healthy = healthy;
    }

    /// Queue a failure for the next `run`, reported with `stderr`.
    pub fn fail_next_run(&self, stderr: impl Into<String>) {
        self.lock().run_failures.push_back(stderr.into());
    }

    /// Place a container directly, bypassing `run` (e.g. a foreign container).
    pub fn insert_container(&self, name: &str, host_port: u16, running: bool) {
        self.lock().containers.insert(
            name.to_string(),
            FakeContainer {
                image: "busybox".to_string(),
                host_port,
                container_port: ghost_core::CONTAINER_PORT,
                running,
                command: Vec::new(),
                memory_limit: String::new(),
            },
        );
    }

    /// Simulate a crash or an out-of-band `podman stop`.
    pub fn set_running(&self, name: &str, running: bool) {
        if let Some(c) = self.lock().containers.get_mut(name) {
            c.running = running;
        }
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.lock().containers.get(name).cloned()
    }

    pub fn running_names(&self) -> Vec<String> {
        self.lock()
            .containers
            .iter()
            .filter(|(_, c)| c.running)
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn recovery_attempts(&self) -> usize {
        self.lock().recovery_attempts
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<EngineCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutating())
            .cloned()
            .collect()
    }

    pub fn count_runs(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::Run(_)))
            .count()
    }

    fn record(&self, call: EngineCall) {
        self.lock().calls.push(call);
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn healthy(&self) -> bool {
        let mut state = self.lock();
        state.calls.push(EngineCall::Healthy);
        state.healthy
    }

    async fn run_recovery(&self, action: &RecoveryAction) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Recovery(action.to_string()));
        state.recovery_attempts += 1;
        if let Some(after) = state.recover_after {
            if state.recovery_attempts >= after {
                state.healthy = true;
            }
        }
        if state.healthy {
            Ok(())
        } else {
            Err(EngineError::Failed {
                operation: "recovery",
                stderr: format!("{action}: unit not found"),
            })
        }
    }

    async fn inspect_running(&self, name: &ContainerName) -> Result<bool, EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Inspect(name.to_string()));
        Ok(state
            .containers
            .get(name.as_str())
            .map(|c| c.running)
            .unwrap_or(false))
    }

    async fn remove(&self, name: &ContainerName) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Remove(name.to_string()));
        state.containers.remove(name.as_str());
        Ok(())
    }

    async fn run(&self, spec: &RunSpec) -> Result<(), EngineError> {
        self.record(EngineCall::Run(spec.name.to_string()));
        if !self.run_delay.is_zero() {
            tokio::time::sleep(self.run_delay).await;
        }

        let mut state = self.lock();
        if let Some(stderr) = state.run_failures.pop_front() {
            return Err(EngineError::Failed {
                operation: "run",
                stderr,
            });
        }
        if state.containers.contains_key(spec.name.as_str()) {
            return Err(EngineError::Failed {
                operation: "run",
                stderr: format!(
                    "Error: creating container storage: the container name \"{}\" is already in use",
                    spec.name
                ),
            });
        }
        state.containers.insert(
            spec.name.to_string(),
            FakeContainer {
                image: spec.image.clone(),
                host_port: spec.port.host,
                container_port: spec.port.container,
                running: true,
                command: spec.command.clone(),
                memory_limit: spec.memory_limit.clone(),
            },
        );
        Ok(())
    }

    async fn stop(&self, names: &[ContainerName]) -> Result<(), EngineError> {
        let mut state = self.lock();
        state
            .calls
            .push(EngineCall::Stop(names.iter().map(|n| n.to_string()).collect()));
        for name in names {
            if let Some(c) = state.containers.get_mut(name.as_str()) {
                c.running = false;
            }
        }
        Ok(())
    }

    async fn logs(&self, name: &ContainerName, tail: usize) -> Result<String, EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Logs(name.to_string()));
        let Some(c) = state.containers.get(name.as_str()) else {
            return Ok(String::new());
        };
        let lines = [
            format!("Trying to pull {}...", c.image),
            format!("> {}", c.command.join(" ")),
            format!("listening on 0.0.0.0:{}", c.container_port),
        ];
        let skip = lines.len().saturating_sub(tail);
        let mut out = lines[skip..].join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ContainerName>, EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::List(prefix.to_string()));
        Ok(state
            .containers
            .iter()
            .filter(|(n, c)| c.running && n.starts_with(prefix))
            .map(|(n, _)| ContainerName::from_engine(n.clone()))
            .collect())
    }

    async fn stats(&self) -> Result<Vec<ContainerStats>, EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Stats);
        Ok(state
            .containers
            .iter()
            .filter(|(_, c)| c.running)
            .map(|(n, c)| ContainerStats {
                name: n.clone(),
                cpu: Some("0.50%".to_string()),
                mem: Some(format!("64MB / {}", c.memory_limit)),
                mem_percent: Some("1.56%".to_string()),
                net_io: Some("1kB / 1kB".to_string()),
                block_io: Some("0B / 0B".to_string()),
            })
            .collect())
    }

    async fn host_port(
        &self,
        name: &ContainerName,
        container_port: u16,
    ) -> Result<Option<u16>, EngineError> {
        let mut state = self.lock();
        state.calls.push(EngineCall::HostPort(name.to_string()));
        Ok(state
            .containers
            .get(name.as_str())
            .filter(|c| c.running && c.container_port == container_port)
            .map(|c| c.host_port))
    }
}
