//! Per-project container lifecycle.
//!
//! The engine is the source of truth for what is running. The registry only
//! remembers which port a project was started on, and every status answer is
//! re-derived from the engine before the registry is consulted.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use ghost_core::{
    types::is_managed, ContainerName, ContainerStats, InstanceRecord, InstanceRegistry,
    InstanceState, OsPortAllocator, PortAllocator, ProjectName, ProjectStatus, CONTAINER_PORT,
    CONTAINER_WORKDIR, NAMESPACE_PREFIX,
};
use ghost_detector::{detect_profile, LaunchProfile};
use ghost_engine::{ContainerEngine, EngineGate, Mount, PortMapping, RunSpec};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio::task;

use crate::error::LifecycleError;

pub const DEFAULT_MEMORY_LIMIT: &str = "4g";
pub const LOG_TAIL_LINES: usize = 50;
/// Total `run` attempts when the allocated host port turns out to be taken.
pub const MAX_START_ATTEMPTS: usize = 3;

// ---------------------------------------------------------------------------
// 1. Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Directory holding one working copy per project.
    pub clone_dir: PathBuf,
    /// Memory ceiling, also applied as the memory+swap ceiling.
    pub memory_limit: String,
}

impl OrchestratorConfig {
    pub fn new(clone_dir: impl Into<PathBuf>) -> Self {
        Self {
            clone_dir: clone_dir.into(),
            memory_limit: DEFAULT_MEMORY_LIMIT.to_string(),
        }
    }

    pub fn with_memory_limit(mut self, limit: impl Into<String>) -> Self {
        self.memory_limit = limit.into();
        self
    }
}

/// Outcome of [`Orchestrator::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Registry entries dropped because their container is not running.
    pub pruned: Vec<ProjectName>,
    /// Running containers picked up into the registry.
    pub adopted: Vec<ProjectName>,
}

// ---------------------------------------------------------------------------
// 2. Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    engine: Arc<dyn ContainerEngine>,
    gate: EngineGate,
    registry: InstanceRegistry,
    ports: Arc<dyn PortAllocator>,
    config: OrchestratorConfig,
    locks: LockMap,
    transitions: Mutex<HashMap<ProjectName, InstanceState>>,
}

impl Orchestrator {
    /// Orchestrator with the Podman recovery gate and OS port allocation.
    pub fn new(engine: Arc<dyn ContainerEngine>, config: OrchestratorConfig) -> Self {
        Self {
            gate: EngineGate::podman(engine.clone()),
            engine,
            registry: InstanceRegistry::new(),
            ports: Arc::new(OsPortAllocator),
            config,
            locks: Mutex::new(HashMap::new()),
            transitions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_gate(mut self, gate: EngineGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_port_allocator(mut self, ports: Arc<dyn PortAllocator>) -> Self {
        self.ports = ports;
        self
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn clone_dir(&self) -> &Path {
        &self.config.clone_dir
    }

    /// Working copy location for `project`.
    pub fn project_dir(&self, project: &ProjectName) -> PathBuf {
        self.config.clone_dir.join(project.as_str())
    }

    pub fn is_cloned(&self, project: &ProjectName) -> bool {
        self.project_dir(project).is_dir()
    }

    /// Start a fresh container for `project` and return its host port.
    ///
    /// Any previous container under the same name is removed first. Nothing
    /// is recorded unless the engine accepted the `run`.
    pub async fn start(&self, project: &ProjectName) -> Result<u16, LifecycleError> {
        let _lock = self.lock_project(project).await;

        let dir = self.project_dir(project);
        let dir = blocking(move || std::fs::canonicalize(dir).ok().filter(|d| d.is_dir()))
            .await?
            .ok_or_else(|| LifecycleError::NotFound {
                project: project.to_string(),
            })?;

        let _transition = self.begin(project, InstanceState::Starting);
        self.gate.ensure_available().await?;

        let container = ContainerName::for_project(project);
        self.engine.remove(&container).await?;
        self.registry.remove(project);

        let mut port = self.ports.allocate()?;
        let profile = {
            let dir = dir.clone();
            blocking(move || detect_profile(&dir)).await??
        };
        tracing::info!(
            project = %project,
            container = %container,
            runtime = %profile.kind,
            framework = profile.framework.as_deref().unwrap_or("-"),
            "starting preview",
        );

        let mut attempt = 1;
        loop {
            let spec = self.run_spec(&container, &dir, &profile, port);
            match self.engine.run(&spec).await {
                Ok(()) => break,
                Err(err) if err.is_port_conflict() && attempt < MAX_START_ATTEMPTS => {
                    tracing::warn!(
                        project = %project,
                        port,
                        attempt,
                        "host port taken before run; retrying with a new port",
                    );
                    self.engine.remove(&container).await?;
                    port = self.ports.allocate()?;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(project = %project, port, attempt, error = %err, "start failed");
                    return Err(err.into());
                }
            }
        }

        self.registry.insert(InstanceRecord {
            project: project.clone(),
            container: container.clone(),
            port,
            started_at: Utc::now(),
        });
        tracing::info!(project = %project, container = %container, port, "preview running");
        Ok(port)
    }

    /// Stop the container for `project`.
    ///
    /// The registry entry is dropped whatever the engine says. Only an
    /// unreachable engine is reported; other stop failures are logged.
    pub async fn stop(&self, project: &ProjectName) -> Result<(), LifecycleError> {
        let _lock = self.lock_project(project).await;
        let _transition = self.begin(project, InstanceState::Stopping);
        let container = ContainerName::for_project(project);

        let outcome = match self.gate.ensure_available().await {
            Ok(()) => self
                .engine
                .stop(std::slice::from_ref(&container))
                .await
                .map_err(LifecycleError::from),
            Err(err) => Err(err.into()),
        };
        self.registry.remove(project);

        match outcome {
            Ok(()) => {
                tracing::info!(project = %project, container = %container, "preview stopped");
                Ok(())
            }
            Err(err @ LifecycleError::ServiceUnavailable { .. }) => Err(err),
            Err(err) => {
                tracing::warn!(project = %project, container = %container, error = %err, "stop failed; treated as stopped");
                Ok(())
            }
        }
    }

    /// Stop every running managed container in one engine call and clear the
    /// registry. Returns how many containers were stopped.
    pub async fn stop_all(&self) -> Result<usize, LifecycleError> {
        self.gate.ensure_available().await?;
        let names = self.engine.list_by_prefix(NAMESPACE_PREFIX).await?;
        if !names.is_empty() {
            self.engine.stop(&names).await?;
        }
        let cleared = self.registry.clear();
        tracing::info!(stopped = names.len(), cleared, "stopped all previews");
        Ok(names.len())
    }

    /// Current state of `project`, asked of the engine every time.
    pub async fn status(&self, project: &ProjectName) -> Result<ProjectStatus, LifecycleError> {
        let container = ContainerName::for_project(project);
        let running = self.engine.inspect_running(&container).await?;

        let port = if running {
            match self.registry.port(project) {
                Some(port) => Some(port),
                None => self.engine.host_port(&container, CONTAINER_PORT).await?,
            }
        } else {
            None
        };

        let state = match self.transition(project) {
            Some(state) => state,
            None if running => InstanceState::Running,
            None => InstanceState::Absent,
        };

        Ok(ProjectStatus {
            project: project.clone(),
            container,
            state,
            running,
            port,
        })
    }

    /// Last [`LOG_TAIL_LINES`] lines of output; empty if there is no container.
    pub async fn logs(&self, project: &ProjectName) -> Result<String, LifecycleError> {
        let container = ContainerName::for_project(project);
        Ok(self.engine.logs(&container, LOG_TAIL_LINES).await?)
    }

    /// Resource snapshot of the running managed containers.
    pub async fn stats(&self) -> Result<Vec<ContainerStats>, LifecycleError> {
        let stats = self.engine.stats().await?;
        Ok(stats.into_iter().filter(|s| is_managed(&s.name)).collect())
    }

    /// Bring the registry in line with the engine.
    ///
    /// Entries whose container is not running are dropped. Running containers
    /// belonging to `projects` that have no entry are adopted with the host
    /// port the engine reports for them.
    pub async fn reconcile(
        &self,
        projects: &[ProjectName],
    ) -> Result<ReconcileReport, LifecycleError> {
        let running: HashSet<ContainerName> = self
            .engine
            .list_by_prefix(NAMESPACE_PREFIX)
            .await?
            .into_iter()
            .collect();

        let mut report = ReconcileReport {
            pruned: self
                .registry
                .retain(|record| running.contains(&record.container))
                .into_iter()
                .map(|record| record.project)
                .collect(),
            adopted: Vec::new(),
        };

        for project in projects {
            if self.registry.get(project).is_some() {
                continue;
            }
            let container = ContainerName::for_project(project);
            if !running.contains(&container) {
                continue;
            }
            let Some(port) = self.engine.host_port(&container, CONTAINER_PORT).await? else {
                continue;
            };
            self.registry.insert(InstanceRecord {
                project: project.clone(),
                container,
                port,
                started_at: Utc::now(),
            });
            report.adopted.push(project.clone());
        }

        report.pruned.sort();
        tracing::info!(
            pruned = report.pruned.len(),
            adopted = report.adopted.len(),
            "registry reconciled with engine",
        );
        Ok(report)
    }

    fn run_spec(
        &self,
        container: &ContainerName,
        dir: &Path,
        profile: &LaunchProfile,
        port: u16,
    ) -> RunSpec {
        RunSpec {
            name: container.clone(),
            image: profile.image.clone(),
            mounts: vec![Mount {
                host: dir.to_path_buf(),
                container: CONTAINER_WORKDIR.to_string(),
                relabel: true,
            }],
            port: PortMapping {
                host: port,
                container: CONTAINER_PORT,
            },
            memory_limit: self.config.memory_limit.clone(),
            workdir: Some(CONTAINER_WORKDIR.to_string()),
            command: profile.command.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // 3. Per-project serialization and in-flight state
    // -----------------------------------------------------------------------

    async fn lock_project(&self, project: &ProjectName) -> ProjectLock<'_> {
        let lock = lock_map(&self.locks)
            .entry(project.clone())
            .or_default()
            .clone();
        ProjectLock {
            guard: Some(lock.lock_owned().await),
            locks: &self.locks,
            project: project.clone(),
        }
    }

    fn begin(&self, project: &ProjectName, state: InstanceState) -> Transition<'_> {
        lock_map(&self.transitions).insert(project.clone(), state);
        Transition {
            transitions: &self.transitions,
            project: project.clone(),
        }
    }

    fn transition(&self, project: &ProjectName) -> Option<InstanceState> {
        lock_map(&self.transitions).get(project).copied()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("gate", &self.gate)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

type LockMap = Mutex<HashMap<ProjectName, Arc<tokio::sync::Mutex<()>>>>;

/// Holds a project's operation lock. On release the map entry is dropped
/// once nobody else holds or waits on it.
struct ProjectLock<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a LockMap,
    project: ProjectName,
}

impl Drop for ProjectLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = lock_map(self.locks);
        if locks
            .get(&self.project)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.project);
        }
    }
}

/// Clears the in-flight state for a project when the operation ends.
struct Transition<'a> {
    transitions: &'a Mutex<HashMap<ProjectName, InstanceState>>,
    project: ProjectName,
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        lock_map(self.transitions).remove(&self.project);
    }
}

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, LifecycleError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|err| LifecycleError::Task(err.to_string()))
}

fn lock_map<K, V>(map: &Mutex<HashMap<K, V>>) -> MutexGuard<'_, HashMap<K, V>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_engine::FakeEngine;

    fn orchestrator(dir: &Path) -> Orchestrator {
        Orchestrator::new(Arc::new(FakeEngine::new()), OrchestratorConfig::new(dir))
    }

    #[test]
    fn project_dir_is_under_clone_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = orchestrator(tmp.path());
        let project = ProjectName::new("demo-site").unwrap();
        assert_eq!(orch.project_dir(&project), tmp.path().join("demo-site"));
        assert!(!orch.is_cloned(&project));
        std::fs::create_dir(tmp.path().join("demo-site")).unwrap();
        assert!(orch.is_cloned(&project));
    }

    #[test]
    fn file_named_like_project_is_not_a_clone() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("demo"), "not a dir").unwrap();
        let orch = orchestrator(tmp.path());
        assert!(!orch.is_cloned(&ProjectName::new("demo").unwrap()));
    }

    #[test]
    fn run_spec_uses_profile_and_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(
            Arc::new(FakeEngine::new()),
            OrchestratorConfig::new(tmp.path()).with_memory_limit("2g"),
        );
        let container = ContainerName::for_project(&ProjectName::new("demo").unwrap());
        let spec = orch.run_spec(
            &container,
            tmp.path(),
            &LaunchProfile::static_files(),
            40100,
        );
        assert_eq!(spec.memory_limit, "2g");
        assert_eq!(spec.port.host, 40100);
        assert_eq!(spec.port.container, CONTAINER_PORT);
        assert_eq!(spec.mounts.len(), 1);
        assert_eq!(spec.mounts[0].container, CONTAINER_WORKDIR);
        assert_eq!(spec.workdir.as_deref(), Some(CONTAINER_WORKDIR));
    }

    #[tokio::test]
    async fn project_locks_are_released_after_use() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = orchestrator(tmp.path());
        for i in 0..50 {
            let project = ProjectName::new(format!("site-{i}")).unwrap();
            orch.stop(&project).await.unwrap();
            assert!(orch.start(&project).await.is_err());
        }
        assert!(lock_map(&orch.locks).is_empty());
    }

    #[tokio::test]
    async fn project_lock_survives_while_another_caller_waits() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = orchestrator(tmp.path());
        let project = ProjectName::new("demo").unwrap();

        let first = orch.lock_project(&project).await;
        let waiter = lock_map(&orch.locks).get(&project).cloned().unwrap();
        drop(first);
        assert!(lock_map(&orch.locks).contains_key(&project));

        drop(waiter);
        drop(orch.lock_project(&project).await);
        assert!(lock_map(&orch.locks).is_empty());
    }

    #[test]
    fn transition_guard_clears_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let orch = orchestrator(tmp.path());
        let project = ProjectName::new("demo").unwrap();
        {
            let _t = orch.begin(&project, InstanceState::Starting);
            assert_eq!(orch.transition(&project), Some(InstanceState::Starting));
        }
        assert_eq!(orch.transition(&project), None);
    }
}
