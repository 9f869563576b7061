//! The container engine interface and the run configuration it consumes.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use ghost_core::{ContainerName, ContainerStats};

use crate::error::EngineError;

/// Host directory mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    /// Ask the engine to relabel the directory for SELinux (`:Z`).
    pub relabel: bool,
}

/// One published port: `host` on the host maps to `container` inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

/// Everything needed to start one detached container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub name: ContainerName,
    pub image: String,
    pub mounts: Vec<Mount>,
    pub port: PortMapping,
    /// Hard memory ceiling, also used as the memory+swap ceiling.
    pub memory_limit: String,
    pub workdir: Option<String>,
    pub command: Vec<String>,
}

impl RunSpec {
    /// Engine CLI arguments for `run`, starting with the subcommand.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.to_string(),
            "-p".to_string(),
            format!("{}:{}", self.port.host, self.port.container),
            "--memory".to_string(),
            self.memory_limit.clone(),
            "--memory-swap".to_string(),
            self.memory_limit.clone(),
        ];
        for mount in &self.mounts {
            let suffix = if mount.relabel { ":Z" } else { "" };
            args.push("-v".to_string());
            args.push(format!(
                "{}:{}{suffix}",
                mount.host.display(),
                mount.container
            ));
        }
        if let Some(dir) = &self.workdir {
            args.push("-w".to_string());
            args.push(dir.clone());
        }
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// A host command tried when the engine is unreachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryAction {
    pub program: String,
    pub args: Vec<String>,
}

impl RecoveryAction {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Rootless Podman service entry points, socket first.
    pub fn podman_defaults() -> Vec<Self> {
        vec![
            Self::new("systemctl", &["--user", "start", "podman.socket"]),
            Self::new("systemctl", &["--user", "start", "podman"]),
        ]
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Operations the orchestrator needs from the host's container engine.
///
/// `remove` and `stop` treat an absent container as success. `logs` returns
/// an empty string for an absent container; `inspect_running` returns false.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// True when the engine daemon answers its info query.
    async fn healthy(&self) -> bool;

    /// Run one recovery action. The outcome is only informational; callers
    /// re-check [`ContainerEngine::healthy`] afterwards.
    async fn run_recovery(&self, action: &RecoveryAction) -> Result<(), EngineError>;

    async fn inspect_running(&self, name: &ContainerName) -> Result<bool, EngineError>;

    async fn remove(&self, name: &ContainerName) -> Result<(), EngineError>;

    async fn run(&self, spec: &RunSpec) -> Result<(), EngineError>;

    /// Stop every named container in one engine call.
    async fn stop(&self, names: &[ContainerName]) -> Result<(), EngineError>;

    /// Last `tail` lines of combined stdout and stderr.
    async fn logs(&self, name: &ContainerName, tail: usize) -> Result<String, EngineError>;

    /// Running containers whose name starts with `prefix`.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ContainerName>, EngineError>;

    /// One-shot resource snapshot of every running container.
    async fn stats(&self) -> Result<Vec<ContainerStats>, EngineError>;

    /// Host port published for `container_port`, if the container is running.
    async fn host_port(
        &self,
        name: &ContainerName,
        container_port: u16,
    ) -> Result<Option<u16>, EngineError>;
}
