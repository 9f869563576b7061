//! Domain types for preview environments.
//!
//! A [`ProjectName`] is the user-visible identifier of a cloned repository.
//! Everything the engine sees is keyed by the derived [`ContainerName`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Fixed namespace prefix carried by every orchestrator-managed container.
pub const NAMESPACE_PREFIX: &str = "ghost_";

/// Port the preview service listens on inside every container.
pub const CONTAINER_PORT: u16 = 3000;

/// Mount point of the project working copy inside every container.
pub const CONTAINER_WORKDIR: &str = "/app";

/// Longest project name accepted (matches the hosting platforms' repo name limit).
pub const MAX_PROJECT_NAME_LEN: usize = 100;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A validated project identifier.
///
/// Accepted alphabet: ASCII letters, digits, `.`, `_` and `-`; never `.` or
/// `..` on its own. The name doubles as a directory name under the clone root,
/// so anything that could escape that directory is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        let invalid = |reason| CoreError::InvalidProjectName {
            name: name.clone(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.len() > MAX_PROJECT_NAME_LEN {
            return Err(invalid("name is longer than 100 bytes"));
        }
        if name == "." || name == ".." {
            return Err(invalid("name is a relative path component"));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
        {
            return Err(invalid("only ASCII letters, digits, '.', '_' and '-' are allowed"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name only uses the canonical slug alphabet `[a-z0-9-]`.
    pub fn is_canonical(&self) -> bool {
        self.0
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for ProjectName {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for ProjectName {
    type Error = CoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ProjectName> for String {
    fn from(p: ProjectName) -> Self {
        p.0
    }
}

/// Name of the container backing a project, as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerName(String);

impl ContainerName {
    /// Derive the container name for `project`.
    ///
    /// Canonical slugs map readably (`demo-site` → `ghost_demo_site`). Any
    /// other name is lower-cased with separators folded to `_`, then suffixed
    /// with `.` and the hex of its raw bytes. Canonical names never contain a
    /// `.` and the suffix is lossless, so no two projects share a container.
    pub fn for_project(project: &ProjectName) -> Self {
        let raw = project.as_str();
        if project.is_canonical() {
            return Self(format!("{NAMESPACE_PREFIX}{}", raw.replace('-', "_")));
        }

        let readable: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        Self(format!(
            "{NAMESPACE_PREFIX}{readable}.{}",
            hex::encode(raw.as_bytes())
        ))
    }

    /// Wrap a name reported by the engine. No normalization is applied.
    pub fn from_engine(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the container carries the orchestrator's namespace prefix.
    pub fn is_managed(&self) -> bool {
        is_managed(&self.0)
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for ContainerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// True when `name` belongs to the orchestrator's namespace.
pub fn is_managed(name: &str) -> bool {
    name.starts_with(NAMESPACE_PREFIX)
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle state of a project's preview instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    #[default]
    Absent,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Absent => write!(f, "absent"),
            InstanceState::Starting => write!(f, "starting"),
            InstanceState::Running => write!(f, "running"),
            InstanceState::Stopping => write!(f, "stopping"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Registry entry for a started instance. A cache, never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub project: ProjectName,
    pub container: ContainerName,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

/// Observed status of a project, re-derived from the engine on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub project: ProjectName,
    pub container: ContainerName,
    pub state: InstanceState,
    pub running: bool,
    /// Host port, only ever present while the engine reports the container running.
    pub port: Option<u16>,
}

/// One-shot resource snapshot of a single container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub name: String,
    pub cpu: Option<String>,
    pub mem: Option<String>,
    pub mem_percent: Option<String>,
    pub net_io: Option<String>,
    pub block_io: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
