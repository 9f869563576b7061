//! Site listing through the Netlify CLI.

use async_trait::async_trait;
use ghost_engine::exec;
use serde::{Deserialize, Serialize};

use crate::error::DaemonError;
use crate::paths::COLLABORATOR_TIMEOUT;

/// A deployed site and the repository it builds from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub ssl_url: Option<String>,
    pub admin_url: Option<String>,
    pub deploy_url: Option<String>,
    pub repo_url: Option<String>,
}

#[async_trait]
pub trait SiteDirectory: Send + Sync {
    async fn list_sites(&self) -> Result<Vec<Site>, DaemonError>;
}

/// `netlify sites:list --json`.
#[derive(Debug, Clone)]
pub struct NetlifyCli {
    binary: String,
}

impl Default for NetlifyCli {
    fn default() -> Self {
        Self::new("netlify")
    }
}

impl NetlifyCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl SiteDirectory for NetlifyCli {
    async fn list_sites(&self) -> Result<Vec<Site>, DaemonError> {
        let args = vec!["sites:list".to_string(), "--json".to_string()];
        let out = exec("sites:list", &self.binary, &args, COLLABORATOR_TIMEOUT)
            .await
            .map_err(|err| DaemonError::Collaborator {
                tool: "netlify",
                message: err.to_string(),
            })?;
        if !out.success {
            return Err(DaemonError::Collaborator {
                tool: "netlify",
                message: out.stderr.trim().to_string(),
            });
        }
        parse_sites(&out.stdout)
    }
}

#[derive(Deserialize)]
struct RawSite {
    id: String,
    #[serde(default)]
    name: String,
    url: Option<String>,
    ssl_url: Option<String>,
    admin_url: Option<String>,
    deploy_url: Option<String>,
    #[serde(default)]
    build_settings: Option<RawBuildSettings>,
}

#[derive(Deserialize)]
struct RawBuildSettings {
    repo_url: Option<String>,
}

pub(crate) fn parse_sites(stdout: &str) -> Result<Vec<Site>, DaemonError> {
    let raw: Vec<RawSite> = serde_json::from_str(stdout.trim())?;
    Ok(raw
        .into_iter()
        .map(|s| Site {
            id: s.id,
            name: s.name,
            url: s.url,
            ssl_url: s.ssl_url,
            admin_url: s.admin_url,
            deploy_url: s.deploy_url,
            repo_url: s
                .build_settings
                .and_then(|b| b.repo_url)
                .filter(|u| !u.is_empty()),
        })
        .collect())
}
