//! Working copies through the `git` CLI.

use std::path::Path;

use async_trait::async_trait;
use ghost_engine::exec;
use serde::Serialize;

use crate::error::DaemonError;
use crate::paths::COLLABORATOR_TIMEOUT;

#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Clone `url` into `target`, which must not exist yet.
    async fn clone_repo(&self, url: &str, target: &Path) -> Result<(), DaemonError>;
}

#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn clone_repo(&self, url: &str, target: &Path) -> Result<(), DaemonError> {
        let args = vec![
            "clone".to_string(),
            "--".to_string(),
            url.to_string(),
            target.display().to_string(),
        ];
        let out = exec("clone", &self.binary, &args, COLLABORATOR_TIMEOUT)
            .await
            .map_err(|err| DaemonError::Collaborator {
                tool: "git",
                message: err.to_string(),
            })?;
        if out.success {
            Ok(())
        } else {
            Err(DaemonError::Collaborator {
                tool: "git",
                message: out.stderr.trim().to_string(),
            })
        }
    }
}

/// Result reported by the clone endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneStatus {
    Exists,
    Success,
    Error,
}

/// Repository name from a clone URL: last path segment without `.git`.
///
/// Handles `https://host/org/repo.git`, `git@host:org/repo.git` and
/// trailing slashes. Returns `None` when nothing is left.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let last = url
        .trim()
        .trim_end_matches('/')
        .rsplit(&['/', ':'][..])
        .next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://github.com/acme/demo-site", Some("demo-site"))]
    #[case("https://github.com/acme/demo-site.git", Some("demo-site"))]
    #[case("https://github.com/acme/demo-site/", Some("demo-site"))]
    #[case("git@github.com:acme/blog.git", Some("blog"))]
    #[case("git@github.com:blog.git", Some("blog"))]
    #[case("https://gitlab.com/acme/example.com", Some("example.com"))]
    #[case("", None)]
    #[case("https://github.com/acme/.git", None)]
    fn repo_names(#[case] url: &str, #[case] expected: Option<&str>) {
        assert_eq!(repo_name_from_url(url).as_deref(), expected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_clone_reports_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let git = GitCli::new("git");
        let target = tmp.path().join("nope");
        // A local path that does not exist fails without touching the network.
        let missing = tmp.path().join("missing-repo");
        let result = git
            .clone_repo(&missing.display().to_string(), &target)
            .await;
        match result {
            Err(DaemonError::Collaborator { tool, .. }) => assert_eq!(tool, "git"),
            other => panic!("expected Collaborator error, got {other:?}"),
        }
    }
}
