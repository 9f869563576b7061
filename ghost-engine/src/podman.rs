//! Podman CLI client.
//!
//! Every operation is one `podman …` invocation bounded by the configured
//! timeout. Any binary with a Podman-compatible CLI can be used.

use std::time::Duration;

use async_trait::async_trait;
use ghost_core::{ContainerName, ContainerStats};
use serde_json::Value;

use crate::command::{exec, CommandOutput};
use crate::engine::{ContainerEngine, RecoveryAction, RunSpec};
use crate::error::EngineError;

pub const DEFAULT_BINARY: &str = "podman";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PodmanEngine {
    binary: String,
    timeout: Duration,
}

impl Default for PodmanEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY, DEFAULT_TIMEOUT)
    }
}

impl PodmanEngine {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn podman(
        &self,
        operation: &'static str,
        args: Vec<String>,
    ) -> Result<CommandOutput, EngineError> {
        tracing::debug!(operation, binary = %self.binary, ?args, "engine call");
        exec(operation, &self.binary, &args, self.timeout).await
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

#[async_trait]
impl ContainerEngine for PodmanEngine {
    async fn healthy(&self) -> bool {
        match self.podman("info", strings(&["info"])).await {
            Ok(out) => out.success,
            Err(err) => {
                tracing::debug!(error = %err, "engine info failed");
                false
            }
        }
    }

    async fn run_recovery(&self, action: &RecoveryAction) -> Result<(), EngineError> {
        let out = exec("recovery", &action.program, &action.args, self.timeout).await?;
        if out.success {
            Ok(())
        } else {
            Err(EngineError::Failed {
                operation: "recovery",
                stderr: out.stderr.trim().to_string(),
            })
        }
    }

    async fn inspect_running(&self, name: &ContainerName) -> Result<bool, EngineError> {
        let out = self
            .podman(
                "inspect",
                strings(&["inspect", "-f", "{{.State.Running}}", name.as_str()]),
            )
            .await?;
        // Non-zero exit means "no such container", which is simply not running.
        Ok(out.success && out.stdout.trim() == "true")
    }

    async fn remove(&self, name: &ContainerName) -> Result<(), EngineError> {
        let out = self
            .podman("rm", strings(&["rm", "-f", name.as_str()]))
            .await?;
        if !out.success {
            tracing::debug!(container = %name, stderr = %out.stderr.trim(), "rm reported failure; ignored");
        }
        Ok(())
    }

    async fn run(&self, spec: &RunSpec) -> Result<(), EngineError> {
        let out = self.podman("run", spec.to_args()).await?;
        if out.success {
            Ok(())
        } else {
            Err(EngineError::Failed {
                operation: "run",
                stderr: out.stderr,
            })
        }
    }

    async fn stop(&self, names: &[ContainerName]) -> Result<(), EngineError> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec!["stop".to_string()];
        args.extend(names.iter().map(|n| n.to_string()));
        let out = self.podman("stop", args).await?;
        if !out.success {
            tracing::debug!(stderr = %out.stderr.trim(), "stop reported failure; ignored");
        }
        Ok(())
    }

    async fn logs(&self, name: &ContainerName, tail: usize) -> Result<String, EngineError> {
        let out = self
            .podman(
                "logs",
                vec![
                    "logs".to_string(),
                    "--tail".to_string(),
                    tail.to_string(),
                    name.to_string(),
                ],
            )
            .await?;
        if !out.success {
            return Ok(String::new());
        }
        Ok(format!("{}{}", out.stdout, out.stderr))
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ContainerName>, EngineError> {
        let out = self
            .podman(
                "ps",
                vec![
                    "ps".to_string(),
                    "--filter".to_string(),
                    format!("name={prefix}"),
                    "--format".to_string(),
                    "json".to_string(),
                ],
            )
            .await?;
        if !out.success {
            return Err(EngineError::Failed {
                operation: "ps",
                stderr: out.stderr,
            });
        }
        parse_ps_names(&out.stdout, prefix)
    }

    async fn stats(&self) -> Result<Vec<ContainerStats>, EngineError> {
        let out = self
            .podman(
                "stats",
                strings(&["stats", "--no-stream", "--format", "json"]),
            )
            .await?;
        if !out.success {
            return Err(EngineError::Failed {
                operation: "stats",
                stderr: out.stderr,
            });
        }
        parse_stats(&out.stdout)
    }

    async fn host_port(
        &self,
        name: &ContainerName,
        container_port: u16,
    ) -> Result<Option<u16>, EngineError> {
        let out = self
            .podman(
                "port",
                vec![
                    "port".to_string(),
                    name.to_string(),
                    format!("{container_port}/tcp"),
                ],
            )
            .await?;
        if !out.success {
            return Ok(None);
        }
        Ok(parse_port_output(&out.stdout))
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

/// Names from `ps --format json`, keeping only those starting with `prefix`.
///
/// `Names` is a list in Podman and a plain string in Docker-compatible output.
pub(crate) fn parse_ps_names(stdout: &str, prefix: &str) -> Result<Vec<ContainerName>, EngineError> {
    let entries = parse_json_array("ps", stdout)?;
    let names = entries
        .iter()
        .filter_map(|entry| match entry.get("Names") {
            Some(Value::Array(list)) => list.first().and_then(Value::as_str),
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        })
        .filter(|name| !name.is_empty() && name.starts_with(prefix))
        .map(ContainerName::from_engine)
        .collect();
    Ok(names)
}

/// Rows from `stats --no-stream --format json`.
pub(crate) fn parse_stats(stdout: &str) -> Result<Vec<ContainerStats>, EngineError> {
    let entries = parse_json_array("stats", stdout)?;
    let stats = entries
        .iter()
        .filter_map(|item| {
            let name = field(item, "Name").or_else(|| field(item, "Container"))?;
            Some(ContainerStats {
                name,
                cpu: field(item, "CPUPerc"),
                mem: field(item, "MemUsage"),
                mem_percent: field(item, "MemPerc"),
                net_io: field(item, "NetIO"),
                block_io: field(item, "BlockIO"),
            })
        })
        .collect();
    Ok(stats)
}

/// First host port in `port` output such as `0.0.0.0:41234` or `[::]:41234`.
pub(crate) fn parse_port_output(stdout: &str) -> Option<u16> {
    stdout
        .lines()
        .filter_map(|line| line.trim().rsplit(':').next())
        .find_map(|p| p.parse().ok())
}

fn parse_json_array(operation: &'static str, stdout: &str) -> Result<Vec<Value>, EngineError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(EngineError::Parse {
            operation,
            message: format!("expected a JSON array, got {}", kind_of(&other)),
        }),
        Err(err) => Err(EngineError::Parse {
            operation,
            message: err.to_string(),
        }),
    }
}

fn field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ps_names_from_podman_lists_and_docker_strings() {
        let stdout = r#"[
            {"Names": ["ghost_demo_site"], "State": "running"},
            {"Names": "ghost_blog"},
            {"Names": ["my_ghost_thing"]},
            {"Names": []},
            {"Id": "abc"}
        ]"#;
        let names = parse_ps_names(stdout, "ghost_").expect("parse");
        let names: Vec<&str> = names.iter().map(ContainerName::as_str).collect();
        assert_eq!(names, vec!["ghost_demo_site", "ghost_blog"]);
    }

    #[test]
    fn empty_ps_output_is_no_containers() {
        assert!(parse_ps_names("", "ghost_").unwrap().is_empty());
        assert!(parse_ps_names("[]\n", "ghost_").unwrap().is_empty());
        assert!(parse_ps_names("null", "ghost_").unwrap().is_empty());
    }

    #[test]
    fn garbage_ps_output_is_parse_error() {
        let err = parse_ps_names("Error: something", "ghost_").unwrap_err();
        assert!(matches!(err, EngineError::Parse { operation: "ps", .. }));
        let err = parse_ps_names("{}", "ghost_").unwrap_err();
        assert!(err.to_string().contains("an object"));
    }

    #[test]
    fn stats_fields_are_mapped() {
        let stdout = r#"[
            {"Name": "ghost_demo_site", "CPUPerc": "1.50%", "MemUsage": "120MB / 4GB",
             "MemPerc": "2.93%", "NetIO": "1kB / 2kB", "BlockIO": "0B / 0B"},
            {"Container": "postgres", "CPUPerc": 0.3},
            {"CPUPerc": "9%"}
        ]"#;
        let stats = parse_stats(stdout).expect("parse");
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "ghost_demo_site");
        assert_eq!(stats[0].cpu.as_deref(), Some("1.50%"));
        assert_eq!(stats[0].mem_percent.as_deref(), Some("2.93%"));
        assert_eq!(stats[1].name, "postgres");
        assert_eq!(stats[1].cpu.as_deref(), Some("0.3"));
        assert!(stats[1].block_io.is_none());
    }

    #[test]
    fn port_output_parsing() {
        assert_eq!(parse_port_output("0.0.0.0:41234\n"), Some(41234));
        assert_eq!(parse_port_output("[::]:40001\n0.0.0.0:40001\n"), Some(40001));
        assert_eq!(parse_port_output(""), None);
        assert_eq!(parse_port_output("garbage"), None);
    }
}
