//! `PodmanEngine` against a scripted stand-in binary.
//!
//! The script records its arguments and answers like Podman would, so the
//! client's argument construction and exit-code handling are exercised
//! without a container engine on the host.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ghost_core::{ContainerName, ProjectName};
use ghost_engine::{ContainerEngine, EngineError, Mount, PodmanEngine, PortMapping, RunSpec};
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
case "$1" in
  info) [ -f "$(dirname "$0")/down" ] && exit 125; echo "host: ok" ;;
  inspect)
    case "$4" in
      ghost_demo_site) echo "true" ;;
      ghost_stopped) echo "false" ;;
      *) echo "Error: no such object: \"$4\"" >&2; exit 125 ;;
    esac ;;
  run)
    case "$4" in
      ghost_broken) echo "Error: image not known" >&2; exit 125 ;;
      *) echo "0123456789abcdef" ;;
    esac ;;
  logs)
    case "$4" in
      ghost_demo_site) echo "ready on 3000"; echo "warn: slow" >&2 ;;
      *) echo "Error: no container with name or ID \"$4\" found" >&2; exit 125 ;;
    esac ;;
  ps) echo '[{"Names":["ghost_demo_site"]},{"Names":["postgres"]},{"Names":["ghost_blog"]}]' ;;
  stats) echo '[{"Name":"ghost_demo_site","CPUPerc":"1.0%","MemUsage":"1MB / 4GB","MemPerc":"0.1%","NetIO":"0B / 0B","BlockIO":"0B / 0B"}]' ;;
  port)
    case "$2" in
      ghost_demo_site) echo "0.0.0.0:41234" ;;
      *) echo "Error: no such container" >&2; exit 125 ;;
    esac ;;
  stop|rm) echo "Error: no such container" >&2; exit 125 ;;
  hang) sleep 10 ;;
esac
"#;

struct Fixture {
    dir: TempDir,
    engine: PodmanEngine,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let bin = dir.path().join("podman");
        fs::write(&bin, SCRIPT).expect("write script");
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).expect("chmod");
        let engine = PodmanEngine::new(bin.display().to_string(), Duration::from_secs(10));
        Self { dir, engine }
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn container(project: &str) -> ContainerName {
    ContainerName::for_project(&ProjectName::new(project).expect("project"))
}

fn spec(name: &str) -> RunSpec {
    RunSpec {
        name: ContainerName::from_engine(name),
        image: "python:3.9-slim".to_string(),
        mounts: vec![Mount {
            host: PathBuf::from("/tmp/clones/demo"),
            container: "/app".to_string(),
            relabel: true,
        }],
        port: PortMapping {
            host: 40123,
            container: 3000,
        },
        memory_limit: "4g".to_string(),
        workdir: Some("/app".to_string()),
        command: vec!["python".into(), "-m".into(), "http.server".into(), "3000".into()],
    }
}

#[tokio::test]
async fn healthy_follows_info_exit_code() {
    let fx = Fixture::new();
    assert!(fx.engine.healthy().await);
    fs::write(fx.path().join("down"), "").expect("mark down");
    assert!(!fx.engine.healthy().await);
}

#[tokio::test]
async fn inspect_running_distinguishes_running_stopped_and_absent() {
    let fx = Fixture::new();
    assert!(fx.engine.inspect_running(&container("demo-site")).await.unwrap());
    assert!(!fx
        .engine
        .inspect_running(&ContainerName::from_engine("ghost_stopped"))
        .await
        .unwrap());
    assert!(!fx.engine.inspect_running(&container("nope")).await.unwrap());
    assert_eq!(
        fx.calls()[0],
        "inspect -f {{.State.Running}} ghost_demo_site"
    );
}

#[tokio::test]
async fn run_passes_full_configuration() {
    let fx = Fixture::new();
    fx.engine.run(&spec("ghost_demo")).await.expect("run");
    assert_eq!(
        fx.calls().last().unwrap(),
        "run -d --name ghost_demo -p 40123:3000 --memory 4g --memory-swap 4g \
         -v /tmp/clones/demo:/app:Z -w /app python:3.9-slim python -m http.server 3000"
    );
}

#[tokio::test]
async fn run_failure_carries_stderr() {
    let fx = Fixture::new();
    let err = fx.engine.run(&spec("ghost_broken")).await.unwrap_err();
    match err {
        EngineError::Failed { operation, stderr } => {
            assert_eq!(operation, "run");
            assert!(stderr.contains("image not known"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn stop_and_remove_ignore_absent_containers() {
    let fx = Fixture::new();
    fx.engine.stop(&[container("gone")]).await.expect("stop");
    fx.engine.remove(&container("gone")).await.expect("rm");
    let calls = fx.calls();
    assert_eq!(calls[0], "stop ghost_gone");
    assert_eq!(calls[1], "rm -f ghost_gone");
}

#[tokio::test]
async fn bulk_stop_is_one_call_and_empty_stop_is_none() {
    let fx = Fixture::new();
    fx.engine.stop(&[]).await.expect("empty stop");
    assert!(fx.calls().is_empty());
    fx.engine
        .stop(&[container("a"), container("b")])
        .await
        .expect("stop");
    assert_eq!(fx.calls(), vec!["stop ghost_a ghost_b"]);
}

#[tokio::test]
async fn logs_combine_streams_and_are_empty_when_absent() {
    let fx = Fixture::new();
    let logs = fx.engine.logs(&container("demo-site"), 50).await.unwrap();
    assert!(logs.contains("ready on 3000"));
    assert!(logs.contains("warn: slow"));
    assert_eq!(fx.calls()[0], "logs --tail 50 ghost_demo_site");

    let none = fx.engine.logs(&container("missing"), 50).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn list_by_prefix_filters_namespace() {
    let fx = Fixture::new();
    let names = fx.engine.list_by_prefix("ghost_").await.unwrap();
    let names: Vec<&str> = names.iter().map(ContainerName::as_str).collect();
    assert_eq!(names, vec!["ghost_demo_site", "ghost_blog"]);
    assert_eq!(fx.calls()[0], "ps --filter name=ghost_ --format json");
}

#[tokio::test]
async fn stats_and_host_port() {
    let fx = Fixture::new();
    let stats = fx.engine.stats().await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].cpu.as_deref(), Some("1.0%"));

    assert_eq!(
        fx.engine.host_port(&container("demo-site"), 3000).await.unwrap(),
        Some(41234)
    );
    assert_eq!(
        fx.engine.host_port(&container("other"), 3000).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn missing_binary_is_unhealthy_not_a_panic() {
    let engine = PodmanEngine::new("/nonexistent/podman", Duration::from_secs(1));
    assert!(!engine.healthy().await);
    let err = engine.stats().await.unwrap_err();
    assert!(matches!(err, EngineError::Spawn { .. }));
}
