//! Bounded external command execution.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::EngineError;

/// Captured result of one finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program args…` to completion, capturing stdout and stderr.
///
/// The child is killed if it has not exited within `timeout`.
pub async fn exec(
    operation: &'static str,
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput, EngineError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| EngineError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| EngineError::Spawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            tracing::warn!(
                operation,
                program,
                timeout_secs = timeout.as_secs(),
                "engine command timed out; killed",
            );
            return Err(EngineError::Timeout {
                operation,
                after: timeout,
            });
        }
    };

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn args(a: &[&str]) -> Vec<String> {
        a.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let out = exec(
            "test",
            "sh",
            &args(&["-c", "echo out; echo err >&2; exit 3"]),
            Duration::from_secs(10),
        )
        .await
        .expect("exec");
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = exec(
            "test",
            "sh",
            &args(&["-c", "sleep 5"]),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = exec(
            "test",
            "ghost-definitely-not-installed",
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }
}
