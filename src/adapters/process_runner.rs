use std::process::Stdio;

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};

use crate::ports::process::{CommandOutput, CommandRunner, CommandSpec, ProcessError, ProcessResult};

/// Runs commands with `tokio::process`, never through a shell.
///
/// The child is killed when its future is dropped, which is what enforces the timeout.
#[derive(Debug, Default, Clone)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> ProcessResult<CommandOutput> {
        tracing::debug!(command = %spec, timeout = ?spec.timeout, "Running command");

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let output = match timeout(spec.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ProcessError::Io {
                program: spec.program.clone(),
                source,
            })?,
            Err(_) => {
                tracing::warn!(command = %spec, timeout = ?spec.timeout, "Command timed out");
                return Err(ProcessError::Timeout {
                    program: spec.program.clone(),
                    timeout: spec.timeout,
                });
            }
        };

        let output = CommandOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(command = %spec, status = ?output.status_code, "Command finished");
        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn spec(program: &str, args: &[&str], timeout: Duration) -> CommandSpec {
        CommandSpec::new(program, timeout).args(args.iter().copied())
    }

    #[tokio::test]
    async fn test_successful_command() {
        let runner = TokioCommandRunner::new();
        let output = runner
            .run(&spec("sh", &["-c", "echo hello"], Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_failing_command_is_not_an_error() {
        let runner = TokioCommandRunner::new();
        let output = runner
            .run(&spec(
                "sh",
                &["-c", "echo broken >&2; exit 3"],
                Duration::from_secs(5),
            ))
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.status_code, Some(3));
        assert_eq!(output.summary(), "broken");
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_expanded() {
        let runner = TokioCommandRunner::new();
        let output = runner
            .run(&spec("echo", &["$HOME;", "id"], Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "$HOME; id");
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let runner = TokioCommandRunner::new();
        let started = Instant::now();
        let err = runner
            .run(&spec("sleep", &["10"], Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = TokioCommandRunner::new();
        let err = runner
            .run(&spec(
                "definitely-not-a-real-program-7f3a",
                &[],
                Duration::from_secs(1),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
