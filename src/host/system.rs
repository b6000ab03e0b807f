//! Real host runner backed by `tokio::process` and PATH lookup.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, CommandRunner, CommandSpec, OutputMode};
use crate::error::BootstrapError;

/// Runs commands on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Creates a new runner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, BootstrapError> {
        debug!(command = %spec.display(), cwd = ?spec.current_dir, "Running host command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(Stdio::null());
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let spawn_err = |source: std::io::Error| BootstrapError::Spawn {
            command: spec.display(),
            source,
        };

        match spec.output {
            OutputMode::Inherit => {
                // stdout is reserved for the run report.
                let status = cmd
                    .stdout(Stdio::from(std::io::stderr()))
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(spawn_err)?;
                Ok(CommandOutput {
                    exit_code: status.code(),
                    ..CommandOutput::default()
                })
            }
            OutputMode::Capture => {
                let output = cmd.output().await.map_err(spawn_err)?;
                let result = CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };
                debug!(exit_code = ?result.exit_code, "Host command finished");
                Ok(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_program_is_unavailable() {
        let runner = SystemRunner::new();
        assert!(!runner.is_available("colabgame-definitely-not-a-real-tool"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        let runner = SystemRunner::new();
        let ok = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo hello; echo oops >&2"]))
            .await
            .unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.stdout.trim(), "hello");
        assert_eq!(ok.stderr.trim(), "oops");

        let failed = runner
            .run(&CommandSpec::new("sh").args(["-c", "exit 3"]))
            .await
            .unwrap();
        assert_eq!(failed.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let runner = SystemRunner::new();
        let err = runner
            .run(&CommandSpec::new("colabgame-definitely-not-a-real-tool"))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Spawn { .. }));
    }
}
