//! Host process and network seams.
//!
//! The bootstrap procedure never touches `git`, Python or the network
//! directly; it goes through these traits so tests can substitute recording
//! fakes for the real system.

pub mod download;
pub mod system;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::BootstrapError;

pub use download::{Downloader, HttpDownloader};
pub use system::SystemRunner;

/// How a child's stdout/stderr are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture both streams for inspection.
    Capture,
    /// Stream to the user's terminal on stderr (long-running tools).
    Inherit,
}

/// A command line to run on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: PathBuf,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory, inherited when `None`.
    pub current_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Output handling.
    pub output: OutputMode,
}

impl CommandSpec {
    /// Creates a captured command with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            output: OutputMode::Capture,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Streams output to stderr instead of capturing it.
    pub fn inherit_output(mut self) -> Self {
        self.output = OutputMode::Inherit;
        self
    }

    /// Shell-like rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| {
            if a.contains(' ') {
                format!("'{a}'")
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout (empty in [`OutputMode::Inherit`]).
    pub stdout: String,
    /// Captured stderr (empty in [`OutputMode::Inherit`]).
    pub stderr: String,
}

impl CommandOutput {
    /// A successful, silent result.
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// A failed result with the given code and stderr.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Checks if the command exited with status 0.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Converts a non-zero exit into [`BootstrapError::ToolFailed`].
    pub fn into_result(self, step: &str, spec: &CommandSpec) -> Result<Self, BootstrapError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(BootstrapError::tool_failed(
                step,
                spec.display(),
                self.exit_code,
                &self.stdout,
                &self.stderr,
            ))
        }
    }
}

/// Runs commands and answers PATH lookups on the host.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Checks whether `program` resolves on PATH.
    fn is_available(&self, program: &str) -> bool;

    /// Runs the command to completion.
    ///
    /// A non-zero exit is reported through [`CommandOutput::exit_code`]; only a
    /// failure to spawn is an `Err`.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, BootstrapError>;
}
