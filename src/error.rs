//! Error types for bootstrap operations.
//!
//! Every variant is fatal: the procedure halts at the first error and leaves
//! whatever earlier steps produced on disk. Variants map onto the failure
//! classes the CLI reports:
//! - missing host prerequisites
//! - unsupported interpreter versions
//! - external tool and network failures
//! - local filesystem and configuration-file problems

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while provisioning the OSWorld setup.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("{tool} was not found on PATH. {remediation}")]
    MissingPrerequisite {
        tool: String,
        remediation: String,
    },

    #[error("Interpreter '{program}' reports Python {found}, but {minimum} or newer is required")]
    UnsupportedInterpreter {
        program: String,
        found: String,
        minimum: String,
    },

    #[error("No usable Python interpreter found (Python {minimum} or newer is required)")]
    NoInterpreter { minimum: String },

    #[error("{step} failed: `{command}` exited with {code}{output}")]
    ToolFailed {
        step: String,
        command: String,
        code: String,
        output: String,
    },

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Could not create the isolated Python environment: {0}")]
    EnvironmentCreation(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Configuration file '{path}' could not be updated: {reason}")]
    EnvFile { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BootstrapError {
    /// Builds a [`BootstrapError::ToolFailed`] from a finished command.
    ///
    /// Captured stderr (or stdout when stderr is empty) is appended verbatim so
    /// the underlying tool's own message reaches the user.
    pub fn tool_failed(
        step: impl Into<String>,
        command: impl Into<String>,
        exit_code: Option<i32>,
        stdout: &str,
        stderr: &str,
    ) -> Self {
        let code = match exit_code {
            Some(code) => format!("status {code}"),
            None => "a signal".to_string(),
        };
        let captured = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        let output = if captured.is_empty() {
            String::new()
        } else {
            format!(":\n{captured}")
        };
        Self::ToolFailed {
            step: step.into(),
            command: command.into(),
            code,
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_prerequisite_message_includes_remediation() {
        let err = BootstrapError::MissingPrerequisite {
            tool: "git".into(),
            remediation: "Install git.".into(),
        };
        assert_eq!(err.to_string(), "git was not found on PATH. Install git.");
    }

    #[test]
    fn test_tool_failed_prefers_stderr() {
        let err = BootstrapError::tool_failed("Clone", "git clone x", Some(128), "out", "fatal: nope\n");
        let msg = err.to_string();
        assert!(msg.contains("status 128"));
        assert!(msg.ends_with("fatal: nope"));
        assert!(!msg.contains("out"));
    }

    #[test]
    fn test_tool_failed_without_output() {
        let err = BootstrapError::tool_failed("Install", "pip install", None, "", "  ");
        assert_eq!(err.to_string(), "Install failed: `pip install` exited with a signal");
    }
}
