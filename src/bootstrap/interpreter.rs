//! Interpreter selection for the isolated environment.
//!
//! Candidates are tried in order and the first acceptable one wins:
//!
//! | candidate            | accepted when                       |
//! |----------------------|-------------------------------------|
//! | `python3.<minor>`    | on PATH and runs `--version`        |
//! | `python3`            | on PATH and reports ≥ the minimum   |
//!
//! Selection only inspects the host, so a rejection happens before any
//! environment directory is touched.

use std::fmt;

use semver::Version;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::BootstrapError;
use crate::host::{CommandRunner, CommandSpec};

/// How a candidate's version is established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// The executable name pins the minor version.
    ImpliedByName(Version),
    /// The reported version must meet the minimum.
    Reported,
}

/// One row of the selection table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterCandidate {
    pub program: String,
    pub check: VersionCheck,
}

/// The chosen interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interpreter {
    pub program: String,
    pub version: Version,
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.program, self.version)
    }
}

/// Ordered candidates for the given minimum version.
pub fn candidates(minimum: &Version) -> Vec<InterpreterCandidate> {
    vec![
        InterpreterCandidate {
            program: format!("python{}.{}", minimum.major, minimum.minor),
            check: VersionCheck::ImpliedByName(Version::new(minimum.major, minimum.minor, 0)),
        },
        InterpreterCandidate {
            program: "python3".to_string(),
            check: VersionCheck::Reported,
        },
    ]
}

/// Picks the first acceptable interpreter.
pub async fn select(
    runner: &dyn CommandRunner,
    minimum: &Version,
) -> Result<Interpreter, BootstrapError> {
    let mut rejected = None;

    for candidate in candidates(minimum) {
        if !runner.is_available(&candidate.program) {
            debug!(program = %candidate.program, "Interpreter candidate not on PATH");
            continue;
        }

        let version = match (&candidate.check, query_version(runner, &candidate.program).await) {
            (_, VersionReport::Unusable) => {
                debug!(program = %candidate.program, "Interpreter candidate failed to report its version");
                continue;
            }
            (_, VersionReport::Reported(v)) => v,
            (VersionCheck::ImpliedByName(implied), VersionReport::Unrecognized) => implied.clone(),
            (VersionCheck::Reported, VersionReport::Unrecognized) => {
                debug!(program = %candidate.program, "Could not determine interpreter version");
                continue;
            }
        };

        if version_satisfies(&version, minimum) {
            info!(program = %candidate.program, version = %version, "Selected Python interpreter");
            return Ok(Interpreter {
                program: candidate.program,
                version,
            });
        }

        rejected.get_or_insert(BootstrapError::UnsupportedInterpreter {
            program: candidate.program,
            found: version.to_string(),
            minimum: minimum.to_string(),
        });
    }

    Err(rejected.unwrap_or_else(|| BootstrapError::NoInterpreter {
        minimum: minimum.to_string(),
    }))
}

/// Compares release numbers only; pre-release tags are ignored.
pub fn version_satisfies(version: &Version, minimum: &Version) -> bool {
    (version.major, version.minor, version.patch) >= (minimum.major, minimum.minor, minimum.patch)
}

/// What `<program> --version` told us.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionReport {
    /// The program could not be started or exited non-zero.
    Unusable,
    /// The program ran but printed nothing recognizable.
    Unrecognized,
    Reported(Version),
}

async fn query_version(runner: &dyn CommandRunner, program: &str) -> VersionReport {
    let spec = CommandSpec::new(program).arg("--version");
    let output = match runner.run(&spec).await {
        Ok(output) if output.is_success() => output,
        _ => return VersionReport::Unusable,
    };
    // Python 2 prints its version on stderr.
    parse_python_version(&output.stdout)
        .or_else(|| parse_python_version(&output.stderr))
        .map_or(VersionReport::Unrecognized, VersionReport::Reported)
}

/// Parses `Python 3.11.4`, `Python 3.13.0rc2` or a bare `3.12`.
pub fn parse_python_version(text: &str) -> Option<Version> {
    let token = text
        .split_whitespace()
        .skip_while(|t| t.eq_ignore_ascii_case("python"))
        .next()?;

    let mut numbers = token.split('.').map(|part| {
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        digits.parse::<u64>().ok()
    });

    let major = numbers.next()??;
    let minor = numbers.next().flatten().unwrap_or(0);
    let patch = numbers.next().flatten().unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::host::CommandOutput;

    /// Answers `--version` per program; anything not listed is off PATH.
    struct Versions(&'static [(&'static str, Option<i32>, &'static str)]);

    #[async_trait]
    impl CommandRunner for Versions {
        fn is_available(&self, program: &str) -> bool {
            self.0.iter().any(|(name, _, _)| *name == program)
        }

        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, BootstrapError> {
            let program = spec.program.to_string_lossy();
            let (_, exit_code, stdout) = self
                .0
                .iter()
                .find(|(name, _, _)| *name == program)
                .copied()
                .ok_or_else(|| BootstrapError::Spawn {
                    command: spec.display(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })?;
            Ok(CommandOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        }
    }

    #[test]
    fn test_parse_python_version() {
        assert_eq!(parse_python_version("Python 3.11.4\n"), Some(Version::new(3, 11, 4)));
        assert_eq!(parse_python_version("Python 3.13.0rc2"), Some(Version::new(3, 13, 0)));
        assert_eq!(parse_python_version("3.12"), Some(Version::new(3, 12, 0)));
        assert_eq!(parse_python_version("Python 2.7.18"), Some(Version::new(2, 7, 18)));
        assert_eq!(parse_python_version(""), None);
        assert_eq!(parse_python_version("command not found"), None);
    }

    #[test]
    fn test_version_satisfies_ignores_prerelease() {
        let min = Version::new(3, 10, 0);
        assert!(version_satisfies(&Version::parse("3.10.0-rc.1").unwrap(), &min));
        assert!(version_satisfies(&Version::new(3, 12, 1), &min));
        assert!(!version_satisfies(&Version::new(3, 9, 18), &min));
    }

    #[test]
    fn test_candidates_prefer_versioned_name() {
        let list = candidates(&Version::new(3, 10, 0));
        assert_eq!(list[0].program, "python3.10");
        assert_eq!(list[0].check, VersionCheck::ImpliedByName(Version::new(3, 10, 0)));
        assert_eq!(list[1].program, "python3");
        assert_eq!(list[1].check, VersionCheck::Reported);
    }

    #[tokio::test]
    async fn test_broken_versioned_interpreter_falls_through_to_python3() {
        let runner = Versions(&[
            ("python3.10", Some(1), ""),
            ("python3", Some(0), "Python 3.11.9\n"),
        ]);
        let chosen = select(&runner, &Version::new(3, 10, 0)).await.unwrap();
        assert_eq!(chosen.program, "python3");
        assert_eq!(chosen.version, Version::new(3, 11, 9));
    }

    #[tokio::test]
    async fn test_killed_versioned_interpreter_is_not_usable() {
        let runner = Versions(&[("python3.10", None, "")]);
        let err = select(&runner, &Version::new(3, 10, 0)).await.unwrap_err();
        assert!(matches!(err, BootstrapError::NoInterpreter { .. }));
    }

    #[tokio::test]
    async fn test_unrecognized_output_falls_back_to_implied_version() {
        let runner = Versions(&[("python3.10", Some(0), "custom build\n")]);
        let chosen = select(&runner, &Version::new(3, 10, 0)).await.unwrap();
        assert_eq!(chosen.program, "python3.10");
        assert_eq!(chosen.version, Version::new(3, 10, 0));
    }
}
