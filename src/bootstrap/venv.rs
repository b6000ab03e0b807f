//! Isolated Python environment: creation and activation.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::interpreter::Interpreter;
use super::StepOutcome;
use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::host::{CommandRunner, CommandSpec, Downloader};

/// A virtual environment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    dir: PathBuf,
}

impl VirtualEnv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding the environment's executables.
    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.dir.join("Scripts")
        } else {
            self.dir.join("bin")
        }
    }

    /// The environment's interpreter.
    pub fn python(&self) -> PathBuf {
        if cfg!(windows) {
            self.bin_dir().join("python.exe")
        } else {
            self.bin_dir().join("python")
        }
    }

    /// Variables an activation script would export.
    fn activation_env(&self) -> Vec<(String, String)> {
        let mut paths = vec![self.bin_dir()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        let path = std::env::join_paths(paths)
            .unwrap_or_else(|_| OsString::from(self.bin_dir().as_os_str()));

        vec![
            ("VIRTUAL_ENV".to_string(), self.dir.to_string_lossy().into_owned()),
            ("PATH".to_string(), path.to_string_lossy().into_owned()),
        ]
    }
}

/// Ways to build the environment, tried in [`CREATION_STRATEGIES`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationStrategy {
    /// `python -m venv` with the bundled pip.
    BundledPip,
    /// `python -m venv --without-pip`, then pip from get-pip.py.
    BootstrapPip,
}

pub const CREATION_STRATEGIES: [CreationStrategy; 2] =
    [CreationStrategy::BundledPip, CreationStrategy::BootstrapPip];

impl fmt::Display for CreationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationStrategy::BundledPip => write!(f, "venv with bundled pip"),
            CreationStrategy::BootstrapPip => write!(f, "venv without pip + get-pip.py"),
        }
    }
}

impl CreationStrategy {
    async fn apply(
        self,
        config: &BootstrapConfig,
        interpreter: &Interpreter,
        venv: &VirtualEnv,
        runner: &dyn CommandRunner,
        downloader: &dyn Downloader,
    ) -> Result<(), BootstrapError> {
        let mut create = CommandSpec::new(interpreter.program.as_str()).args(["-m", "venv"]);
        if self == CreationStrategy::BootstrapPip {
            create = create.arg("--without-pip");
        }
        let create = create.arg(venv.dir().to_string_lossy());
        runner
            .run(&create)
            .await?
            .into_result("Environment creation", &create)?;

        if self == CreationStrategy::BundledPip {
            return Ok(());
        }

        let scratch = tempfile::tempdir()?;
        let script = scratch.path().join("get-pip.py");
        downloader.download(&config.get_pip_url, &script).await?;

        let install_pip = CommandSpec::new(venv.python())
            .arg(script.to_string_lossy())
            .inherit_output();
        runner
            .run(&install_pip)
            .await?
            .into_result("pip bootstrap", &install_pip)?;
        Ok(())
    }
}

/// Deletes any previous environment and builds a new one.
///
/// A directory left behind by a failed strategy is removed before the next
/// one is tried. If every strategy fails, the last partial directory stays on
/// disk; the next run deletes it.
pub async fn create(
    config: &BootstrapConfig,
    interpreter: &Interpreter,
    runner: &dyn CommandRunner,
    downloader: &dyn Downloader,
) -> Result<(VirtualEnv, StepOutcome), BootstrapError> {
    let venv = VirtualEnv::new(config.venv_dir());
    let replaced_existing = remove_dir_if_present(venv.dir())?;
    if replaced_existing {
        info!(path = %venv.dir().display(), "Removed previous Python environment");
    }

    let mut failures = Vec::new();
    for (attempt, strategy) in CREATION_STRATEGIES.into_iter().enumerate() {
        if attempt > 0 {
            remove_dir_if_present(venv.dir())?;
        }

        info!(strategy = %strategy, interpreter = %interpreter, "Creating Python environment");
        match strategy
            .apply(config, interpreter, &venv, runner, downloader)
            .await
        {
            Ok(()) => {
                return Ok((
                    venv,
                    StepOutcome::Recreated {
                        strategy,
                        replaced_existing,
                    },
                ))
            }
            Err(e) => {
                warn!(strategy = %strategy, error = %e, "Environment creation strategy failed");
                failures.push(format!("{strategy}: {e}"));
            }
        }
    }

    Err(BootstrapError::EnvironmentCreation(failures.join("; ")))
}

fn remove_dir_if_present(dir: &Path) -> Result<bool, BootstrapError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Which environment, if any, child processes run in.
///
/// Activation is scoped: [`InterpreterContext::activate`] returns a guard that
/// puts the previous state back when dropped, including on early returns.
#[derive(Debug, Default)]
pub struct InterpreterContext {
    active: Mutex<Option<VirtualEnv>>,
}

impl InterpreterContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<VirtualEnv>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Activates `venv` until the returned guard is dropped.
    pub fn activate(&self, venv: &VirtualEnv) -> ActivationGuard<'_> {
        let prior = self.lock().replace(venv.clone());
        debug!(path = %venv.dir().display(), "Activated Python environment");
        ActivationGuard {
            context: self,
            prior,
        }
    }

    /// The active environment.
    pub fn active(&self) -> Option<VirtualEnv> {
        self.lock().clone()
    }

    /// A command running the active environment's interpreter with its
    /// activation variables set.
    pub fn python_command(&self) -> Result<CommandSpec, BootstrapError> {
        let venv = self.active().ok_or_else(|| {
            BootstrapError::EnvironmentCreation("no Python environment is active".into())
        })?;
        let mut spec = CommandSpec::new(venv.python());
        for (key, value) in venv.activation_env() {
            spec = spec.env(key, value);
        }
        Ok(spec)
    }
}

/// Restores the previous interpreter context on drop.
#[must_use = "the environment is deactivated as soon as the guard is dropped"]
pub struct ActivationGuard<'a> {
    context: &'a InterpreterContext,
    prior: Option<VirtualEnv>,
}

impl Drop for ActivationGuard<'_> {
    fn drop(&mut self) {
        *self.context.lock() = self.prior.take();
        debug!("Deactivated Python environment");
    }
}
