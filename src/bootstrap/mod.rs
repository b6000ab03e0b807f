//! The OSWorld bootstrap procedure.
//!
//! # Steps
//!
//! ```text
//! prerequisites → repository → environment → dependencies → VM → .env
//! ```
//!
//! Each step runs to completion before the next starts and any error halts
//! the run without rolling back earlier steps. Dependencies and the VM step
//! run inside an [`ActivationGuard`], so the isolated environment is
//! deactivated on every exit path.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use colabgame_setup::bootstrap::Bootstrapper;
//! use colabgame_setup::config::BootstrapConfig;
//! use colabgame_setup::host::{HttpDownloader, SystemRunner};
//!
//! let config = BootstrapConfig::new("/home/me/OSWorld").with_skip_vm(true);
//! let bootstrapper = Bootstrapper::new(
//!     config,
//!     Arc::new(SystemRunner::new()),
//!     Arc::new(HttpDownloader::new()?),
//! );
//! let report = bootstrapper.run().await?;
//! println!("{report}");
//! ```

pub mod install;
pub mod interpreter;
pub mod prerequisites;
pub mod repository;
pub mod venv;
pub mod vm;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::{BootstrapConfig, VM_PATH_KEY};
use crate::env_file::{self, Upsert};
use crate::error::BootstrapError;
use crate::host::{CommandRunner, Downloader};

pub use interpreter::Interpreter;
pub use venv::{ActivationGuard, CreationStrategy, InterpreterContext, VirtualEnv};

const VM_PATH_COMMENT: &str = "OSWorld VM descriptor (written by colabgame-setup)";

/// A step of the bootstrap procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Prerequisites,
    Repository,
    Environment,
    Dependencies,
    VirtualMachine,
    Configuration,
}

/// How a step behaves when the procedure is run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Idempotence {
    /// Inspects the host only.
    ReadOnly,
    /// Existence-checked; a present artifact is reused as-is.
    ReuseIfPresent,
    /// Deleted and rebuilt on every run.
    Recreate,
    /// Re-executed on every run against the current state.
    Reinstall,
    /// Edits an existing entry or adds it; never duplicates.
    UpdateInPlace,
}

impl Step {
    /// All steps in execution order.
    pub const ALL: [Step; 6] = [
        Step::Prerequisites,
        Step::Repository,
        Step::Environment,
        Step::Dependencies,
        Step::VirtualMachine,
        Step::Configuration,
    ];

    /// Re-run behavior of this step.
    pub fn idempotence(&self) -> Idempotence {
        match self {
            Step::Prerequisites => Idempotence::ReadOnly,
            Step::Repository => Idempotence::ReuseIfPresent,
            Step::Environment => Idempotence::Recreate,
            Step::Dependencies => Idempotence::Reinstall,
            Step::VirtualMachine => Idempotence::ReuseIfPresent,
            Step::Configuration => Idempotence::UpdateInPlace,
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Step::Prerequisites => "Prerequisites",
            Step::Repository => "OSWorld repository",
            Step::Environment => "Python environment",
            Step::Dependencies => "Dependencies",
            Step::VirtualMachine => "VM image",
            Step::Configuration => "Configuration",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Verified,
    Reused,
    Fetched,
    Recreated {
        strategy: CreationStrategy,
        replaced_existing: bool,
    },
    Installed,
    Skipped,
    Written {
        change: Upsert,
    },
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Verified => write!(f, "verified"),
            StepOutcome::Reused => write!(f, "already present, reused"),
            StepOutcome::Fetched => write!(f, "fetched"),
            StepOutcome::Recreated {
                strategy,
                replaced_existing,
            } => {
                let verb = if *replaced_existing { "recreated" } else { "created" };
                write!(f, "{verb} ({strategy})")
            }
            StepOutcome::Installed => write!(f, "installed"),
            StepOutcome::Skipped => write!(f, "skipped"),
            StepOutcome::Written { change } => match change {
                Upsert::Appended => write!(f, "entry added"),
                Upsert::Replaced => write!(f, "entry updated"),
                Upsert::Unchanged => write!(f, "entry unchanged"),
            },
        }
    }
}

/// One executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub idempotence: Idempotence,
    pub outcome: StepOutcome,
}

/// Summary of a successful bootstrap run.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub osworld_dir: PathBuf,
    pub env_file: PathBuf,
    pub vm_path: Option<PathBuf>,
    pub vm_present: bool,
    pub interpreter: Option<Interpreter>,
    pub steps: Vec<StepRecord>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BootstrapReport {
    fn new(config: &BootstrapConfig) -> Self {
        Self {
            osworld_dir: config.osworld_dir.clone(),
            env_file: config.env_file.clone(),
            vm_path: None,
            vm_present: false,
            interpreter: None,
            steps: Vec::new(),
            completed_at: None,
        }
    }

    fn record(&mut self, step: Step, outcome: StepOutcome) {
        info!(step = %step, outcome = %outcome, "Step complete");
        self.steps.push(StepRecord {
            step,
            idempotence: step.idempotence(),
            outcome,
        });
    }

    /// Outcome recorded for `step`, if it ran.
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|r| r.step == step)
            .map(|r| &r.outcome)
    }
}

impl fmt::Display for BootstrapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OSWorld setup complete")?;
        writeln!(f, "  OSWorld:     {}", self.osworld_dir.display())?;
        if let Some(interpreter) = &self.interpreter {
            writeln!(f, "  Python:      {interpreter}")?;
        }
        for record in &self.steps {
            writeln!(f, "  {:<20} {}", format!("{}:", record.step), record.outcome)?;
        }
        if let Some(vm_path) = &self.vm_path {
            let note = if self.vm_present { "" } else { " (not yet downloaded)" };
            writeln!(f, "  {VM_PATH_KEY}:     {}{note}", vm_path.display())?;
        }
        write!(f, "  Config file: {}", self.env_file.display())
    }
}

/// Runs the bootstrap procedure against a host.
pub struct Bootstrapper {
    config: BootstrapConfig,
    runner: Arc<dyn CommandRunner>,
    downloader: Arc<dyn Downloader>,
    context: InterpreterContext,
}

impl Bootstrapper {
    /// Creates a bootstrapper for the given configuration and host seams.
    pub fn new(
        config: BootstrapConfig,
        runner: Arc<dyn CommandRunner>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            config,
            runner,
            downloader,
            context: InterpreterContext::new(),
        }
    }

    /// Interpreter context shared by the steps that run inside the environment.
    pub fn context(&self) -> &InterpreterContext {
        &self.context
    }

    /// Runs every step in order.
    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        let config = &self.config;
        let runner = self.runner.as_ref();
        let mut report = BootstrapReport::new(config);

        info!(osworld_dir = %config.osworld_dir.display(), skip_vm = config.skip_vm, "Starting OSWorld setup");

        prerequisites::verify(runner)?;
        report.record(Step::Prerequisites, StepOutcome::Verified);

        let outcome = repository::acquire(config, runner).await?;
        report.record(Step::Repository, outcome);

        let interpreter = interpreter::select(runner, &config.min_python).await?;
        report.interpreter = Some(interpreter.clone());

        let (venv, outcome) =
            venv::create(config, &interpreter, runner, self.downloader.as_ref()).await?;
        report.record(Step::Environment, outcome);

        let vm_path = {
            let _active = self.context.activate(&venv);

            install::install(config, &self.context, runner).await?;
            report.record(Step::Dependencies, StepOutcome::Installed);

            let (vm_path, outcome) = vm::acquire(config, &self.context, runner).await?;
            report.record(Step::VirtualMachine, outcome);
            vm_path
        };

        report.vm_present = vm_path.is_file();
        let change = env_file::persist_entry(
            &config.env_file,
            VM_PATH_KEY,
            &vm_path.to_string_lossy(),
            Some(VM_PATH_COMMENT),
        )?;
        report.record(Step::Configuration, StepOutcome::Written { change });

        report.vm_path = Some(vm_path);
        report.completed_at = Some(Utc::now());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_idempotence_classes() {
        assert_eq!(Step::Prerequisites.idempotence(), Idempotence::ReadOnly);
        assert_eq!(Step::Repository.idempotence(), Idempotence::ReuseIfPresent);
        assert_eq!(Step::Environment.idempotence(), Idempotence::Recreate);
        assert_eq!(Step::Dependencies.idempotence(), Idempotence::Reinstall);
        assert_eq!(Step::VirtualMachine.idempotence(), Idempotence::ReuseIfPresent);
        assert_eq!(Step::Configuration.idempotence(), Idempotence::UpdateInPlace);
    }

    #[test]
    fn test_outcome_display() {
        let outcome = StepOutcome::Recreated {
            strategy: CreationStrategy::BootstrapPip,
            replaced_existing: true,
        };
        assert_eq!(outcome.to_string(), "recreated (venv without pip + get-pip.py)");
        assert_eq!(
            StepOutcome::Written { change: Upsert::Replaced }.to_string(),
            "entry updated"
        );
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(StepOutcome::Written { change: Upsert::Appended }).unwrap();
        assert_eq!(json["status"], "written");
        assert_eq!(json["change"], "appended");
    }
}
