//! Host tool checks.

use tracing::debug;

use crate::error::BootstrapError;
use crate::host::CommandRunner;

/// A host tool the procedure cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prerequisite {
    /// Executable looked up on PATH.
    pub program: &'static str,
    /// Shown when the executable is missing.
    pub remediation: &'static str,
}

/// Checked in this order; later steps assume all of them.
pub const PREREQUISITES: [Prerequisite; 3] = [
    Prerequisite {
        program: "python3",
        remediation: "Install Python 3.10 or newer (https://www.python.org/downloads/) and make sure `python3` is on PATH.",
    },
    Prerequisite {
        program: "git",
        remediation: "Install git (https://git-scm.com/downloads).",
    },
    Prerequisite {
        program: "vmrun",
        remediation: "Install VMware Workstation Pro (Linux/Windows) or VMware Fusion (macOS) and add the directory containing `vmrun` to PATH.",
    },
];

/// Fails on the first missing tool.
pub fn verify(runner: &dyn CommandRunner) -> Result<(), BootstrapError> {
    for prerequisite in &PREREQUISITES {
        if !runner.is_available(prerequisite.program) {
            return Err(BootstrapError::MissingPrerequisite {
                tool: prerequisite.program.to_string(),
                remediation: prerequisite.remediation.to_string(),
            });
        }
        debug!(program = prerequisite.program, "Prerequisite found");
    }
    Ok(())
}
