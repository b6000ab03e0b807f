//! VM image acquisition through OSWorld's quick-start.

use std::path::PathBuf;

use tracing::{info, warn};

use super::venv::InterpreterContext;
use super::StepOutcome;
use crate::config::{BootstrapConfig, QUICKSTART_SCRIPT};
use crate::error::BootstrapError;
use crate::host::CommandRunner;

/// Returns the VM descriptor path, downloading the image when it is absent.
///
/// With `skip_vm` the conventional path is returned unchecked. The download
/// has no resume support; an interrupted run starts over on the next call.
pub async fn acquire(
    config: &BootstrapConfig,
    context: &InterpreterContext,
    runner: &dyn CommandRunner,
) -> Result<(PathBuf, StepOutcome), BootstrapError> {
    let vm_path = config.vm_path();

    if config.skip_vm {
        info!(path = %vm_path.display(), "Skipping VM download");
        return Ok((vm_path, StepOutcome::Skipped));
    }

    if vm_path.is_file() {
        info!(path = %vm_path.display(), "VM descriptor found, skipping download");
        return Ok((vm_path, StepOutcome::Reused));
    }

    info!("Downloading the OSWorld VM image; this can take tens of minutes");
    let quickstart = context
        .python_command()?
        .arg(QUICKSTART_SCRIPT)
        .current_dir(&config.osworld_dir)
        .inherit_output();
    runner
        .run(&quickstart)
        .await?
        .into_result("VM download", &quickstart)?;

    if !vm_path.is_file() {
        warn!(path = %vm_path.display(), "Quick-start finished but the VM descriptor is not at the expected path");
    }
    Ok((vm_path, StepOutcome::Fetched))
}
