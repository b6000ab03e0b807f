//! Package installation inside the active environment.

use tracing::info;

use super::venv::InterpreterContext;
use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::host::CommandRunner;

/// Upgrades pip, then installs the OSWorld checkout in editable mode.
pub async fn install(
    config: &BootstrapConfig,
    context: &InterpreterContext,
    runner: &dyn CommandRunner,
) -> Result<(), BootstrapError> {
    info!("Upgrading pip");
    let upgrade = context
        .python_command()?
        .args(["-m", "pip", "install", "--upgrade", "pip"])
        .inherit_output();
    runner.run(&upgrade).await?.into_result("pip upgrade", &upgrade)?;

    info!(path = %config.osworld_dir.display(), "Installing OSWorld in editable mode");
    let editable = context
        .python_command()?
        .args(["-m", "pip", "install", "-e"])
        .arg(config.osworld_dir.to_string_lossy())
        .current_dir(&config.osworld_dir)
        .inherit_output();
    runner
        .run(&editable)
        .await?
        .into_result("OSWorld installation", &editable)?;

    Ok(())
}
