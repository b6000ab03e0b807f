//! OSWorld checkout.

use tracing::info;

use super::StepOutcome;
use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::host::{CommandRunner, CommandSpec};

/// Reuses an existing checkout or clones a fresh one.
///
/// A `.git` entry at the target is the only check; its remote and contents
/// are not inspected.
pub async fn acquire(
    config: &BootstrapConfig,
    runner: &dyn CommandRunner,
) -> Result<StepOutcome, BootstrapError> {
    if config.git_marker().exists() {
        info!(path = %config.osworld_dir.display(), "OSWorld checkout found, skipping clone");
        return Ok(StepOutcome::Reused);
    }

    if let Some(parent) = config.osworld_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!(url = %config.repo_url, path = %config.osworld_dir.display(), "Cloning OSWorld");
    let spec = CommandSpec::new("git")
        .arg("clone")
        .arg(config.repo_url.as_str())
        .arg(config.osworld_dir.to_string_lossy())
        .env("GIT_TERMINAL_PROMPT", "0")
        .inherit_output();
    runner.run(&spec).await?.into_result("Clone", &spec)?;

    Ok(StepOutcome::Fetched)
}
