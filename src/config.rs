//! Resolved configuration for a bootstrap run.

use std::path::{Component, Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::BootstrapError;

/// Upstream OSWorld repository.
pub const OSWORLD_REPO_URL: &str = "https://github.com/xlang-ai/OSWorld.git";

/// Default checkout location, a sibling of the invoking project.
pub const DEFAULT_OSWORLD_DIR: &str = "../OSWorld";

/// Isolated environment directory, relative to the OSWorld checkout.
pub const VENV_DIR_NAME: &str = "venv";

/// VM descriptor written by OSWorld's quick-start, relative to the checkout.
pub const VM_RELATIVE_PATH: &str = "vmware_vm_data/Ubuntu0/Ubuntu0.vmx";

/// Quick-start entry point that downloads and unpacks the VM image.
pub const QUICKSTART_SCRIPT: &str = "quickstart.py";

/// Fallback pip bootstrap script for hosts whose venv lacks ensurepip.
pub const GET_PIP_URL: &str = "https://bootstrap.pypa.io/get-pip.py";

/// Default configuration file read by the benchmark runner.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Key under which the VM descriptor path is persisted.
pub const VM_PATH_KEY: &str = "VM_PATH";

/// Lowest Python release OSWorld supports.
pub const MIN_PYTHON: Version = Version::new(3, 10, 0);

/// Configuration for one bootstrap run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Absolute path of the OSWorld checkout.
    pub osworld_dir: PathBuf,
    /// Skip the VM download and assume the conventional descriptor path.
    pub skip_vm: bool,
    /// Configuration file that receives `VM_PATH`.
    pub env_file: PathBuf,
    /// Repository cloned when no checkout is present.
    pub repo_url: String,
    /// Minimum interpreter version accepted for the isolated environment.
    pub min_python: Version,
    /// Source for the pip bootstrap fallback.
    pub get_pip_url: String,
}

impl BootstrapConfig {
    /// Creates a configuration for the given (already normalized) checkout.
    pub fn new(osworld_dir: impl Into<PathBuf>) -> Self {
        Self {
            osworld_dir: osworld_dir.into(),
            skip_vm: false,
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            repo_url: OSWORLD_REPO_URL.to_string(),
            min_python: MIN_PYTHON,
            get_pip_url: GET_PIP_URL.to_string(),
        }
    }

    /// Resolves the checkout from an optional override relative to `cwd`.
    pub fn resolve(osworld_dir: Option<&Path>, cwd: &Path) -> Result<Self, BootstrapError> {
        let raw = osworld_dir.unwrap_or_else(|| Path::new(DEFAULT_OSWORLD_DIR));
        Ok(Self::new(normalize_path(raw, cwd)?))
    }

    /// Sets whether the VM download is skipped.
    pub fn with_skip_vm(mut self, skip_vm: bool) -> Self {
        self.skip_vm = skip_vm;
        self
    }

    /// Sets the configuration file path.
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Sets the repository URL.
    pub fn with_repo_url(mut self, url: impl Into<String>) -> Self {
        self.repo_url = url.into();
        self
    }

    /// Sets the minimum interpreter version.
    pub fn with_min_python(mut self, version: Version) -> Self {
        self.min_python = version;
        self
    }

    /// Sets the pip bootstrap URL.
    pub fn with_get_pip_url(mut self, url: impl Into<String>) -> Self {
        self.get_pip_url = url.into();
        self
    }

    /// Marker whose presence means the repository is already checked out.
    pub fn git_marker(&self) -> PathBuf {
        self.osworld_dir.join(".git")
    }

    /// Directory of the isolated Python environment.
    pub fn venv_dir(&self) -> PathBuf {
        self.osworld_dir.join(VENV_DIR_NAME)
    }

    /// Conventional location of the VM descriptor.
    pub fn vm_path(&self) -> PathBuf {
        self.osworld_dir.join(VM_RELATIVE_PATH)
    }
}

/// Expands a leading `~`, anchors relative paths at `cwd` and removes `.` and
/// `..` components without touching the filesystem (the target may not exist
/// yet).
pub fn normalize_path(raw: &Path, cwd: &Path) -> Result<PathBuf, BootstrapError> {
    let raw_str = raw.to_string_lossy();
    if raw_str.trim().is_empty() {
        return Err(BootstrapError::InvalidPath("empty directory path".into()));
    }

    let expanded = if raw_str == "~" || raw_str.starts_with("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            BootstrapError::InvalidPath(format!(
                "cannot expand '{raw_str}': home directory is unknown"
            ))
        })?;
        match raw_str.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => home,
        }
    } else {
        raw.to_path_buf()
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
