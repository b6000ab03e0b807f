//! Read-only readiness check.
//!
//! Resolves the VM path the way the benchmark runner does: a `VM_PATH` set
//! in the process environment wins, then the `.env` file, then
//! `system.vm_path` from an instance configuration file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bootstrap::VirtualEnv;
use crate::config::{BootstrapConfig, VM_PATH_KEY};
use crate::env_file::EnvFile;
use crate::error::BootstrapError;

/// Where the VM path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VmPathSource {
    ProcessEnv,
    EnvFile,
    InstanceConfig,
}

impl fmt::Display for VmPathSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmPathSource::ProcessEnv => write!(f, "{VM_PATH_KEY} environment variable"),
            VmPathSource::EnvFile => write!(f, "configuration file"),
            VmPathSource::InstanceConfig => write!(f, "instance config system.vm_path"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct InstanceConfig {
    #[serde(default)]
    system: SystemSection,
}

#[derive(Debug, Default, Deserialize)]
struct SystemSection {
    vm_path: Option<String>,
}

/// Result of a readiness check.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub osworld_dir: PathBuf,
    pub repository_present: bool,
    pub environment_present: bool,
    pub env_file: PathBuf,
    pub vm_path: Option<PathBuf>,
    pub vm_path_source: Option<VmPathSource>,
    pub vm_present: bool,
}

impl StatusReport {
    /// A VM path resolved and the descriptor exists.
    pub fn is_ready(&self) -> bool {
        self.vm_path.is_some() && self.vm_present
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        writeln!(f, "OSWorld checkout:   {} ({})", self.osworld_dir.display(), yes_no(self.repository_present))?;
        writeln!(f, "Python environment: {}", yes_no(self.environment_present))?;
        writeln!(f, "Config file:        {}", self.env_file.display())?;
        match (&self.vm_path, self.vm_path_source) {
            (Some(path), Some(source)) => {
                writeln!(f, "{VM_PATH_KEY}:            {} (from {source})", path.display())?;
                write!(f, "VM descriptor:      {}", if self.vm_present { "present" } else { "missing" })
            }
            _ => write!(f, "{VM_PATH_KEY}:            not set"),
        }
    }
}

/// Resolves the VM path from its three sources in precedence order.
pub fn resolve_vm_path(
    process_value: Option<&str>,
    env_file: &EnvFile,
    instance_config: Option<&Path>,
) -> Result<Option<(PathBuf, VmPathSource)>, BootstrapError> {
    if let Some(value) = process_value.filter(|v| !v.trim().is_empty()) {
        return Ok(Some((PathBuf::from(value), VmPathSource::ProcessEnv)));
    }

    if let Some(value) = env_file.get(VM_PATH_KEY).filter(|v| !v.trim().is_empty()) {
        return Ok(Some((PathBuf::from(value), VmPathSource::EnvFile)));
    }

    if let Some(path) = instance_config {
        let content = std::fs::read_to_string(path)?;
        let parsed: InstanceConfig = serde_yaml::from_str(&content).map_err(|e| {
            BootstrapError::InvalidPath(format!("cannot parse {}: {e}", path.display()))
        })?;
        if let Some(value) = parsed.system.vm_path.filter(|v| !v.trim().is_empty()) {
            return Ok(Some((PathBuf::from(value), VmPathSource::InstanceConfig)));
        }
    }

    Ok(None)
}

/// Inspects the checkout, environment and VM descriptor without changing anything.
pub fn check(
    config: &BootstrapConfig,
    process_value: Option<&str>,
    instance_config: Option<&Path>,
) -> Result<StatusReport, BootstrapError> {
    let env_file = EnvFile::load(&config.env_file)?;
    let resolved = resolve_vm_path(process_value, &env_file, instance_config)?;
    let vm_present = resolved.as_ref().is_some_and(|(p, _)| p.is_file());
    let (vm_path, vm_path_source) = match resolved {
        Some((path, source)) => (Some(path), Some(source)),
        None => (None, None),
    };

    Ok(StatusReport {
        osworld_dir: config.osworld_dir.clone(),
        repository_present: config.git_marker().exists(),
        environment_present: VirtualEnv::new(config.venv_dir()).python().exists(),
        env_file: config.env_file.clone(),
        vm_path,
        vm_path_source,
        vm_present,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_process_env_wins() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        fs::write(&env_path, "VM_PATH=\"/from/file.vmx\"\n").unwrap();
        let env_file = EnvFile::load(&env_path).unwrap();

        let resolved = resolve_vm_path(Some("/from/env.vmx"), &env_file, None).unwrap();
        assert_eq!(resolved, Some((PathBuf::from("/from/env.vmx"), VmPathSource::ProcessEnv)));

        let resolved = resolve_vm_path(Some(""), &env_file, None).unwrap();
        assert_eq!(resolved, Some((PathBuf::from("/from/file.vmx"), VmPathSource::EnvFile)));
    }

    #[test]
    fn test_instance_config_fallback() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("config.yaml");
        fs::write(&yaml, "system:\n  screen_width: 1920\n  vm_path: /cfg/Ubuntu0.vmx\nexperiments: {}\n").unwrap();
        let env_file = EnvFile::load(dir.path().join("missing.env")).unwrap();

        let resolved = resolve_vm_path(None, &env_file, Some(&yaml)).unwrap();
        assert_eq!(resolved, Some((PathBuf::from("/cfg/Ubuntu0.vmx"), VmPathSource::InstanceConfig)));
        assert_eq!(resolve_vm_path(None, &env_file, None).unwrap(), None);
    }

    #[test]
    fn test_check_reports_missing_descriptor() {
        let dir = tempdir().unwrap();
        let osworld = dir.path().join("OSWorld");
        fs::create_dir_all(osworld.join(".git")).unwrap();
        let env_path = dir.path().join(".env");
        let vm = osworld.join("vmware_vm_data/Ubuntu0/Ubuntu0.vmx");
        fs::write(&env_path, format!("VM_PATH=\"{}\"\n", vm.display())).unwrap();

        let config = BootstrapConfig::new(&osworld).with_env_file(&env_path);
        let report = check(&config, None, None).unwrap();
        assert!(report.repository_present);
        assert!(!report.environment_present);
        assert_eq!(report.vm_path_source, Some(VmPathSource::EnvFile));
        assert!(!report.is_ready());

        fs::create_dir_all(vm.parent().unwrap()).unwrap();
        fs::write(&vm, "config.version = \"8\"\n").unwrap();
        assert!(check(&config, None, None).unwrap().is_ready());
    }
}
