//! CLI command definitions for colabgame-setup.
//!
//! Running without a subcommand performs the full OSWorld setup; `check`
//! reports whether an earlier setup left a usable VM behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::info;

use crate::bootstrap::Bootstrapper;
use crate::config::{normalize_path, BootstrapConfig, DEFAULT_ENV_FILE, VM_PATH_KEY};
use crate::host::{HttpDownloader, SystemRunner};
use crate::status;

/// Provision OSWorld for the ColabGame computer-use benchmark.
#[derive(Parser, Debug)]
#[command(name = "colabgame-setup")]
#[command(about = "Set up OSWorld, its Python environment and VM image for ColabGame")]
#[command(version)]
#[command(
    long_about = "colabgame-setup clones OSWorld, builds a fresh Python environment for it, downloads the Ubuntu VM image and records VM_PATH in the project's .env file.\n\nRe-running is safe: an existing checkout and VM image are reused, the Python environment is rebuilt, and VM_PATH is updated in place.\n\nExample usage:\n  colabgame-setup --osworld-dir ~/OSWorld --skip-vm"
)]
pub struct Cli {
    /// Optional subcommand; the setup runs when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub setup: SetupArgs,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Report whether OSWorld and its VM are ready, without changing anything.
    Check(CheckArgs),
}

/// Arguments for the setup run.
#[derive(clap::Args, Debug)]
pub struct SetupArgs {
    /// OSWorld checkout directory (cloned here when missing).
    #[arg(long, value_name = "PATH", env = "OSWORLD_DIR", global = true)]
    pub osworld_dir: Option<PathBuf>,

    /// Skip the VM image download and record the conventional VM path.
    #[arg(long)]
    pub skip_vm: bool,

    /// Configuration file that receives VM_PATH.
    #[arg(long, value_name = "PATH", env = "COLABGAME_ENV_FILE", default_value = DEFAULT_ENV_FILE, global = true)]
    pub env_file: PathBuf,

    /// Output a JSON report instead of a summary.
    #[arg(short = 'j', long, global = true)]
    pub json: bool,
}

/// Arguments for `colabgame-setup check`.
#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Instance configuration YAML consulted for system.vm_path.
    #[arg(short, long, value_name = "YAML")]
    pub config: Option<PathBuf>,
}

/// Parse CLI arguments from the process.
///
/// Errors are returned rather than printed so the caller controls the exit
/// status (see [`parse_error_exit_code`]).
pub fn parse_cli() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}

/// Exit status for a parse failure: 0 for `--help`/`--version`, 1 otherwise.
pub fn parse_error_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
    let config = resolve_config(&cli.setup, &cwd)?;

    match cli.command {
        Some(Commands::Check(args)) => run_check_command(config, args, cli.setup.json),
        None => run_setup_command(config, cli.setup.json).await,
    }
}

fn resolve_config(args: &SetupArgs, cwd: &Path) -> anyhow::Result<BootstrapConfig> {
    let env_file = normalize_path(&args.env_file, cwd).context("Invalid --env-file")?;
    let config = BootstrapConfig::resolve(args.osworld_dir.as_deref(), cwd)
        .context("Invalid --osworld-dir")?
        .with_skip_vm(args.skip_vm)
        .with_env_file(env_file);
    Ok(config)
}

async fn run_setup_command(config: BootstrapConfig, json: bool) -> anyhow::Result<()> {
    let runner = Arc::new(SystemRunner::new());
    let downloader = Arc::new(HttpDownloader::new()?);

    let report = Bootstrapper::new(config, runner, downloader)
        .run()
        .await
        .context("OSWorld setup failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn run_check_command(config: BootstrapConfig, args: CheckArgs, json: bool) -> anyhow::Result<()> {
    let process_value = std::env::var(VM_PATH_KEY).ok();
    let report = status::check(&config, process_value.as_deref(), args.config.as_deref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    if !report.is_ready() {
        anyhow::bail!("OSWorld VM is not ready; run colabgame-setup to provision it");
    }
    info!("OSWorld VM is ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("colabgame-setup").chain(args.iter().copied()))
    }

    #[test]
    fn test_setup_flags() {
        let cli = parse(&["--osworld-dir", "/tmp/OSWorld", "--skip-vm"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.setup.osworld_dir, Some(PathBuf::from("/tmp/OSWorld")));
        assert!(cli.setup.skip_vm);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_unknown_flag_exits_one() {
        let err = parse(&["--bogus"]).unwrap_err();
        assert_eq!(parse_error_exit_code(&err), 1);
    }

    #[test]
    fn test_missing_directory_value_exits_one() {
        let err = parse(&["--osworld-dir"]).unwrap_err();
        assert_eq!(parse_error_exit_code(&err), 1);
    }

    #[test]
    fn test_help_exits_zero() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(parse_error_exit_code(&err), 0);
    }

    #[test]
    fn test_check_subcommand_sees_global_args() {
        let cli = parse(&["check", "--config", "in/config.yaml", "--osworld-dir", "/srv/OSWorld", "-j"]).unwrap();
        match cli.command {
            Some(Commands::Check(args)) => {
                assert_eq!(args.config, Some(PathBuf::from("in/config.yaml")));
            }
            None => panic!("expected check subcommand"),
        }
        assert_eq!(cli.setup.osworld_dir, Some(PathBuf::from("/srv/OSWorld")));
        assert!(cli.setup.json);
    }

    #[test]
    fn test_resolve_config_anchors_paths_at_cwd() {
        let cli = parse(&["--env-file", "conf/.env", "--osworld-dir", "../OSW"]).unwrap();
        let config = resolve_config(&cli.setup, Path::new("/work/colabgame")).unwrap();
        assert_eq!(config.env_file, PathBuf::from("/work/colabgame/conf/.env"));
        assert_eq!(config.osworld_dir, PathBuf::from("/work/OSW"));
    }
}
