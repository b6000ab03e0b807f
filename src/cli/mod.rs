//! Command-line interface for colabgame-setup.
//!
//! Provides the setup run and the `check` readiness report.

mod commands;

pub use commands::{parse_cli, parse_error_exit_code, run_with_cli, Cli, Commands};
