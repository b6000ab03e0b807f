//! colabgame-setup: provisioning for the ColabGame computer-use benchmark.
//!
//! This library clones OSWorld, builds its isolated Python environment,
//! fetches the VM image and records the VM path for the benchmark runner.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod env_file;
pub mod error;
pub mod host;
pub mod status;

pub use error::BootstrapError;
