//! colabgame-setup CLI entry point.
//!
//! Initializes logging and delegates to the CLI module for command handling.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse before any side effect; usage errors exit 1, --help exits 0
    let cli = match colabgame_setup::cli::parse_cli() {
        Ok(cli) => cli,
        Err(err) => {
            let code = colabgame_setup::cli::parse_error_exit_code(&err);
            let _ = err.print();
            std::process::exit(code);
        }
    };

    // Priority: RUST_LOG env var > --log-level CLI arg > default "info"
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    colabgame_setup::cli::run_with_cli(cli).await
}
