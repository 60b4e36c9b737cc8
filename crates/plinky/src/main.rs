mod cli;
mod handlers;
mod utils;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Version => {
            handlers::handle_version();
            Ok(())
        }

        Command::Scan {
            network,
            timeout,
            port,
            concurrency,
        } => handlers::handle_scan(&network, timeout, port, concurrency).await,

        Command::Device {
            target,
            timeout,
            command,
        } => handlers::handle_device(&target, timeout, command).await,
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
