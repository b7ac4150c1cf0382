//! Main entry point for the tarsnapper CLI application.
//!
//! Lists a tarsnap archive, splits it into balanced groups and extracts the
//! groups with concurrent tarsnap processes.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tarsnapper::{Cli, Snapper, TarsnapClient};

/// Application entry point.
///
/// Exits with status 1 when tarsnap reported deferred errors, matching what
/// a single tarsnap process would do.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let client = Arc::new(TarsnapClient::new(&cli.tarsnap));
    let snapper = Snapper::new(cli.archive.clone(), cli.options(), client);

    let outcome = snapper.run().await?;
    if outcome.any_error_occurred {
        std::process::exit(1);
    }

    Ok(())
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the default level.
fn setup_logging(verbose: bool) {
    let default = if verbose {
        "tarsnapper=debug,warn"
    } else {
        "tarsnapper=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
