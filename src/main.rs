//! nexus-sync - Refresh a curated Nexus Mods catalog
//!
//! Reads the curation file and the previous catalog, re-fetches only stale
//! records from the Nexus API, and rewrites the catalog.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use nexus_sync::cli::{Cli, StartupConfig};
use nexus_sync::CatalogSync;

/// Sets up the stderr log subscriber, honouring `RUST_LOG` and defaulting to `info`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let startup = match StartupConfig::from_cli(&cli) {
        Ok(startup) => startup,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let sync = CatalogSync::new(startup.client, startup.sync);
    match sync.sync(&startup.curation_path, &startup.store).await {
        Ok(summary) => {
            summary.log();
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("sync failed: {e}");
            ExitCode::FAILURE
        }
    }
}
