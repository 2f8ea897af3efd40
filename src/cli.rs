//! Command-line interface parsing for nexus-sync
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! the explicit configuration consumed by the sync pipeline.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::cache::CatalogStore;
use crate::config::{RecencyWindow, SyncConfig, DEFAULT_BATCH_SIZE};
use crate::data::nexus::NEXUS_BASE_URL;
use crate::data::NexusClient;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--catalog` was given and no platform cache directory exists
    #[error("cannot determine a catalog location; pass --catalog <PATH>")]
    NoCatalogLocation,
}

/// nexus-sync - Incrementally sync a curated Nexus Mods catalog
#[derive(Parser, Debug)]
#[command(name = "nexus-sync")]
#[command(about = "Refresh a curated Nexus Mods catalog, fetching only stale records")]
#[command(version)]
pub struct Cli {
    /// Curation file listing the tracked mods
    #[arg(long, value_name = "PATH", default_value = "mods.json")]
    pub curation: PathBuf,

    /// Catalog file read as the cache and rewritten at the end of the run
    ///
    /// Defaults to catalog.json in the platform cache directory.
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Nexus game domain, e.g. skyrimspecialedition
    #[arg(long, env = "NEXUS_GAME", value_name = "DOMAIN")]
    pub game: String,

    /// Nexus API key
    #[arg(long, env = "NEXUS_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: String,

    /// Number of mods fetched concurrently per batch
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub batch_delay_ms: u64,

    /// Window of the upstream "recently updated" query
    #[arg(long, value_enum, default_value_t = RecencyWindow::Week)]
    pub period: RecencyWindow,

    /// Do not query the upstream change signal; only new or incomplete records are fetched
    #[arg(long)]
    pub no_change_signal: bool,

    /// Base URL of the Nexus API
    #[arg(long, value_name = "URL", default_value = NEXUS_BASE_URL)]
    pub base_url: String,
}

/// Parses a batch size argument, which must be at least 1.
pub fn parse_batch_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("invalid batch size '{s}': {e}")),
    }
}

/// Everything a run needs, derived from CLI arguments
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub sync: SyncConfig,
    pub curation_path: PathBuf,
    pub store: CatalogStore,
    pub client: NexusClient,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if no catalog location can be determined
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let store = match &cli.catalog {
            Some(path) => CatalogStore::with_path(path.clone()),
            None => CatalogStore::new().ok_or(CliError::NoCatalogLocation)?,
        };

        let sync = SyncConfig {
            batch_size: cli.batch_size,
            inter_batch_delay: Duration::from_millis(cli.batch_delay_ms),
            recency_window: cli.period,
            use_change_signal: !cli.no_change_signal,
        };

        let client =
            NexusClient::new(cli.api_key.clone(), cli.game.clone()).with_base_url(cli.base_url.clone());

        Ok(Self {
            sync,
            curation_path: cli.curation.clone(),
            store,
            client,
        })
    }
}
