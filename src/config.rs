//! Sync configuration
//!
//! Tunables for the batch scheduler and the change-signal query. They are
//! passed explicitly into the components that need them.

use std::fmt;
use std::time::Duration;

use clap::ValueEnum;

/// Default number of mods fetched concurrently in one batch
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default pause between two consecutive batches
pub const DEFAULT_INTER_BATCH_DELAY: Duration = Duration::from_millis(1000);

/// How far back the upstream "recently updated" listing should look
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RecencyWindow {
    #[value(name = "1d")]
    Day,
    #[default]
    #[value(name = "1w")]
    Week,
    #[value(name = "1m")]
    Month,
}

impl RecencyWindow {
    /// Wire value of the `period` query parameter
    pub fn as_period(self) -> &'static str {
        match self {
            RecencyWindow::Day => "1d",
            RecencyWindow::Week => "1w",
            RecencyWindow::Month => "1m",
        }
    }
}

impl fmt::Display for RecencyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_period())
    }
}

/// Configuration for one sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of mods fetched concurrently per batch (at least 1)
    pub batch_size: usize,
    /// Pause between the end of one batch and the start of the next
    pub inter_batch_delay: Duration,
    /// Window passed to the "recently updated" query
    pub recency_window: RecencyWindow,
    /// Whether to query the upstream change signal at all
    pub use_change_signal: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_delay: DEFAULT_INTER_BATCH_DELAY,
            recency_window: RecencyWindow::default(),
            use_change_signal: true,
        }
    }
}
