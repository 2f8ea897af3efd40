//! nexus-sync library
//!
//! Incremental synchronization of a curated Nexus Mods catalog. The modules
//! map onto the pipeline stages: curation overlay and catalog store loading,
//! staleness classification, batched remote fetching, and merging.

pub mod cache;
pub mod cli;
pub mod config;
pub mod curation;
pub mod data;
pub mod fetcher;
pub mod merge;
pub mod scheduler;
pub mod staleness;
pub mod sync;

pub use sync::{CatalogSync, SyncError, SyncSummary};
