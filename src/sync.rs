//! Catalog sync pipeline
//!
//! Loads the curation overlay and the previous catalog, classifies every
//! tracked mod, fetches the stale ones in batches and writes the merged
//! catalog back. Reused records come first in overlay order, followed by
//! fetched records in batch order.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CatalogStore, StoreError};
use crate::config::SyncConfig;
use crate::curation::{CurationError, CurationOverlay};
use crate::data::nexus::ModsApi;
use crate::data::CatalogRecord;
use crate::fetcher::{RateLimited, RecordFetch, RemoteFetcher};
use crate::merge::{merge_cached, merge_fetched};
use crate::scheduler::BatchScheduler;
use crate::staleness::{ChangeSignal, FetchReason, PendingFetch, SyncPlan};

/// Errors that abort a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    /// The curation file is missing or invalid
    #[error(transparent)]
    Curation(#[from] CurationError),

    /// The catalog could not be written
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The upstream quota ran out mid-run
    #[error("{source}; saved a partial catalog of {persisted} records")]
    RateLimited {
        #[source]
        source: RateLimited,
        persisted: usize,
    },
}

/// Counters describing one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub started_at: DateTime<Utc>,
    /// Tracked entries in the curation overlay
    pub tracked: usize,
    /// Records rebuilt from a successful fetch
    pub fetched: usize,
    /// Records reused from the cache without any call
    pub reused: usize,
    /// Cached records kept because their re-fetch failed or never ran
    pub carried_forward: usize,
    /// New entries whose info fetch failed
    pub dropped: usize,
    /// Upstream calls issued, including the change-signal query
    pub api_calls: u32,
    pub batches: usize,
}

impl SyncSummary {
    fn new(tracked: usize) -> Self {
        Self {
            started_at: Utc::now(),
            tracked,
            fetched: 0,
            reused: 0,
            carried_forward: 0,
            dropped: 0,
            api_calls: 0,
            batches: 0,
        }
    }

    /// Logs the summary line printed at the end of a run
    pub fn log(&self) {
        self.emit("sync complete");
    }

    /// Logs the summary of a run stopped by the rate limit
    pub fn log_aborted(&self) {
        self.emit("sync aborted by rate limit");
    }

    fn emit(&self, outcome: &str) {
        let elapsed = Utc::now() - self.started_at;
        info!(
            tracked = self.tracked,
            fetched = self.fetched,
            reused = self.reused,
            carried_forward = self.carried_forward,
            dropped = self.dropped,
            api_calls = self.api_calls,
            batches = self.batches,
            elapsed_ms = elapsed.num_milliseconds(),
            "{outcome}"
        );
    }
}

/// Result of a completed in-memory sync
#[derive(Debug, Clone)]
pub struct SyncOutput {
    pub records: Vec<CatalogRecord>,
    pub summary: SyncSummary,
}

/// A run stopped by the rate limit, with the catalog that can still be saved
#[derive(Debug, Clone)]
pub struct SyncAbort {
    pub error: RateLimited,
    /// Reused records, results of completed batches, and cached records of
    /// every entry that was not fetched
    pub partial: Vec<CatalogRecord>,
    pub summary: SyncSummary,
}

/// Drives the incremental sync against a [`ModsApi`]
pub struct CatalogSync<A> {
    config: SyncConfig,
    fetcher: RemoteFetcher<A>,
    scheduler: BatchScheduler,
}

impl<A: ModsApi> CatalogSync<A> {
    pub fn new(api: A, config: SyncConfig) -> Self {
        let scheduler = BatchScheduler::from_config(&config);
        Self {
            config,
            fetcher: RemoteFetcher::new(api),
            scheduler,
        }
    }

    pub fn api(&self) -> &A {
        self.fetcher.api()
    }

    /// Loads inputs, syncs, and writes the catalog
    ///
    /// On a rate limit the partial catalog is still written before the error
    /// is returned, so completed work survives the aborted run.
    pub async fn sync(&self, curation_path: &Path, store: &CatalogStore) -> Result<SyncSummary, SyncError> {
        let overlay = CurationOverlay::load(curation_path)?;
        info!(tracked = overlay.len(), path = %curation_path.display(), "loaded curation overlay");

        let cache = store.load();
        info!(cached = cache.len(), path = %store.path().display(), "loaded catalog cache");

        match self.run(&overlay, &cache).await {
            Ok(output) => {
                store.save(&output.records)?;
                info!(records = output.records.len(), path = %store.path().display(), "catalog written");
                Ok(output.summary)
            }
            Err(abort) => {
                warn!(records = abort.partial.len(), "rate limited, writing partial catalog");
                store.save(&abort.partial)?;
                abort.summary.log_aborted();
                Err(SyncError::RateLimited {
                    source: abort.error,
                    persisted: abort.partial.len(),
                })
            }
        }
    }

    /// Rebuilds the catalog in memory from the overlay and the cache
    pub async fn run(
        &self,
        overlay: &CurationOverlay,
        cache: &HashMap<String, CatalogRecord>,
    ) -> Result<SyncOutput, Box<SyncAbort>> {
        let mut summary = SyncSummary::new(overlay.len());
        let calls_before = self.fetcher.calls_issued();

        let signal = match self.change_signal(overlay, cache, &mut summary).await {
            Ok(signal) => signal,
            Err(error) => {
                let plan = SyncPlan::build(overlay, cache, &ChangeSignal::empty());
                let records = reused_records(&plan);
                summary.reused = records.len();
                return Err(abort(error, &plan, records, summary));
            }
        };

        let plan = SyncPlan::build(overlay, cache, &signal);
        info!(
            reuse = plan.reuse.len(),
            new = plan.count(FetchReason::New),
            missing_data = plan.count(FetchReason::MissingData),
            updated_upstream = plan.count(FetchReason::UpdatedUpstream),
            batches = self.scheduler.batch_count(plan.fetch.len()),
            "classified tracked mods"
        );

        let mut records = reused_records(&plan);
        summary.reused = records.len();

        let run = self
            .scheduler
            .run(&plan.fetch, |pending| async move {
                let fetch = self.fetcher.fetch_record(&pending.entry.id).await?;
                Ok::<_, RateLimited>((pending, fetch))
            })
            .await;
        summary.batches = run.batches;
        summary.api_calls += self.fetcher.calls_issued() - calls_before;

        for (pending, fetch) in run.completed {
            if let Some(record) = settle(pending, fetch, &mut summary) {
                records.push(record);
            }
        }

        match run.aborted {
            None => Ok(SyncOutput { records, summary }),
            Some(error) => Err(abort(error, &plan, records, summary)),
        }
    }

    /// Queries the upstream change signal when any tracked mod is cached
    ///
    /// A failed query other than a rate limit is treated as an empty signal.
    async fn change_signal(
        &self,
        overlay: &CurationOverlay,
        cache: &HashMap<String, CatalogRecord>,
        summary: &mut SyncSummary,
    ) -> Result<ChangeSignal, RateLimited> {
        if !self.config.use_change_signal {
            debug!("change signal disabled");
            return Ok(ChangeSignal::empty());
        }
        if !overlay.entries().iter().any(|e| cache.contains_key(&e.id)) {
            debug!("nothing cached, skipping change signal");
            return Ok(ChangeSignal::empty());
        }

        let window = self.config.recency_window;
        summary.api_calls += 1;
        match self.fetcher.api().updated_mods(window).await {
            Ok(updated) => {
                for entry in &updated {
                    debug!(id = %entry.mod_id, activity = ?entry.activity_time(), "updated upstream");
                }
                let signal = ChangeSignal::from(updated);
                if signal.is_empty() {
                    info!(period = %window, "no upstream changes in window");
                } else {
                    info!(period = %window, changed = signal.len(), "fetched change signal");
                }
                Ok(signal)
            }
            Err(e) if e.is_rate_limited() => Err(RateLimited {
                target: format!("updated mods ({window})"),
            }),
            Err(e) => {
                warn!(error = %e, "change signal unavailable, treating as empty");
                Ok(ChangeSignal::empty())
            }
        }
    }
}

fn reused_records(plan: &SyncPlan) -> Vec<CatalogRecord> {
    plan.reuse
        .iter()
        .map(|(entry, cached)| merge_cached(entry, cached.clone()))
        .collect()
}

/// Turns one finished fetch into its catalog record, if any
fn settle(pending: &PendingFetch, fetch: RecordFetch, summary: &mut SyncSummary) -> Option<CatalogRecord> {
    let entry = &pending.entry;
    match (fetch.data, &pending.cached) {
        (Some(fetched), cached) => {
            if fetched.is_degraded() && cached.is_some() {
                warn!(id = %entry.id, "keeping cached values for failed reads");
            }
            info!(id = %entry.id, reason = %pending.reason, "fetched");
            summary.fetched += 1;
            Some(merge_fetched(entry, fetched.resolve(cached.as_ref())))
        }
        (None, Some(cached)) => {
            warn!(id = %entry.id, reason = %pending.reason, "fetch failed, keeping cached record");
            summary.carried_forward += 1;
            Some(merge_cached(entry, cached.clone()))
        }
        (None, None) => {
            warn!(id = %entry.id, "fetch failed, dropping new mod");
            summary.dropped += 1;
            None
        }
    }
}

/// Completes a partial catalog with cached records of unfetched entries
fn abort(
    error: RateLimited,
    plan: &SyncPlan,
    mut records: Vec<CatalogRecord>,
    mut summary: SyncSummary,
) -> Box<SyncAbort> {
    let settled: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
    for pending in &plan.fetch {
        if settled.contains(&pending.entry.id) {
            continue;
        }
        if let Some(cached) = &pending.cached {
            records.push(merge_cached(&pending.entry, cached.clone()));
            summary.carried_forward += 1;
        }
    }

    Box::new(SyncAbort {
        error,
        partial: records,
        summary,
    })
}
