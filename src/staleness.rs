//! Staleness classification
//!
//! Decides for every tracked mod whether its cached record can be reused or
//! must be fetched again. Change detection is signal-based: one upstream
//! "recently updated" listing per run replaces per-mod timestamp polling.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::info;

use crate::curation::{CurationOverlay, TrackedEntry};
use crate::data::{CatalogRecord, UpdatedMod};

/// Why a tracked mod has to be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchReason {
    /// No cached record exists
    New,
    /// The cached record lacks its file listing or changelog key
    MissingData,
    /// The upstream reported the mod as changed within the recency window
    UpdatedUpstream,
}

impl fmt::Display for FetchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchReason::New => "new",
            FetchReason::MissingData => "missing-data",
            FetchReason::UpdatedUpstream => "updated-upstream",
        })
    }
}

/// Outcome of classifying one tracked mod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Reuse,
    Fetch(FetchReason),
}

/// Set of mod ids the upstream reported as recently changed
#[derive(Debug, Clone, Default)]
pub struct ChangeSignal {
    ids: HashSet<String>,
}

impl ChangeSignal {
    /// A signal that reports nothing as changed
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ChangeSignal {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Vec<UpdatedMod>> for ChangeSignal {
    fn from(updated: Vec<UpdatedMod>) -> Self {
        updated.into_iter().map(|entry| entry.mod_id).collect()
    }
}

/// Classifies one tracked mod against its cached record
///
/// Rules, first match wins:
/// 1. no cached record: `New`
/// 2. cached record incomplete: `MissingData`
/// 3. id present in the change signal: `UpdatedUpstream`
/// 4. otherwise: `Reuse`
///
/// Incompleteness is checked before the signal so a corrupt record is always
/// reported as such; both reasons trigger the same fetches.
pub fn classify(cached: Option<&CatalogRecord>, signal: &ChangeSignal) -> Decision {
    let Some(record) = cached else {
        return Decision::Fetch(FetchReason::New);
    };
    if !record.is_complete() {
        return Decision::Fetch(FetchReason::MissingData);
    }
    if signal.contains(&record.id) {
        return Decision::Fetch(FetchReason::UpdatedUpstream);
    }
    Decision::Reuse
}

/// A tracked mod that must be fetched this run
#[derive(Debug, Clone)]
pub struct PendingFetch {
    pub entry: TrackedEntry,
    pub reason: FetchReason,
    /// Previous record, kept to fall back on if the fetch fails
    pub cached: Option<CatalogRecord>,
}

/// Tracked mods partitioned into reuse and fetch sets, in overlay order
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub reuse: Vec<(TrackedEntry, CatalogRecord)>,
    pub fetch: Vec<PendingFetch>,
}

impl SyncPlan {
    /// Classifies every tracked entry of the overlay
    pub fn build(
        overlay: &CurationOverlay,
        cache: &HashMap<String, CatalogRecord>,
        signal: &ChangeSignal,
    ) -> Self {
        let mut plan = Self::default();

        for entry in overlay.entries() {
            let cached = cache.get(&entry.id);
            match classify(cached, signal) {
                Decision::Reuse => {
                    info!(id = %entry.id, "reusing cached record");
                    if let Some(record) = cached {
                        plan.reuse.push((entry.clone(), record.clone()));
                    }
                }
                Decision::Fetch(reason) => {
                    info!(id = %entry.id, %reason, "scheduled for fetch");
                    plan.fetch.push(PendingFetch {
                        entry: entry.clone(),
                        reason,
                        cached: cached.cloned(),
                    });
                }
            }
        }

        plan
    }

    /// Number of pending fetches for the given reason
    pub fn count(&self, reason: FetchReason) -> usize {
        self.fetch.iter().filter(|p| p.reason == reason).count()
    }
}
