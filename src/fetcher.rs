//! Remote fetcher with per-call failure isolation
//!
//! Wraps a [`ModsApi`] and applies the failure policy of each logical read:
//! a failed info read drops the mod, failed file or changelog reads degrade to
//! the previous cached value (or an empty one), and a 429 from any read is
//! surfaced as [`RateLimited`].

use std::sync::atomic::{AtomicU32, Ordering};

use futures::join;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::nexus::ModsApi;
use crate::data::{CatalogRecord, Changelogs, ModData, ModInfo, NexusError};

/// The upstream refused a call because the quota is exhausted
#[derive(Debug, Clone, Error)]
#[error("rate limited by the Nexus API while fetching {target}")]
pub struct RateLimited {
    /// Mod id (or query) whose call hit the limit
    pub target: String,
}

/// Value of a non-critical read: either what the API returned or the default
/// substituted after a failure
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Fresh(T),
    Degraded(T),
}

impl<T> Fetched<T> {
    /// Returns the fresh value, or `previous` in place of a degraded default
    pub fn or_previous(self, previous: Option<T>) -> T {
        match self {
            Fetched::Fresh(value) => value,
            Fetched::Degraded(default) => previous.unwrap_or(default),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Fetched::Degraded(_))
    }
}

/// The three reads of one mod, before degraded values are resolved
#[derive(Debug, Clone)]
pub struct FetchedRecord {
    pub info: ModInfo,
    pub files: Fetched<Vec<Value>>,
    pub changelogs: Fetched<Changelogs>,
}

impl FetchedRecord {
    /// Resolves degraded reads against the previous record of the mod
    ///
    /// A degraded read keeps the cached value when the cached record has
    /// that key, and falls back to empty otherwise.
    pub fn resolve(self, cached: Option<&CatalogRecord>) -> ModData {
        ModData {
            info: self.info,
            files: self.files.or_previous(cached.and_then(|c| c.files.clone())),
            changelogs: self
                .changelogs
                .or_previous(cached.and_then(|c| c.changelogs.clone())),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.files.is_degraded() || self.changelogs.is_degraded()
    }
}

/// Result of fetching every read for one mod
#[derive(Debug, Clone)]
pub struct RecordFetch {
    pub id: String,
    /// `None` when the info read failed
    pub data: Option<FetchedRecord>,
}

/// Issues the three per-mod reads against the upstream API
#[derive(Debug)]
pub struct RemoteFetcher<A> {
    api: A,
    calls: AtomicU32,
}

impl<A: ModsApi> RemoteFetcher<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            calls: AtomicU32::new(0),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Per-mod upstream calls issued so far, including failed ones
    pub fn calls_issued(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    fn count_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Fetches summary info; `Ok(None)` on any failure other than a 429
    pub async fn fetch_info(&self, id: &str) -> Result<Option<ModInfo>, RateLimited> {
        self.count_call();
        match self.api.mod_info(id).await {
            Ok(info) => Ok(Some(info)),
            Err(e) => {
                escalate(id, &e)?;
                warn!(id, error = %e, "info fetch failed");
                Ok(None)
            }
        }
    }

    /// Fetches the file listing; degrades to an empty listing on failure
    pub async fn fetch_files(&self, id: &str) -> Result<Fetched<Vec<Value>>, RateLimited> {
        self.count_call();
        match self.api.mod_files(id).await {
            Ok(files) => Ok(Fetched::Fresh(files)),
            Err(e) => {
                escalate(id, &e)?;
                warn!(id, error = %e, "file listing fetch failed");
                Ok(Fetched::Degraded(Vec::new()))
            }
        }
    }

    /// Fetches the changelog map; degrades to an empty map on failure
    pub async fn fetch_changelogs(&self, id: &str) -> Result<Fetched<Changelogs>, RateLimited> {
        self.count_call();
        match self.api.mod_changelogs(id).await {
            Ok(changelogs) => Ok(Fetched::Fresh(changelogs)),
            Err(e) => {
                escalate(id, &e)?;
                warn!(id, error = %e, "changelog fetch failed");
                Ok(Fetched::Degraded(Changelogs::new()))
            }
        }
    }

    /// Fetches info, then files and changelogs concurrently
    ///
    /// Files and changelogs are only requested once the info read succeeded.
    /// Both dependent reads always settle before a rate limit is reported.
    pub async fn fetch_record(&self, id: &str) -> Result<RecordFetch, RateLimited> {
        let Some(info) = self.fetch_info(id).await? else {
            return Ok(RecordFetch {
                id: id.to_string(),
                data: None,
            });
        };

        let (files, changelogs) = join!(self.fetch_files(id), self.fetch_changelogs(id));
        let (files, changelogs) = (files?, changelogs?);
        debug!(
            id,
            degraded_files = files.is_degraded(),
            degraded_changelogs = changelogs.is_degraded(),
            "fetched record"
        );

        Ok(RecordFetch {
            id: id.to_string(),
            data: Some(FetchedRecord {
                info,
                files,
                changelogs,
            }),
        })
    }
}

fn escalate(target: &str, error: &NexusError) -> Result<(), RateLimited> {
    if error.is_rate_limited() {
        return Err(RateLimited {
            target: target.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecencyWindow;
    use crate::data::UpdatedMod;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fake API whose behaviour per read is fixed at construction
    #[derive(Default)]
    struct FakeApi {
        info: Option<fn() -> NexusError>,
        files: Option<fn() -> NexusError>,
        changelogs: Option<fn() -> NexusError>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ModsApi for FakeApi {
        async fn mod_info(&self, id: &str) -> Result<ModInfo, NexusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.info {
                Some(err) => Err(err()),
                None => Ok(ModInfo {
                    name: Some(format!("mod {id}")),
                    ..ModInfo::default()
                }),
            }
        }

        async fn mod_files(&self, _id: &str) -> Result<Vec<Value>, NexusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.files {
                Some(err) => Err(err()),
                None => Ok(vec![json!({"file_id": 1})]),
            }
        }

        async fn mod_changelogs(&self, _id: &str) -> Result<Changelogs, NexusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.changelogs {
                Some(err) => Err(err()),
                None => {
                    let mut map = Changelogs::new();
                    map.insert("1.0".to_string(), json!(["initial"]));
                    Ok(map)
                }
            }
        }

        async fn updated_mods(&self, _window: RecencyWindow) -> Result<Vec<UpdatedMod>, NexusError> {
            Ok(Vec::new())
        }
    }

    fn not_found() -> NexusError {
        NexusError::Status(404)
    }

    fn server_error() -> NexusError {
        NexusError::Status(500)
    }

    fn rate_limited() -> NexusError {
        NexusError::RateLimited
    }

    #[tokio::test]
    async fn test_fetch_record_success_issues_three_calls() {
        let fetcher = RemoteFetcher::new(FakeApi::default());

        let result = fetcher.fetch_record("10").await.unwrap();

        let fetched = result.data.expect("record should be fetched");
        assert!(!fetched.is_degraded());
        let data = fetched.resolve(None);
        assert_eq!(data.info.name.as_deref(), Some("mod 10"));
        assert_eq!(data.files.len(), 1);
        assert!(data.changelogs.contains_key("1.0"));
        assert_eq!(fetcher.calls_issued(), 3);
        assert_eq!(fetcher.api().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_info_failure_drops_record_without_dependent_calls() {
        let fetcher = RemoteFetcher::new(FakeApi {
            info: Some(not_found),
            ..FakeApi::default()
        });

        let result = fetcher.fetch_record("10").await.unwrap();

        assert!(result.data.is_none());
        assert_eq!(fetcher.calls_issued(), 1);
        assert_eq!(fetcher.api().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_file_and_changelog_failures_degrade_to_empty() {
        let fetcher = RemoteFetcher::new(FakeApi {
            files: Some(not_found),
            changelogs: Some(not_found),
            ..FakeApi::default()
        });

        assert!(fetcher.fetch_files("10").await.unwrap().is_degraded());

        let fetched = fetcher.fetch_record("10").await.unwrap().data.unwrap();
        assert!(fetched.is_degraded());
        let data = fetched.resolve(None);
        assert!(data.files.is_empty());
        assert!(data.changelogs.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_reads_keep_cached_values() {
        let fetcher = RemoteFetcher::new(FakeApi {
            files: Some(server_error),
            ..FakeApi::default()
        });
        let mut previous = Changelogs::new();
        previous.insert("0.9".to_string(), json!(["old"]));
        let cached = CatalogRecord {
            id: "10".to_string(),
            info: ModInfo::default(),
            state: "normal".to_string(),
            warning_message: String::new(),
            files: Some(vec![json!({"file_id": 1}), json!({"file_id": 2})]),
            changelogs: Some(previous),
        };

        let data = fetcher
            .fetch_record("10")
            .await
            .unwrap()
            .data
            .unwrap()
            .resolve(Some(&cached));

        assert_eq!(data.files, cached.files.unwrap());
        assert!(data.changelogs.contains_key("1.0"), "fresh changelogs replace the cached ones");
        assert!(!data.changelogs.contains_key("0.9"));
    }

    #[tokio::test]
    async fn test_changelog_failure_does_not_affect_files() {
        let fetcher = RemoteFetcher::new(FakeApi {
            changelogs: Some(not_found),
            ..FakeApi::default()
        });

        let data = fetcher.fetch_record("10").await.unwrap().data.unwrap().resolve(None);

        assert_eq!(data.files.len(), 1);
        assert!(data.changelogs.is_empty());
    }

    #[tokio::test]
    async fn test_info_rate_limit_is_escalated() {
        let fetcher = RemoteFetcher::new(FakeApi {
            info: Some(rate_limited),
            ..FakeApi::default()
        });

        let err = fetcher.fetch_record("10").await.unwrap_err();

        assert_eq!(err.target, "10");
    }

    #[tokio::test]
    async fn test_files_rate_limit_is_escalated_after_both_reads_settle() {
        let fetcher = RemoteFetcher::new(FakeApi {
            files: Some(rate_limited),
            ..FakeApi::default()
        });

        assert!(fetcher.fetch_record("10").await.is_err());
        assert_eq!(fetcher.api().calls.load(Ordering::SeqCst), 3);
        assert_eq!(fetcher.calls_issued(), 3);
    }

    #[test]
    fn test_fetched_or_previous() {
        assert_eq!(Fetched::Fresh(1).or_previous(Some(7)), 1);
        assert_eq!(Fetched::Degraded(0).or_previous(Some(7)), 7);
        assert_eq!(Fetched::Degraded(0).or_previous(None), 0);
        assert!(!Fetched::Fresh(()).is_degraded());
    }
}
