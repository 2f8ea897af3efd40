//! Nexus Mods API client
//!
//! Provides the `ModsApi` contract the sync engine consumes and a reqwest
//! implementation of it against the public Nexus Mods v1 REST API.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::{Changelogs, ModInfo, UpdatedMod};
use crate::config::RecencyWindow;

/// Base URL for the Nexus Mods API
pub const NEXUS_BASE_URL: &str = "https://api.nexusmods.com";

/// Errors that can occur when calling the Nexus API
#[derive(Debug, Error)]
pub enum NexusError {
    /// The API answered 429; the quota for this key is exhausted
    #[error("rate limited by the Nexus API")]
    RateLimited,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Nexus API returned status {0}")]
    Status(u16),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl NexusError {
    /// Whether this error is the distinguished rate-limit signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, NexusError::RateLimited)
    }
}

/// Read-only view of the upstream API used by the sync engine
///
/// Implemented by [`NexusClient`] for real runs and by in-memory fakes in
/// tests, so the classifier and scheduler never need a network.
#[async_trait]
pub trait ModsApi: Send + Sync {
    /// Fetches the summary information for one mod
    async fn mod_info(&self, id: &str) -> Result<ModInfo, NexusError>;

    /// Fetches the file listing for one mod
    async fn mod_files(&self, id: &str) -> Result<Vec<Value>, NexusError>;

    /// Fetches the changelog map for one mod
    async fn mod_changelogs(&self, id: &str) -> Result<Changelogs, NexusError>;

    /// Lists mods changed upstream within the given window
    async fn updated_mods(&self, window: RecencyWindow) -> Result<Vec<UpdatedMod>, NexusError>;
}

/// Envelope of the files endpoint; only the listing itself is kept
#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    files: Vec<Value>,
}

/// Client for the Nexus Mods v1 API scoped to a single game
#[derive(Debug, Clone)]
pub struct NexusClient {
    http_client: Client,
    api_key: String,
    game: String,
    /// Base URL for the API (allows override for testing)
    base_url: String,
}

impl NexusClient {
    /// Creates a new NexusClient for the given game domain
    pub fn new(api_key: impl Into<String>, game: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            game: game.into(),
            base_url: NEXUS_BASE_URL.to_string(),
        }
    }

    /// Overrides the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn mod_url(&self, id: &str, suffix: &str) -> String {
        format!(
            "{}/v1/games/{}/mods/{}{}.json",
            self.base_url, self.game, id, suffix
        )
    }

    fn updated_url(&self, window: RecencyWindow) -> String {
        format!(
            "{}/v1/games/{}/mods/updated.json?period={}",
            self.base_url,
            self.game,
            window.as_period()
        )
    }

    /// Issues one authenticated GET and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, NexusError> {
        debug!(url, "GET");

        let response = self
            .http_client
            .get(url)
            .header("apikey", &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        check_status(response.status())?;

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Maps a response status onto the error taxonomy
fn check_status(status: StatusCode) -> Result<(), NexusError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(NexusError::RateLimited);
    }
    if !status.is_success() {
        return Err(NexusError::Status(status.as_u16()));
    }
    Ok(())
}

#[async_trait]
impl ModsApi for NexusClient {
    async fn mod_info(&self, id: &str) -> Result<ModInfo, NexusError> {
        self.get_json(&self.mod_url(id, "")).await
    }

    async fn mod_files(&self, id: &str) -> Result<Vec<Value>, NexusError> {
        let response: FilesResponse = self.get_json(&self.mod_url(id, "/files")).await?;
        Ok(response.files)
    }

    async fn mod_changelogs(&self, id: &str) -> Result<Changelogs, NexusError> {
        self.get_json(&self.mod_url(id, "/changelogs")).await
    }

    async fn updated_mods(&self, window: RecencyWindow) -> Result<Vec<UpdatedMod>, NexusError> {
        self.get_json(&self.updated_url(window)).await
    }
}
