//! Core data models for the Nexus catalog
//!
//! This module contains the record shapes shared by the curation overlay,
//! the catalog store and the Nexus API client.

pub mod nexus;

pub use nexus::{NexusClient, NexusError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// State applied to tracked mods that carry no explicit annotation
pub const DEFAULT_STATE: &str = "normal";

/// Changelog map keyed by mod version. The values are opaque to the sync.
pub type Changelogs = Map<String, Value>;

/// Summary information for a single mod as returned by the info endpoint
///
/// Every field is optional: Nexus answers with `null` for several of them
/// when a mod is hidden or under moderation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModInfo {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub version: Option<String>,
    pub picture_url: Option<String>,
    pub author: Option<String>,
    /// Total download count
    pub mod_downloads: Option<u64>,
    pub endorsement_count: Option<u64>,
    /// Unix timestamp of the last upstream update
    pub updated_timestamp: Option<i64>,
    /// Unix timestamp of the first upload
    pub created_timestamp: Option<i64>,
    pub description: Option<String>,
}

/// Everything fetched from Nexus for one mod in a single run
#[derive(Debug, Clone, PartialEq)]
pub struct ModData {
    pub info: ModInfo,
    pub files: Vec<Value>,
    pub changelogs: Changelogs,
}

/// One record of the persisted catalog
///
/// The same shape is written at the end of a run and read back as the cache
/// at the start of the next one. `files` and `changelogs` are `None` when the
/// key was absent (or `null`) on disk, which marks the record incomplete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(flatten)]
    pub info: ModInfo,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(rename = "warningMessage", default)]
    pub warning_message: String,
    #[serde(default)]
    pub files: Option<Vec<Value>>,
    #[serde(default)]
    pub changelogs: Option<Changelogs>,
}

impl CatalogRecord {
    /// Returns true when both the file listing and changelog keys are present
    pub fn is_complete(&self) -> bool {
        self.files.is_some() && self.changelogs.is_some()
    }
}

/// An entry of the upstream "recently updated" listing
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatedMod {
    #[serde(deserialize_with = "deserialize_id")]
    pub mod_id: String,
    #[serde(default)]
    pub latest_file_update: Option<i64>,
    #[serde(default)]
    pub latest_mod_activity: Option<i64>,
}

impl UpdatedMod {
    /// Latest mod activity as a UTC timestamp, if the upstream reported one
    pub fn activity_time(&self) -> Option<DateTime<Utc>> {
        self.latest_mod_activity
            .or(self.latest_file_update)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

pub(crate) fn default_state() -> String {
    DEFAULT_STATE.to_string()
}

/// Identifier as it may appear in JSON: Nexus ids are numeric, curated files
/// often carry them as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    /// Normalizes the identifier to its trimmed string form
    pub(crate) fn normalize(self) -> String {
        match self {
            RawId::Text(text) => text.trim().to_string(),
            RawId::Number(number) => number.to_string(),
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(RawId::normalize)
}
