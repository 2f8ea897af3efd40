//! Curation overlay: the operator-maintained list of tracked mods
//!
//! The curation file is a JSON array of `{id, state?, warningMessage?}`
//! entries. Entries with a blank or missing id are template rows and are
//! discarded on load.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::{default_state, RawId};

/// Errors that can occur when loading the curation file
#[derive(Debug, Error)]
pub enum CurationError {
    /// The file is missing or unreadable
    #[error("failed to read curation file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid JSON entry list
    #[error("failed to parse curation file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One row of the curation file as written by the operator
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default)]
    state: Option<String>,
    #[serde(rename = "warningMessage", default)]
    warning_message: Option<String>,
}

/// A mod the operator chose to include in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntry {
    pub id: String,
    pub state: String,
    pub warning_message: String,
}

impl TrackedEntry {
    /// Creates an entry with default annotations
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: default_state(),
            warning_message: String::new(),
        }
    }

    /// Sets the curated state and warning message
    pub fn with_annotations(mut self, state: impl Into<String>, warning: impl Into<String>) -> Self {
        self.state = state.into();
        self.warning_message = warning.into();
        self
    }
}

/// Ordered set of tracked entries with lookup by id
#[derive(Debug, Clone, Default)]
pub struct CurationOverlay {
    entries: Vec<TrackedEntry>,
    index: HashMap<String, usize>,
}

impl CurationOverlay {
    /// Loads the overlay from a JSON file
    ///
    /// # Returns
    /// * `Ok(CurationOverlay)` with blank entries filtered out
    /// * `Err(CurationError)` if the file is missing or not valid JSON
    pub fn load(path: &Path) -> Result<Self, CurationError> {
        let content = fs::read_to_string(path).map_err(|source| CurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: Vec<RawEntry> =
            serde_json::from_str(&content).map_err(|source| CurationError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: Vec<RawEntry>) -> Self {
        let mut overlay = Self::default();
        for entry in raw {
            let Some(id) = entry.id.map(RawId::normalize).filter(|id| !id.is_empty()) else {
                debug!("skipping curation entry without an id");
                continue;
            };

            let tracked = TrackedEntry {
                id,
                state: entry.state.unwrap_or_else(default_state),
                warning_message: entry.warning_message.unwrap_or_default(),
            };
            overlay.push(tracked);
        }
        overlay
    }

    /// Builds an overlay from entries already in memory
    pub fn from_entries(entries: impl IntoIterator<Item = TrackedEntry>) -> Self {
        let mut overlay = Self::default();
        for entry in entries {
            overlay.push(entry);
        }
        overlay
    }

    fn push(&mut self, entry: TrackedEntry) {
        if self.index.contains_key(&entry.id) {
            warn!(id = %entry.id, "duplicate curation entry ignored");
            return;
        }
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
    }

    /// Tracked entries in file order
    pub fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    /// Looks up the tracked entry for an id
    pub fn get(&self, id: &str) -> Option<&TrackedEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// Returns `(state, warningMessage)` for an id, defaulting when untracked
    pub fn annotations(&self, id: &str) -> (String, String) {
        match self.get(id) {
            Some(entry) => (entry.state.clone(), entry.warning_message.clone()),
            None => (default_state(), String::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
