//! Catalog store for persisting the synced catalog to disk
//!
//! Provides a `CatalogStore` that reads the previous run's catalog as a cache
//! and writes the rebuilt catalog back as a full replacement.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;
use tracing::{info, warn};

use crate::data::CatalogRecord;

/// File name of the catalog inside the default cache directory
const CATALOG_FILE_NAME: &str = "catalog.json";

/// Errors that can occur when writing the catalog
#[derive(Debug, Error)]
pub enum StoreError {
    /// Directory creation, write or rename failed
    #[error("failed to write catalog to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog could not be serialized
    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reads and writes the catalog file
///
/// A missing or unparsable catalog is not an error: the first run always
/// starts from an empty cache.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    /// Location of the catalog file
    path: PathBuf,
}

impl CatalogStore {
    /// Creates a CatalogStore in the XDG-compliant cache directory
    ///
    /// Uses `~/.cache/nexus-sync/catalog.json` on Linux, or the equivalent path
    /// on other platforms. Returns `None` if no home directory can be found.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "nexus-sync")?;
        let path = project_dirs.cache_dir().join(CATALOG_FILE_NAME);
        Some(Self { path })
    }

    /// Creates a CatalogStore backed by a specific file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the catalog file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the previous catalog keyed by mod id
    ///
    /// Returns an empty map if the file doesn't exist or cannot be parsed.
    /// If the same id appears twice, the later record wins.
    pub fn load(&self) -> HashMap<String, CatalogRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                info!(path = %self.path.display(), error = %e, "no usable catalog, starting with an empty cache");
                return HashMap::new();
            }
        };

        let records: Vec<CatalogRecord> = match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "catalog is corrupt, starting with an empty cache");
                return HashMap::new();
            }
        };

        records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect()
    }

    /// Overwrites the catalog with the given records
    ///
    /// The parent directory is created if missing. The catalog is written to a
    /// sibling temporary file first and then renamed over the target.
    pub fn save(&self, records: &[CatalogRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(write_err)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
