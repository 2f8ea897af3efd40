//! Merging of fetched or cached mod data with curation annotations
//!
//! The curated `state` and `warningMessage` always come from the current
//! overlay entry, never from the cached record.

use crate::curation::TrackedEntry;
use crate::data::{CatalogRecord, ModData};

/// Builds a catalog record from freshly fetched data
pub fn merge_fetched(entry: &TrackedEntry, data: ModData) -> CatalogRecord {
    CatalogRecord {
        id: entry.id.clone(),
        info: data.info,
        state: entry.state.clone(),
        warning_message: entry.warning_message.clone(),
        files: Some(data.files),
        changelogs: Some(data.changelogs),
    }
}

/// Re-annotates a cached record with the current curation metadata
pub fn merge_cached(entry: &TrackedEntry, cached: CatalogRecord) -> CatalogRecord {
    CatalogRecord {
        id: entry.id.clone(),
        state: entry.state.clone(),
        warning_message: entry.warning_message.clone(),
        ..cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Changelogs, ModInfo};
    use serde_json::json;

    fn cached() -> CatalogRecord {
        CatalogRecord {
            id: "20".to_string(),
            info: ModInfo {
                name: Some("Cached".to_string()),
                updated_timestamp: Some(5),
                ..ModInfo::default()
            },
            state: "normal".to_string(),
            warning_message: String::new(),
            files: Some(vec![json!({"file_id": 9})]),
            changelogs: None,
        }
    }

    #[test]
    fn test_fetched_record_takes_overlay_annotations() {
        let entry = TrackedEntry::new("20").with_annotations("broken", "crashes");
        let data = ModData {
            info: ModInfo {
                name: Some("Fresh".to_string()),
                ..ModInfo::default()
            },
            files: Vec::new(),
            changelogs: Changelogs::new(),
        };

        let record = merge_fetched(&entry, data);

        assert_eq!(record.id, "20");
        assert_eq!(record.info.name.as_deref(), Some("Fresh"));
        assert_eq!(record.state, "broken");
        assert_eq!(record.warning_message, "crashes");
        assert!(record.is_complete(), "fetched records always carry both keys");
    }

    #[test]
    fn test_cached_record_annotations_are_replaced() {
        let entry = TrackedEntry::new("20").with_annotations("outdated", "use v2");

        let record = merge_cached(&entry, cached());

        assert_eq!(record.state, "outdated");
        assert_eq!(record.warning_message, "use v2");
        assert_eq!(record.info.name.as_deref(), Some("Cached"));
        assert_eq!(record.files, cached().files);
        assert!(record.changelogs.is_none());
    }

    #[test]
    fn test_cached_annotations_reset_to_defaults() {
        let mut stale = cached();
        stale.state = "broken".to_string();
        stale.warning_message = "old warning".to_string();

        let record = merge_cached(&TrackedEntry::new("20"), stale);

        assert_eq!(record.state, "normal");
        assert!(record.warning_message.is_empty());
    }
}
