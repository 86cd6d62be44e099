//! Persisted key/value snapshot of the latest readings.
//!
//! One JSON file in a namespace shared with out-of-process presentation
//! surfaces (home-screen widget, live surface): per field a display string
//! plus an epoch-seconds timestamp. Written best-effort on every update,
//! loaded once at startup to seed the cache.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::{MonitoredField, ValueSample};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub value: String,
    /// Seconds since epoch.
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seed samples for the cache. A missing or unreadable file is not an
    /// error: the client simply starts cold.
    pub fn load(&self) -> Vec<ValueSample> {
        let txt = match std::fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(_) => return Vec::new(),
        };
        let entries: BTreeMap<String, SnapshotEntry> = match serde_json::from_str(&txt) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable snapshot, starting cold");
                return Vec::new();
            }
        };

        entries
            .iter()
            .filter_map(|(key, entry)| {
                let field = MonitoredField::from_key(key)?;
                let value = entry.value.trim().parse::<f64>().ok()?;
                let observed_at = Utc.timestamp_opt(entry.updated_at, 0).single()?;
                Some(ValueSample::at(field, value, observed_at))
            })
            .collect()
    }

    /// Read-modify-write of one field entry. Best-effort by contract; the
    /// caller logs and swallows the error, the in-memory cache stays
    /// authoritative.
    pub fn persist(
        &self,
        field: MonitoredField,
        value: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<(), SnapshotError> {
        let mut entries = self.read_entries();
        let sample = ValueSample::at(field, value, observed_at);
        entries.insert(
            field.as_str().to_string(),
            SnapshotEntry {
                value: sample.display_value(),
                updated_at: observed_at.timestamp(),
            },
        );

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let txt = serde_json::to_string_pretty(&entries)?;
        // Write-then-rename so out-of-process readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, txt)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read_entries(&self) -> BTreeMap<String, SnapshotEntry> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|txt| serde_json::from_str(&txt).ok())
            .unwrap_or_default()
    }
}
