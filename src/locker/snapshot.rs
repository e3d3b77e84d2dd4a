//! Serializable engine state
//!
//! A snapshot is the free index as `class → ordered free ids` plus the
//! assignment table as `item → (slot, class)`. It is written as JSON to a
//! temporary file and renamed into place, so a crash mid-save leaves the
//! previous snapshot intact.

use super::assignment::Assignment;
use super::size_class::SizeClass;
use super::slot::SlotId;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Station the snapshot was taken from
    pub station: String,
    /// Crate version that wrote the snapshot
    pub version: String,
    pub taken_at: DateTime<Utc>,
    /// Free lockers per class, front first
    pub free: BTreeMap<SizeClass, Vec<SlotId>>,
    /// Outstanding packages
    pub assignments: BTreeMap<String, Assignment>,
}

impl EngineSnapshot {
    pub fn new(
        station: String,
        free: BTreeMap<SizeClass, Vec<SlotId>>,
        assignments: BTreeMap<String, Assignment>,
    ) -> Self {
        Self {
            station,
            version: crate::VERSION.to_string(),
            taken_at: Utc::now(),
            free,
            assignments,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to encode snapshot: {}", e)))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Serialization(format!("Failed to decode snapshot: {}", e)))
    }

    /// Atomically replace the snapshot at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let bytes = self.to_json()?;
        let temp_path = path.with_extension("json.tmp");

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::Io(format!("Failed to create temp snapshot: {}", e)))?;
        file.write_all(&bytes)
            .map_err(|e| Error::Io(format!("Failed to write snapshot: {}", e)))?;
        file.sync_all()
            .map_err(|e| Error::Io(format!("Failed to sync snapshot: {}", e)))?;

        std::fs::rename(&temp_path, path)
            .map_err(|e| Error::Io(format!("Failed to rename snapshot: {}", e)))?;

        debug!(path = ?path, bytes = bytes.len(), "Saved snapshot");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&bytes)
    }
}
