//! JSON file adapter for the geocode cache snapshot.

use std::fs;
use std::path::PathBuf;
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::geocode::cache::CacheSnapshot;
use wayfarer_core::ports::CachePersistence;

/// Stores the snapshot as a single pretty-printed JSON file.
///
/// Writes go to a sibling temp file first and rename into place, so a
/// crash mid-write leaves the previous snapshot intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl CachePersistence for JsonFileStore {
    fn load(&self) -> Result<Option<CacheSnapshot>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WayfarerError::Io(e)),
        };

        let snapshot =
            serde_json::from_str(&content).map_err(|e| WayfarerError::CacheCorruption {
                reason: format!("{}: {}", self.path.display(), e),
            })?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        tracing::trace!(path = %self.path.display(), "cache snapshot written");
        Ok(())
    }
}
