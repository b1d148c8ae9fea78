//! In-memory persistence for development and testing.
//!
//! This implementation uses `RwLock::unwrap()` intentionally. Lock
//! poisoning only occurs when another thread panicked while holding the
//! lock, which is an unrecoverable state. For real runs, use
//! [`crate::JsonFileStore`].

use std::sync::{Arc, RwLock};
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::geocode::cache::CacheSnapshot;
use wayfarer_core::ports::CachePersistence;

/// In-memory implementation of CachePersistence
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshot: Arc<RwLock<Option<CacheSnapshot>>>,
    fail_writes: Arc<RwLock<bool>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail, to exercise the cache's
    /// degrade-to-memory-only path.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().unwrap() = fail;
    }
}

impl CachePersistence for MemoryStore {
    fn load(&self) -> Result<Option<CacheSnapshot>> {
        Ok(self.snapshot.read().unwrap().clone())
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        if *self.fail_writes.read().unwrap() {
            return Err(WayfarerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated write failure",
            )));
        }
        *self.snapshot.write().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}
