//! TTL-based geocode result cache with pluggable persistence.
//!
//! The cache stores raw JSON responses keyed by a stable query key, so
//! a re-run over the same export makes zero upstream calls. Entries
//! expire after a configurable TTL; expired entries count as misses but
//! are only physically removed by [`GeocodeCache::compact`].

use crate::error::{Result, WayfarerError};
use crate::geocode::limiter::RateLimiter;
use crate::models::Coordinate;
use crate::ports::CachePersistence;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Snapshot format version. Bump when the envelope shape changes.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// A geocoding query, convertible to a stable cache key.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeQuery {
    /// Coordinate to locality
    Reverse(Coordinate),
    /// Free-text place name to coordinate
    Forward(String),
}

impl GeocodeQuery {
    /// Stable cache key. Reverse keys round coordinates to six decimal
    /// places (about 0.1 m), so nearby float noise shares one entry.
    pub fn key(&self) -> String {
        match self {
            GeocodeQuery::Reverse(coord) => {
                format!("reverse_{:.6}_{:.6}", coord.latitude, coord.longitude)
            }
            GeocodeQuery::Forward(text) => {
                let normalized = text
                    .trim()
                    .to_lowercase()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("_");
                format!("forward_{}", normalized)
            }
        }
    }

    /// JSON description stored alongside the response for debugging.
    pub fn describe(&self) -> Value {
        match self {
            GeocodeQuery::Reverse(coord) => serde_json::json!({
                "type": "reverse",
                "latitude": coord.latitude,
                "longitude": coord.longitude,
            }),
            GeocodeQuery::Forward(text) => serde_json::json!({
                "type": "forward",
                "query": text,
            }),
        }
    }
}

/// One cached response with the time it was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub query: Value,
    pub response: Value,
}

/// Serialized cache envelope. Counters persist across runs so hit
/// ratios reflect the cache's whole life, not one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl CacheSnapshot {
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            created: now,
            last_updated: now,
            cache_hits: 0,
            cache_misses: 0,
            entries: BTreeMap::new(),
        }
    }
}

/// Cache statistics for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
}

/// Geocode cache over a persistence backend.
///
/// Falls back to memory-only operation if the backend fails on write:
/// a broken disk should slow the run down, not kill it.
pub struct GeocodeCache<S: CachePersistence> {
    store: S,
    snapshot: CacheSnapshot,
    ttl: Duration,
    limiter: RateLimiter,
    persistent: bool,
}

impl<S: CachePersistence> GeocodeCache<S> {
    /// Open the cache, loading any prior snapshot. A corrupt snapshot
    /// is logged and replaced with an empty one rather than propagated;
    /// the cache is an optimization, not a source of truth.
    pub fn open(store: S, ttl_days: i64, limiter: RateLimiter) -> Self {
        let snapshot = match store.load() {
            Ok(Some(snapshot)) => {
                tracing::debug!(
                    entries = snapshot.entries.len(),
                    "loaded geocode cache snapshot"
                );
                snapshot
            }
            Ok(None) => CacheSnapshot::empty(),
            Err(e) => {
                tracing::warn!("discarding unreadable geocode cache: {}", e);
                CacheSnapshot::empty()
            }
        };

        Self {
            store,
            snapshot,
            ttl: Duration::days(ttl_days),
            limiter,
            persistent: true,
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        Utc::now() - entry.timestamp > self.ttl
    }

    /// Look up a query. An expired entry counts as a miss but is kept
    /// in place until [`compact`](Self::compact) runs.
    pub fn lookup(&mut self, query: &GeocodeQuery) -> Option<Value> {
        let key = query.key();
        let cached = self
            .snapshot
            .entries
            .get(&key)
            .map(|e| (e.response.clone(), self.is_expired(e)));

        match cached {
            Some((response, false)) => {
                self.snapshot.cache_hits += 1;
                tracing::trace!(key = %key, "geocode cache hit");
                Some(response)
            }
            Some((_, true)) => {
                self.snapshot.cache_misses += 1;
                tracing::trace!(key = %key, "geocode cache entry expired");
                None
            }
            None => {
                self.snapshot.cache_misses += 1;
                None
            }
        }
    }

    /// Store a response and persist the snapshot. A write failure
    /// degrades the cache to memory-only for the rest of the run.
    pub fn store(&mut self, query: &GeocodeQuery, response: Value) {
        let key = query.key();
        self.snapshot.entries.insert(
            key,
            CacheEntry {
                timestamp: Utc::now(),
                query: query.describe(),
                response,
            },
        );
        self.snapshot.last_updated = Utc::now();
        self.persist();
    }

    fn persist(&mut self) {
        if !self.persistent {
            return;
        }
        if let Err(e) = self.store.save(&self.snapshot) {
            tracing::warn!("geocode cache write failed, continuing in memory: {}", e);
            self.persistent = false;
        }
    }

    /// Block until the upstream may be called again.
    pub fn enforce_rate_limit(&mut self) -> Result<()> {
        self.limiter.acquire()
    }

    /// Drop expired entries and persist the smaller snapshot. Returns
    /// the number of entries removed.
    pub fn compact(&mut self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let before = self.snapshot.entries.len();
        self.snapshot.entries.retain(|_, e| e.timestamp > cutoff);
        let removed = before - self.snapshot.entries.len();
        if removed > 0 {
            self.snapshot.last_updated = Utc::now();
            self.persist();
            tracing::info!(removed, "compacted geocode cache");
        }
        removed
    }

    /// Remove every entry and reset counters.
    pub fn clear(&mut self) {
        self.snapshot = CacheSnapshot::empty();
        self.persist();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.snapshot.cache_hits;
        let misses = self.snapshot.cache_misses;
        let total = hits + misses;
        CacheStats {
            entries: self.snapshot.entries.len(),
            hits,
            misses,
            hit_ratio: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    pub fn snapshot(&self) -> &CacheSnapshot {
        &self.snapshot
    }

    /// Flush the current snapshot to the backend.
    pub fn save(&mut self) -> Result<()> {
        if !self.persistent {
            return Err(WayfarerError::CacheCorruption {
                reason: "cache degraded to memory-only after earlier write failure".to_string(),
            });
        }
        self.store.save(&self.snapshot)
    }
}
