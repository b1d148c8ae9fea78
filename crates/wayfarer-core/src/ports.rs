//! Trait seams between the core engine and the outside world.
//!
//! The core stays synchronous and backend-agnostic: adapters for the
//! filesystem live in `wayfarer-store`, the HTTP geocoder in
//! [`crate::geocode::nominatim`], and tests supply in-memory stand-ins.

use crate::error::Result;
use crate::geocode::cache::CacheSnapshot;
use crate::geocode::nominatim::ResolvedLocality;
use crate::models::Coordinate;

/// Durable storage for the geocode cache snapshot.
pub trait CachePersistence {
    /// Load the previously saved snapshot, or `None` on first run.
    fn load(&self) -> Result<Option<CacheSnapshot>>;

    /// Persist the snapshot, replacing any previous one atomically.
    fn save(&self, snapshot: &CacheSnapshot) -> Result<()>;
}

/// Upstream reverse-geocoding service.
pub trait ReverseGeocoder {
    /// Resolve a coordinate to its administrative locality.
    fn reverse(&self, coordinate: Coordinate) -> Result<ResolvedLocality>;
}
