//! Geocoding: upstream client, result cache, and request pacing.

pub mod cache;
pub mod limiter;
pub mod nominatim;

pub use cache::{CacheEntry, CacheSnapshot, CacheStats, GeocodeCache, GeocodeQuery};
pub use limiter::RateLimiter;
pub use nominatim::{NominatimClient, ResolvedLocality};
