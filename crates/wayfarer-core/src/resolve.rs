//! Resolving raw place records into named regions.
//!
//! A record with a usable address yields its city directly; everything
//! else goes through the geocode cache, hitting the upstream service
//! only on a cache miss.

use crate::error::{Result, WayfarerError};
use crate::geocode::{GeocodeCache, GeocodeQuery, ResolvedLocality};
use crate::models::{PlaceRecord, Region, RegionTable};
use crate::ports::{CachePersistence, ReverseGeocoder};

/// Street-type tokens that mark an address component as a street line.
const STREET_SUFFIXES: &[&str] = &["st", "ave", "rd", "dr", "blvd", "way", "place", "pl"];

/// Venue-type tokens; a component naming a venue is not a city.
const VENUE_WORDS: &[&str] = &[
    "marketplace",
    "center",
    "centre",
    "mall",
    "plaza",
    "square",
    "market",
    "hall",
    "building",
];

/// Country names that appear as trailing address components.
const COUNTRY_NAMES: &[&str] = &["usa", "united states", "canada", "mexico", "uk"];

/// A record the resolver could not place into any region.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct UnresolvedRecord {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// Pull a city name out of a comma-separated postal address.
///
/// Walks the components and returns the first one that is not a street
/// line (digits or a street-type token), a venue name, a state-and-ZIP
/// component, or a country name. Suffix matching is token-based, so
/// "Austin" is not mistaken for a street because it contains "st".
pub fn extract_city_from_address(address: &str) -> Option<String> {
    for part in address.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        let lower = part.to_lowercase();
        if COUNTRY_NAMES.contains(&lower.as_str()) {
            continue;
        }
        // Bare state abbreviation ("TX", "CA")
        if part.len() == 2 && part.chars().all(|c| c.is_ascii_uppercase()) {
            continue;
        }
        let is_street_or_venue = lower.split_whitespace().any(|token| {
            let token = token.trim_end_matches('.');
            STREET_SUFFIXES.contains(&token) || VENUE_WORDS.contains(&token)
        });
        if is_street_or_venue {
            continue;
        }
        return Some(part.to_string());
    }
    None
}

/// Turns place records into named regions, maintaining the region table
/// and an unresolved bucket as it goes.
pub struct RegionResolver<G: ReverseGeocoder, S: CachePersistence> {
    geocoder: G,
    cache: GeocodeCache<S>,
    regions: RegionTable,
    unresolved: Vec<UnresolvedRecord>,
}

impl<G: ReverseGeocoder, S: CachePersistence> RegionResolver<G, S> {
    pub fn new(geocoder: G, cache: GeocodeCache<S>) -> Self {
        Self {
            geocoder,
            cache,
            regions: RegionTable::new(),
            unresolved: Vec::new(),
        }
    }

    /// Resolve one record to its region, creating or updating the
    /// region as a side effect. Failures land in the unresolved bucket
    /// as well as the returned error; nothing is silently dropped.
    pub fn resolve(&mut self, record: &PlaceRecord) -> Result<Region> {
        if let Some(address) = &record.address {
            if let Some(city) = extract_city_from_address(address) {
                tracing::debug!(id = %record.id, city = %city, "resolved from address");
                return Ok(self.upsert_region(&city, record));
            }
        }

        match self.reverse_geocode(record) {
            Ok(locality) => match locality.region_name() {
                Some(name) => Ok(self.upsert_region(&name, record)),
                None => {
                    let reason = "reverse geocode returned no locality".to_string();
                    self.mark_unresolved(record, &reason);
                    Err(WayfarerError::UnresolvableLocation {
                        id: record.id.clone(),
                        reason,
                    })
                }
            },
            Err(e) => {
                let reason = e.to_string();
                self.mark_unresolved(record, &reason);
                Err(WayfarerError::UnresolvableLocation {
                    id: record.id.clone(),
                    reason,
                })
            }
        }
    }

    /// Reverse geocode through the cache. A miss makes exactly one
    /// rate-limited upstream call and stores the result.
    fn reverse_geocode(&mut self, record: &PlaceRecord) -> Result<ResolvedLocality> {
        let query = GeocodeQuery::Reverse(record.coordinate);

        if let Some(cached) = self.cache.lookup(&query) {
            return serde_json::from_value(cached).map_err(|e| WayfarerError::CacheCorruption {
                reason: format!("cached response does not parse: {}", e),
            });
        }

        self.cache.enforce_rate_limit()?;
        let locality = self.geocoder.reverse(record.coordinate)?;
        let value = serde_json::to_value(&locality)?;
        self.cache.store(&query, value);
        Ok(locality)
    }

    fn mark_unresolved(&mut self, record: &PlaceRecord, reason: &str) {
        tracing::warn!(id = %record.id, reason = %reason, "record left unresolved");
        self.unresolved.push(UnresolvedRecord {
            id: record.id.clone(),
            name: record.name.clone(),
            reason: reason.to_string(),
        });
    }

    /// Add the record's coordinate and id to the named region.
    pub fn upsert_region(&mut self, name: &str, record: &PlaceRecord) -> Region {
        self.regions.upsert(name, record.coordinate, Some(&record.id))
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    pub fn unresolved(&self) -> &[UnresolvedRecord] {
        &self.unresolved
    }

    /// Tear down into the region table, the unresolved bucket, and the
    /// cache (for stats reporting and final persistence).
    pub fn into_parts(self) -> (RegionTable, Vec<UnresolvedRecord>, GeocodeCache<S>) {
        (self.regions, self.unresolved, self.cache)
    }
}
