//! Error types for wayfarer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WayfarerError {
    // Coordinate errors
    #[error("coordinate out of range: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    // Resolution errors
    #[error("could not resolve a region for record {id}: {reason}")]
    UnresolvableLocation { id: String, reason: String },

    #[error("malformed timestamp: {value}")]
    MalformedTimestamp { value: String },

    // Cache errors
    #[error("geocoding cache corrupted: {reason}")]
    CacheCorruption { reason: String },

    // Defensive assertion on the upstream gate; should never surface
    // outside the geocoding layer.
    #[error("rate limit violated: upstream call {elapsed_ms} ms after the previous one")]
    RateLimitViolation { elapsed_ms: u64 },

    // Upstream geocoder errors
    #[error("geocoder unavailable: {reason}")]
    GeocoderUnavailable { reason: String },

    // Configuration errors
    #[error("invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for WayfarerError {
    fn from(err: serde_json::Error) -> Self {
        WayfarerError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WayfarerError>;
