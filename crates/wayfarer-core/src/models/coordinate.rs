//! Validated geographic coordinates and distance helpers.
//!
//! All distances are great-circle (Haversine); inputs span arbitrary
//! latitudes, so flat Euclidean math is never used.

use crate::error::{Result, WayfarerError};
use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// Distance units for spatial thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceUnit {
    #[default]
    Meters,
    Kilometers,
    Miles,
}

impl DistanceUnit {
    /// Convert a distance value to meters
    pub fn to_meters(&self, value: f64) -> f64 {
        match self {
            DistanceUnit::Meters => value,
            DistanceUnit::Kilometers => value * 1000.0,
            DistanceUnit::Miles => value * 1609.34,
        }
    }

    /// Convert a distance value from meters to this unit
    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            DistanceUnit::Meters => meters,
            DistanceUnit::Kilometers => meters / 1000.0,
            DistanceUnit::Miles => meters / 1609.34,
        }
    }
}

/// A WGS 84 coordinate pair, validated on construction.
///
/// Out-of-range values are rejected with `InvalidCoordinate`, never
/// silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside
    /// latitude [-90, 90] / longitude [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !Self::in_range(latitude, longitude) {
            return Err(WayfarerError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Range check shared with the validation layer.
    pub fn in_range(latitude: f64, longitude: f64) -> bool {
        latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
    }

    /// Great-circle distance to another coordinate in meters
    pub fn distance_meters(&self, other: Coordinate) -> f64 {
        let a = Point::new(self.longitude, self.latitude);
        let b = Point::new(other.longitude, other.latitude);
        Haversine.distance(a, b)
    }

    /// Great-circle distance to another coordinate in miles
    pub fn distance_miles(&self, other: Coordinate) -> f64 {
        DistanceUnit::Miles.from_meters(self.distance_meters(other))
    }
}
