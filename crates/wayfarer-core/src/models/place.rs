//! Input records produced by the export parsers.

use crate::models::Coordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a record came from within the export.
///
/// The ordering of `dedup_priority` decides which source survives when
/// near-simultaneous visits collapse: review > saved > photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Labeled,
    Saved,
    Review,
    Photo,
}

impl Provenance {
    /// Priority used by visit deduplication; higher survives.
    pub fn dedup_priority(&self) -> u8 {
        match self {
            Provenance::Review => 3,
            Provenance::Saved => 2,
            Provenance::Photo => 1,
            Provenance::Labeled => 0,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provenance::Labeled => "labeled",
            Provenance::Saved => "saved",
            Provenance::Review => "review",
            Provenance::Photo => "photo",
        };
        f.write_str(s)
    }
}

/// One raw place/photo/review record from the export.
///
/// Immutable once created: the core reads these, it never writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub coordinate: Coordinate,
    pub timestamp: Option<DateTime<Utc>>,
    pub provenance: Provenance,
}

impl PlaceRecord {
    /// Create a record with no address or timestamp
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        coordinate: Coordinate,
        provenance: Provenance,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: None,
            coordinate,
            timestamp: None,
            provenance,
        }
    }

    /// Attach the source address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Attach the source timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
