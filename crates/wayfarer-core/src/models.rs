//! Canonical domain types used across all wayfarer crates.

pub mod coordinate;
pub mod event;
pub mod place;
pub mod region;

pub use coordinate::{Coordinate, DistanceUnit};
pub use event::{VisitEvent, VisitTimeline};
pub use place::{PlaceRecord, Provenance};
pub use region::{normalize_name, Region, RegionTable};
