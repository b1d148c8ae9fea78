//! Wayfarer Core - Geospatial correlation engine for location-history exports
//!
//! This crate turns raw place, photo, and review records into named
//! regions, proximity correlations, and deduplicated visit timelines,
//! backed by a persistent rate-limited geocoding cache.

pub mod config;
pub mod correlate;
pub mod error;
pub mod geocode;
pub mod models;
pub mod pipeline;
pub mod ports;
pub mod resolve;
pub mod timeline;
pub mod validate;

pub use error::{Result, WayfarerError};
