//! Wayfarer Store - Cache persistence adapters
//!
//! This crate provides the filesystem adapter for the geocode cache
//! snapshot, plus an in-memory adapter for tests and ephemeral runs.

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
