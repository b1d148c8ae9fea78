//! Visit events and per-region timelines.

use crate::models::Provenance;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One dated visit derived from a place, photo, or review record.
/// Events are immutable facts; they are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitEvent {
    pub region: String,
    pub timestamp: DateTime<Utc>,
    pub source: Provenance,
    pub source_id: String,
    pub place_name: Option<String>,
}

impl VisitEvent {
    pub fn new(
        region: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: Provenance,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            timestamp,
            source,
            source_id: source_id.into(),
            place_name: None,
        }
    }

    pub fn with_place_name(mut self, name: impl Into<String>) -> Self {
        self.place_name = Some(name.into());
        self
    }
}

/// Chronological, deduplicated visit history for one region plus the
/// aggregates derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitTimeline {
    pub region: String,
    pub visit_count: usize,
    pub first_visit: Option<DateTime<Utc>>,
    pub last_visit: Option<DateTime<Utc>>,
    /// Mean gap between consecutive visits; omitted below 2 visits.
    pub avg_days_between_visits: Option<f64>,
    pub visits_by_year: BTreeMap<i32, usize>,
    /// Keyed "YYYY-MM"
    pub visits_by_month: BTreeMap<String, usize>,
    pub visits: Vec<VisitEvent>,
}

impl VisitTimeline {
    /// A retained-but-empty timeline; regions with zero valid events are
    /// reported with zero counts, not omitted.
    pub fn empty(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            visit_count: 0,
            first_visit: None,
            last_visit: None,
            avg_days_between_visits: None,
            visits_by_year: BTreeMap::new(),
            visits_by_month: BTreeMap::new(),
            visits: Vec::new(),
        }
    }
}
