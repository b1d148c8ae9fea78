//! Merging dated events into per-region visit histories.

use crate::models::{normalize_name, RegionTable, VisitEvent, VisitTimeline};
use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::BTreeMap;

/// Region-tagged events gathered from each correlated source.
#[derive(Debug, Default)]
pub struct EventSources {
    pub saved: Vec<VisitEvent>,
    pub photos: Vec<VisitEvent>,
    pub reviews: Vec<VisitEvent>,
}

/// Builds deduplicated visit timelines from correlated events.
pub struct TimelineAggregator {
    window: Duration,
}

impl TimelineAggregator {
    pub fn new(window_hours: i64) -> Self {
        Self {
            window: Duration::hours(window_hours),
        }
    }

    /// Flatten all sources into one event list, dropping epoch-zero
    /// sentinel timestamps that some exports emit for undated items.
    pub fn collect_events(&self, sources: EventSources) -> Vec<VisitEvent> {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        sources
            .saved
            .into_iter()
            .chain(sources.photos)
            .chain(sources.reviews)
            .filter(|e| {
                if e.timestamp <= epoch {
                    tracing::debug!(
                        source_id = %e.source_id,
                        "dropping event with sentinel timestamp"
                    );
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    /// Collapse near-simultaneous same-region events into one visit.
    ///
    /// Events are grouped per region and sorted chronologically; runs
    /// where each consecutive gap is within the window form one visit.
    /// The run's representative is the highest-priority source
    /// (review > saved > photo), earliest timestamp on ties, then
    /// smallest source id. Because adjacent runs are separated by more
    /// than the window, applying deduplication twice changes nothing.
    pub fn deduplicate(&self, events: Vec<VisitEvent>) -> Vec<VisitEvent> {
        let mut by_region: BTreeMap<String, Vec<VisitEvent>> = BTreeMap::new();
        for event in events {
            by_region
                .entry(normalize_name(&event.region))
                .or_default()
                .push(event);
        }

        let mut result = Vec::new();
        for (_, mut group) in by_region {
            group.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

            let mut cluster: Vec<VisitEvent> = Vec::new();
            for event in group {
                let starts_new = match cluster.last() {
                    Some(prev) => event.timestamp - prev.timestamp > self.window,
                    None => false,
                };
                if starts_new {
                    result.push(Self::representative(std::mem::take(&mut cluster)));
                }
                cluster.push(event);
            }
            if !cluster.is_empty() {
                result.push(Self::representative(cluster));
            }
        }

        result.sort_by(|a, b| {
            a.region
                .cmp(&b.region)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        result
    }

    fn representative(cluster: Vec<VisitEvent>) -> VisitEvent {
        debug_assert!(!cluster.is_empty());
        cluster
            .into_iter()
            .reduce(|best, candidate| {
                let ord = candidate
                    .source
                    .dedup_priority()
                    .cmp(&best.source.dedup_priority())
                    .then_with(|| best.timestamp.cmp(&candidate.timestamp))
                    .then_with(|| best.source_id.cmp(&candidate.source_id));
                if ord == std::cmp::Ordering::Greater {
                    candidate
                } else {
                    best
                }
            })
            .unwrap_or_else(|| unreachable!("representative of empty cluster"))
    }

    /// Group deduplicated events into per-region timelines with derived
    /// aggregates. Every region in the table gets a timeline, including
    /// those with zero valid events, so totals reconcile.
    pub fn build_timeline(
        &self,
        events: Vec<VisitEvent>,
        regions: &RegionTable,
    ) -> BTreeMap<String, VisitTimeline> {
        let mut timelines: BTreeMap<String, VisitTimeline> = regions
            .iter()
            .map(|r| (r.name.clone(), VisitTimeline::empty(&r.name)))
            .collect();

        let mut by_region: BTreeMap<String, Vec<VisitEvent>> = BTreeMap::new();
        for event in events {
            by_region
                .entry(event.region.clone())
                .or_default()
                .push(event);
        }

        for (region, mut visits) in by_region {
            visits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

            let visit_count = visits.len();
            let first_visit = visits.first().map(|e| e.timestamp);
            let last_visit = visits.last().map(|e| e.timestamp);

            let avg_days_between_visits = if visit_count >= 2 {
                let total: i64 = visits
                    .windows(2)
                    .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_seconds())
                    .sum();
                Some(total as f64 / (visit_count - 1) as f64 / 86_400.0)
            } else {
                None
            };

            let mut visits_by_year = BTreeMap::new();
            let mut visits_by_month = BTreeMap::new();
            for visit in &visits {
                *visits_by_year.entry(visit.timestamp.year()).or_insert(0) += 1;
                *visits_by_month
                    .entry(visit.timestamp.format("%Y-%m").to_string())
                    .or_insert(0) += 1;
            }

            timelines.insert(
                region.clone(),
                VisitTimeline {
                    region,
                    visit_count,
                    first_visit,
                    last_visit,
                    avg_days_between_visits,
                    visits_by_year,
                    visits_by_month,
                    visits,
                },
            );
        }

        timelines
    }

    /// Region names ordered by visit count descending, name ascending
    /// on ties.
    pub fn rank_regions(&self, timelines: &BTreeMap<String, VisitTimeline>) -> Vec<String> {
        let mut names: Vec<&VisitTimeline> = timelines.values().collect();
        names.sort_by(|a, b| {
            b.visit_count
                .cmp(&a.visit_count)
                .then_with(|| a.region.cmp(&b.region))
        });
        names.into_iter().map(|t| t.region.clone()).collect()
    }
}
