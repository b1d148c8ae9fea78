//! End-to-end batch pipeline: resolve, correlate, aggregate, validate.

use crate::config::EngineConfig;
use crate::correlate::{ItemCorrelation, ProximityCorrelator};
use crate::error::Result;
use crate::geocode::{CacheStats, GeocodeCache};
use crate::models::{PlaceRecord, Region, VisitEvent};
use crate::ports::{CachePersistence, ReverseGeocoder};
use crate::resolve::{RegionResolver, UnresolvedRecord};
use crate::timeline::{EventSources, TimelineAggregator};
use crate::validate::{validate, ValidationReport};
use std::collections::{BTreeMap, HashSet};

/// All parsed export records, split by source.
#[derive(Debug, Default)]
pub struct PipelineInput {
    pub labeled: Vec<PlaceRecord>,
    pub saved: Vec<PlaceRecord>,
    pub photos: Vec<PlaceRecord>,
    pub reviews: Vec<PlaceRecord>,
}

/// Everything a report renderer needs from one run.
#[derive(Debug)]
pub struct PipelineOutput {
    pub regions: BTreeMap<String, Region>,
    pub correlations: BTreeMap<String, ItemCorrelation>,
    pub timelines: BTreeMap<String, crate::models::VisitTimeline>,
    pub ranking: Vec<String>,
    pub unresolved: Vec<UnresolvedRecord>,
    pub cache_stats: CacheStats,
    pub validation: ValidationReport,
}

/// Single-threaded batch pipeline over one export.
pub struct Pipeline<G: ReverseGeocoder, S: CachePersistence> {
    resolver: RegionResolver<G, S>,
    region_radius_miles: f64,
    place_radius_miles: f64,
    review_tolerance_miles: f64,
    dedup_window_hours: i64,
}

impl<G: ReverseGeocoder, S: CachePersistence> Pipeline<G, S> {
    pub fn new(geocoder: G, cache: GeocodeCache<S>, config: &EngineConfig) -> Self {
        Self {
            resolver: RegionResolver::new(geocoder, cache),
            region_radius_miles: config.region_radius_miles.value,
            place_radius_miles: config.place_radius_miles.value,
            review_tolerance_miles: config.review_tolerance_miles.value,
            dedup_window_hours: config.dedup_window_hours.value,
        }
    }

    /// Run the full pipeline. Individual unresolvable records do not
    /// abort the run; they surface in the unresolved bucket.
    pub fn run(mut self, input: PipelineInput) -> Result<PipelineOutput> {
        tracing::info!(
            labeled = input.labeled.len(),
            saved = input.saved.len(),
            photos = input.photos.len(),
            reviews = input.reviews.len(),
            "pipeline starting"
        );

        let known_place_ids: HashSet<String> = input
            .labeled
            .iter()
            .chain(&input.saved)
            .chain(&input.photos)
            .chain(&input.reviews)
            .map(|r| r.id.clone())
            .collect();

        // Stage 1: resolve labeled and saved places into regions.
        // Saved assignments are kept so their timestamps become events.
        let mut saved_assignments: BTreeMap<String, String> = BTreeMap::new();
        for record in &input.labeled {
            if let Err(e) = self.resolver.resolve(record) {
                tracing::debug!(id = %record.id, "labeled place unresolved: {}", e);
            }
        }
        for record in &input.saved {
            match self.resolver.resolve(record) {
                Ok(region) => {
                    saved_assignments.insert(record.id.clone(), region.name);
                }
                Err(e) => {
                    tracing::debug!(id = %record.id, "saved place unresolved: {}", e);
                }
            }
        }

        let (regions, unresolved, mut cache) = self.resolver.into_parts();
        tracing::info!(
            regions = regions.len(),
            unresolved = unresolved.len(),
            "region resolution complete"
        );

        // Stage 2: correlate photos and reviews against the region
        // table and the resolved place candidates.
        let correlator = ProximityCorrelator::new(&regions)
            .with_region_radius(self.region_radius_miles)
            .with_place_radius(self.place_radius_miles)
            .with_review_tolerance(self.review_tolerance_miles);

        let candidates: Vec<PlaceRecord> = input
            .labeled
            .iter()
            .chain(&input.saved)
            .cloned()
            .collect();

        let mut correlations = BTreeMap::new();
        for photo in &input.photos {
            let c = correlator.correlate_photo(photo, &candidates);
            correlations.insert(photo.id.clone(), c);
        }
        for review in &input.reviews {
            let c = correlator.correlate_review(review, &candidates);
            correlations.insert(review.id.clone(), c);
        }

        // Stage 3: turn everything dated into events and aggregate.
        let mut sources = EventSources::default();
        for record in &input.saved {
            if let (Some(region), Some(ts)) =
                (saved_assignments.get(&record.id), record.timestamp)
            {
                sources.saved.push(
                    VisitEvent::new(region, ts, record.provenance, &record.id)
                        .with_place_name(&record.name),
                );
            }
        }
        for record in input.photos.iter().chain(&input.reviews) {
            let correlation = match correlations.get(&record.id) {
                Some(c) => c,
                None => continue,
            };
            if let (Some(region_match), Some(ts)) = (&correlation.region, record.timestamp) {
                let mut event =
                    VisitEvent::new(&region_match.region, ts, record.provenance, &record.id);
                if let Some(place) = &correlation.review_place {
                    event = event.with_place_name(&place.place_name);
                } else if let Some(place) = &correlation.place {
                    event = event.with_place_name(&place.place_name);
                }
                match record.provenance {
                    crate::models::Provenance::Review => sources.reviews.push(event),
                    _ => sources.photos.push(event),
                }
            }
        }

        let aggregator = TimelineAggregator::new(self.dedup_window_hours);
        let events = aggregator.collect_events(sources);
        let deduped = aggregator.deduplicate(events);
        let timelines = aggregator.build_timeline(deduped, &regions);
        let ranking = aggregator.rank_regions(&timelines);

        // Stage 4: validate the combined outputs.
        let validation = validate(&regions, &known_place_ids, &correlations, &timelines);

        let cache_stats = cache.stats();
        if let Err(e) = cache.save() {
            tracing::warn!("final cache flush failed: {}", e);
        }

        tracing::info!(
            regions = regions.len(),
            correlations = correlations.len(),
            valid = validation.valid(),
            "pipeline complete"
        );

        Ok(PipelineOutput {
            regions: regions.iter().map(|r| (r.name.clone(), r)).collect(),
            correlations,
            timelines,
            ranking,
            unresolved,
            cache_stats,
            validation,
        })
    }
}
