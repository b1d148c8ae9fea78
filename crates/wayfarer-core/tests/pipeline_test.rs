//! End-to-end pipeline runs against a scripted geocoder.

use chrono::{DateTime, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use wayfarer_core::config::EngineConfig;
use wayfarer_core::error::Result;
use wayfarer_core::geocode::cache::CacheSnapshot;
use wayfarer_core::geocode::{GeocodeCache, RateLimiter, ResolvedLocality};
use wayfarer_core::models::{Coordinate, PlaceRecord, Provenance};
use wayfarer_core::pipeline::{Pipeline, PipelineInput};
use wayfarer_core::ports::{CachePersistence, ReverseGeocoder};

/// In-memory persistence; real file-backed storage lives in
/// wayfarer-store and has its own tests.
#[derive(Default)]
struct MemoryPersistence {
    snapshot: RefCell<Option<CacheSnapshot>>,
}

impl CachePersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<CacheSnapshot>> {
        Ok(self.snapshot.borrow().clone())
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        *self.snapshot.borrow_mut() = Some(snapshot.clone());
        Ok(())
    }
}

/// Scripted geocoder: answers by latitude band and counts calls.
struct StubGeocoder {
    calls: Cell<usize>,
}

impl StubGeocoder {
    fn new() -> Self {
        Self { calls: Cell::new(0) }
    }
}

impl ReverseGeocoder for StubGeocoder {
    fn reverse(&self, coordinate: Coordinate) -> Result<ResolvedLocality> {
        self.calls.set(self.calls.get() + 1);
        let city = if coordinate.latitude > 30.0 {
            "Austin"
        } else {
            "Houston"
        };
        Ok(ResolvedLocality {
            city: Some(city.to_string()),
            state: Some("Texas".to_string()),
            country_code: Some("us".to_string()),
            ..Default::default()
        })
    }
}

fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::with_defaults();
    config.rate_limit_secs.value = 0.0;
    config
}

fn open_cache(config: &EngineConfig) -> GeocodeCache<MemoryPersistence> {
    GeocodeCache::open(
        MemoryPersistence::default(),
        config.cache_ttl_days.value,
        RateLimiter::per_second(config.rate_limit_secs.value),
    )
}

const AUSTIN: (f64, f64) = (30.2672, -97.7431);

fn austin_coord(dlat: f64, dlon: f64) -> Coordinate {
    Coordinate::new(AUSTIN.0 + dlat, AUSTIN.1 + dlon).unwrap()
}

#[test]
fn full_run_builds_regions_correlations_and_timelines() {
    let config = test_config();
    let pipeline = Pipeline::new(StubGeocoder::new(), open_cache(&config), &config);

    let input = PipelineInput {
        labeled: vec![PlaceRecord::new(
            "home",
            "Home",
            austin_coord(0.0, 0.0),
            Provenance::Labeled,
        )],
        saved: vec![
            PlaceRecord::new(
                "saved_bbq",
                "Franklin Barbecue",
                austin_coord(0.01, 0.01),
                Provenance::Saved,
            )
            .with_timestamp(ts(2023, 6, 1, 12)),
            PlaceRecord::new(
                "saved_later",
                "Zilker Park",
                austin_coord(-0.02, 0.0),
                Provenance::Saved,
            )
            .with_timestamp(ts(2023, 7, 15, 9)),
        ],
        photos: vec![PlaceRecord::new(
            "photo_1",
            "IMG_0001.jpg",
            austin_coord(0.01, 0.01),
            Provenance::Photo,
        )
        .with_timestamp(ts(2023, 6, 1, 14))],
        reviews: vec![PlaceRecord::new(
            "review_1",
            "Franklin Barbecue",
            austin_coord(0.0101, 0.0099),
            Provenance::Review,
        )
        .with_timestamp(ts(2023, 6, 1, 18))],
    };

    let output = pipeline.run(input).unwrap();

    // One region: every record resolves to Austin.
    assert_eq!(output.regions.len(), 1);
    let region = &output.regions["Austin, Texas, US"];
    assert!(region.members.contains(&"home".to_string()));
    assert!(region.members.contains(&"saved_bbq".to_string()));

    // Photo and review both correlated into the region.
    assert!(output.correlations["photo_1"].region.is_some());
    let review = &output.correlations["review_1"];
    assert!(review.region.is_some());
    assert_eq!(
        review.review_place.as_ref().unwrap().place_id,
        "saved_bbq"
    );

    // Saved (12:00), photo (14:00), review (18:00) collapse into one
    // visit; the review wins. The July visit stays separate.
    let timeline = &output.timelines["Austin, Texas, US"];
    assert_eq!(timeline.visit_count, 2);
    assert_eq!(timeline.visits[0].source_id, "review_1");
    assert_eq!(timeline.visits[1].source_id, "saved_later");

    assert_eq!(output.ranking[0], "Austin, Texas, US");
    assert!(output.unresolved.is_empty());
    assert!(output.validation.valid());
}

#[test]
fn identical_coordinates_hit_upstream_once() {
    let config = test_config();
    let geocoder = StubGeocoder::new();
    let coord = austin_coord(0.0, 0.0);

    let input = PipelineInput {
        saved: (0..5)
            .map(|i| {
                PlaceRecord::new(format!("saved_{}", i), "Same Spot", coord, Provenance::Saved)
            })
            .collect(),
        ..Default::default()
    };

    let pipeline = Pipeline::new(geocoder, open_cache(&config), &config);
    let output = pipeline.run(input).unwrap();

    // Five identical queries, one upstream call, four cache hits.
    assert_eq!(output.cache_stats.misses, 1);
    assert_eq!(output.cache_stats.hits, 4);
}

#[test]
fn address_extraction_avoids_geocoder_entirely() {
    let config = test_config();
    let pipeline = Pipeline::new(StubGeocoder::new(), open_cache(&config), &config);

    let input = PipelineInput {
        saved: vec![PlaceRecord::new(
            "saved_1",
            "Franklin Barbecue",
            austin_coord(0.0, 0.0),
            Provenance::Saved,
        )
        .with_address("900 E 11th St, Austin, TX 78702, USA")],
        ..Default::default()
    };

    let output = pipeline.run(input).unwrap();
    assert!(output.regions.contains_key("Austin"));
    assert_eq!(output.cache_stats.misses, 0);
    assert_eq!(output.cache_stats.hits, 0);
}

#[test]
fn photo_outside_region_radius_stays_unmatched() {
    let config = test_config();
    let pipeline = Pipeline::new(StubGeocoder::new(), open_cache(&config), &config);

    // ~0.14459 degrees of latitude is just inside 10 miles; 0.14488 is
    // just outside.
    let center = austin_coord(0.0, 0.0);
    let inside = austin_coord(0.14459, 0.0);
    let outside = austin_coord(0.14488, 0.0);
    assert!(inside.distance_miles(center) < 10.0);
    assert!(outside.distance_miles(center) > 10.0);

    let input = PipelineInput {
        saved: vec![PlaceRecord::new("anchor", "Anchor", center, Provenance::Saved)],
        photos: vec![
            PlaceRecord::new("photo_in", "in.jpg", inside, Provenance::Photo)
                .with_timestamp(ts(2023, 6, 1, 12)),
            PlaceRecord::new("photo_out", "out.jpg", outside, Provenance::Photo)
                .with_timestamp(ts(2023, 6, 2, 12)),
        ],
        ..Default::default()
    };

    let output = pipeline.run(input).unwrap();

    assert!(output.correlations["photo_in"].region.is_some());
    // Unmatched items are retained with an empty match, not dropped.
    let unmatched = &output.correlations["photo_out"];
    assert!(unmatched.region.is_none());
}

#[test]
fn epoch_timestamps_excluded_but_region_retained() {
    let config = test_config();
    let pipeline = Pipeline::new(StubGeocoder::new(), open_cache(&config), &config);

    let input = PipelineInput {
        saved: vec![PlaceRecord::new(
            "saved_1",
            "Undated Spot",
            austin_coord(0.0, 0.0),
            Provenance::Saved,
        )
        .with_timestamp(DateTime::<Utc>::UNIX_EPOCH)],
        ..Default::default()
    };

    let output = pipeline.run(input).unwrap();

    let timeline = &output.timelines["Austin, Texas, US"];
    assert_eq!(timeline.visit_count, 0);
    assert!(timeline.first_visit.is_none());
    // Zero-visit regions still appear in the ranking.
    assert_eq!(output.ranking, vec!["Austin, Texas, US"]);
}

#[test]
fn two_regions_rank_by_visit_count() {
    let config = test_config();
    let pipeline = Pipeline::new(StubGeocoder::new(), open_cache(&config), &config);

    let houston = Coordinate::new(29.7604, -95.3698).unwrap();
    let input = PipelineInput {
        saved: vec![
            PlaceRecord::new("a1", "Spot A", austin_coord(0.0, 0.0), Provenance::Saved)
                .with_timestamp(ts(2023, 1, 1, 12)),
            PlaceRecord::new("a2", "Spot B", austin_coord(0.01, 0.0), Provenance::Saved)
                .with_timestamp(ts(2023, 3, 1, 12)),
            PlaceRecord::new("h1", "Spot C", houston, Provenance::Saved)
                .with_timestamp(ts(2023, 2, 1, 12)),
        ],
        ..Default::default()
    };

    let output = pipeline.run(input).unwrap();

    assert_eq!(output.regions.len(), 2);
    assert_eq!(
        output.ranking,
        vec!["Austin, Texas, US", "Houston, Texas, US"]
    );
}
