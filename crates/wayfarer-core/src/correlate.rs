//! Proximity correlation of photos and reviews against known regions
//! and places.

use crate::models::{Coordinate, PlaceRecord, Provenance, RegionTable};
use serde::Serialize;

/// A coordinate matched to its nearest region center.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionMatch {
    pub region: String,
    pub distance_miles: f64,
}

/// A coordinate linked to the single nearest place, with the count of
/// other candidates inside the radius so consumers can see ambiguity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceMatch {
    pub place_id: String,
    pub place_name: String,
    pub distance_miles: f64,
    pub candidates_in_radius: usize,
}

/// A review fuzzily matched to a saved/labeled place by name and
/// distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewPlaceMatch {
    pub place_id: String,
    pub place_name: String,
    pub score: f64,
    pub distance_miles: f64,
}

/// Full correlation result for one photo or review. Unmatched items
/// keep their entry with empty matches; they are reported, not
/// discarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemCorrelation {
    pub source_id: String,
    pub provenance: Provenance,
    pub region: Option<RegionMatch>,
    pub place: Option<PlaceMatch>,
    pub review_place: Option<ReviewPlaceMatch>,
}

/// Stateless distance-based matcher over a region table.
pub struct ProximityCorrelator<'a> {
    regions: &'a RegionTable,
    region_radius_miles: f64,
    place_radius_miles: f64,
    review_tolerance_miles: f64,
}

impl<'a> ProximityCorrelator<'a> {
    pub fn new(regions: &'a RegionTable) -> Self {
        Self {
            regions,
            region_radius_miles: 10.0,
            place_radius_miles: 0.1,
            review_tolerance_miles: 0.25,
        }
    }

    pub fn with_region_radius(mut self, miles: f64) -> Self {
        self.region_radius_miles = miles;
        self
    }

    pub fn with_place_radius(mut self, miles: f64) -> Self {
        self.place_radius_miles = miles;
        self
    }

    pub fn with_review_tolerance(mut self, miles: f64) -> Self {
        self.review_tolerance_miles = miles;
        self
    }

    /// Great-circle scan over every region center; O(regions) per call.
    /// Ties break toward the earliest-created region, which the strict
    /// `<` comparison over creation-order iteration provides.
    pub fn nearest_region(&self, coordinate: Coordinate) -> Option<RegionMatch> {
        let mut best: Option<RegionMatch> = None;
        for (name, center) in self.regions.centers() {
            let distance = coordinate.distance_miles(center);
            let closer = match &best {
                Some(current) => distance < current.distance_miles,
                None => true,
            };
            if closer {
                best = Some(RegionMatch {
                    region: name.to_string(),
                    distance_miles: distance,
                });
            }
        }
        best
    }

    /// The nearest region, only if it falls inside the region radius.
    pub fn assign_to_region(&self, coordinate: Coordinate) -> Option<RegionMatch> {
        self.nearest_region(coordinate)
            .filter(|m| m.distance_miles <= self.region_radius_miles)
    }

    /// The closest candidate place within the tight place radius.
    /// Equidistant candidates break toward the lexically smaller id so
    /// the link is deterministic.
    pub fn nearest_place(
        &self,
        coordinate: Coordinate,
        candidates: &[PlaceRecord],
    ) -> Option<PlaceMatch> {
        let mut in_radius: Vec<(&PlaceRecord, f64)> = candidates
            .iter()
            .map(|p| (p, coordinate.distance_miles(p.coordinate)))
            .filter(|(_, d)| *d <= self.place_radius_miles)
            .collect();

        in_radius.sort_by(|(a, da), (b, db)| {
            da.partial_cmp(db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let count = in_radius.len();
        in_radius.first().map(|(place, distance)| PlaceMatch {
            place_id: place.id.clone(),
            place_name: place.name.clone(),
            distance_miles: *distance,
            candidates_in_radius: count,
        })
    }

    /// Match a review to a candidate place by combined name similarity
    /// (weight 0.7) and proximity (weight 0.3). Candidates beyond the
    /// review tolerance or scoring below 0.3 are rejected.
    pub fn match_review_place(
        &self,
        review_name: &str,
        coordinate: Coordinate,
        candidates: &[PlaceRecord],
    ) -> Option<ReviewPlaceMatch> {
        let mut best: Option<ReviewPlaceMatch> = None;
        for place in candidates {
            let distance = coordinate.distance_miles(place.coordinate);
            if distance > self.review_tolerance_miles {
                continue;
            }
            let name_score = name_similarity(review_name, &place.name);
            let distance_score = 1.0 - (distance / self.review_tolerance_miles);
            let score = 0.7 * name_score + 0.3 * distance_score;
            if score < 0.3 {
                continue;
            }
            let better = match &best {
                Some(current) => score > current.score,
                None => true,
            };
            if better {
                best = Some(ReviewPlaceMatch {
                    place_id: place.id.clone(),
                    place_name: place.name.clone(),
                    score,
                    distance_miles: distance,
                });
            }
        }
        best
    }

    /// Correlate a photo record: region assignment plus nearest-place
    /// link.
    pub fn correlate_photo(
        &self,
        record: &PlaceRecord,
        candidates: &[PlaceRecord],
    ) -> ItemCorrelation {
        ItemCorrelation {
            source_id: record.id.clone(),
            provenance: record.provenance,
            region: self.assign_to_region(record.coordinate),
            place: self.nearest_place(record.coordinate, candidates),
            review_place: None,
        }
    }

    /// Correlate a review record: region assignment plus fuzzy place
    /// match on name and distance.
    pub fn correlate_review(
        &self,
        record: &PlaceRecord,
        candidates: &[PlaceRecord],
    ) -> ItemCorrelation {
        ItemCorrelation {
            source_id: record.id.clone(),
            provenance: record.provenance,
            region: self.assign_to_region(record.coordinate),
            place: None,
            review_place: self.match_review_place(&record.name, record.coordinate, candidates),
        }
    }
}

/// Name similarity in [0,1]: exact match after normalization scores
/// 1.0, one name containing the other scores 0.8, otherwise Jaccard
/// overlap of the word sets.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.8;
    }

    let words_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let words_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
