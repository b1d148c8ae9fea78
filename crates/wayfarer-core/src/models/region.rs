//! Named geographic regions and the arena that maintains them.
//!
//! Many small coordinates roll up into one named center. The table is
//! keyed by normalized display name; each entry keeps running sum/count
//! accumulators so the centroid is an incremental mean rather than a
//! recomputation over all history, and stays order-independent.

use crate::models::Coordinate;
use serde::Serialize;
use std::collections::HashMap;

/// External view of a region: display name, computed center, members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub name: String,
    pub center: Coordinate,
    pub member_count: usize,
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
struct RegionEntry {
    display_name: String,
    sum_lat: f64,
    sum_lon: f64,
    count: u64,
    members: Vec<String>,
}

impl RegionEntry {
    fn center(&self) -> Coordinate {
        // Sums of in-range coordinates divided by count stay in range.
        Coordinate {
            latitude: self.sum_lat / self.count as f64,
            longitude: self.sum_lon / self.count as f64,
        }
    }

    fn view(&self) -> Region {
        Region {
            name: self.display_name.clone(),
            center: self.center(),
            member_count: self.members.len(),
            members: self.members.clone(),
        }
    }
}

/// Case- and whitespace-insensitive key; display casing is preserved
/// separately.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Arena of regions in creation order.
///
/// Two resolutions to the same normalized name always merge into one
/// region; the first-seen casing wins for display.
#[derive(Debug, Default)]
pub struct RegionTable {
    entries: Vec<RegionEntry>,
    by_key: HashMap<String, usize>,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a coordinate (and optionally a member id) to the named
    /// region, creating it if needed. The center is updated as a running
    /// mean: accumulate sum and count, divide on read.
    pub fn upsert(&mut self, name: &str, coordinate: Coordinate, member_id: Option<&str>) -> Region {
        let key = normalize_name(name);
        let idx = match self.by_key.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.entries.len();
                self.entries.push(RegionEntry {
                    display_name: name.trim().to_string(),
                    sum_lat: 0.0,
                    sum_lon: 0.0,
                    count: 0,
                    members: Vec::new(),
                });
                self.by_key.insert(key, idx);
                idx
            }
        };

        let entry = &mut self.entries[idx];
        entry.sum_lat += coordinate.latitude;
        entry.sum_lon += coordinate.longitude;
        entry.count += 1;
        if let Some(id) = member_id {
            if !entry.members.iter().any(|m| m == id) {
                entry.members.push(id.to_string());
            }
        }
        entry.view()
    }

    /// Look up a region by (display or normalized) name.
    pub fn get(&self, name: &str) -> Option<Region> {
        let key = normalize_name(name);
        self.by_key.get(&key).map(|&idx| self.entries[idx].view())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_key.contains_key(&normalize_name(name))
    }

    /// Region centers in creation order. Creation order is the tie-break
    /// for equidistant nearest-region matches.
    pub fn centers(&self) -> impl Iterator<Item = (&str, Coordinate)> + '_ {
        self.entries
            .iter()
            .map(|e| (e.display_name.as_str(), e.center()))
    }

    /// Full region views in creation order
    pub fn iter(&self) -> impl Iterator<Item = Region> + '_ {
        self.entries.iter().map(RegionEntry::view)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_upsert_creates_and_merges() {
        let mut table = RegionTable::new();
        table.upsert("Austin, TX, US", coord(30.0, -97.0), Some("a"));
        table.upsert("austin,  tx, us", coord(31.0, -98.0), Some("b"));

        assert_eq!(table.len(), 1);
        let region = table.get("Austin, TX, US").unwrap();
        assert_eq!(region.name, "Austin, TX, US");
        assert_eq!(region.member_count, 2);
    }

    #[test]
    fn test_center_is_mean_of_coordinates() {
        let mut table = RegionTable::new();
        table.upsert("Test", coord(10.0, 20.0), None);
        table.upsert("Test", coord(20.0, 40.0), None);

        let center = table.get("Test").unwrap().center;
        assert!((center.latitude - 15.0).abs() < 1e-9);
        assert!((center.longitude - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_member_ids_not_double_counted() {
        let mut table = RegionTable::new();
        table.upsert("Test", coord(10.0, 20.0), Some("a"));
        table.upsert("Test", coord(20.0, 40.0), Some("a"));

        let region = table.get("Test").unwrap();
        assert_eq!(region.member_count, 1);
        // The coordinate still contributes to the centroid.
        assert!((region.center.latitude - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_creation_order_preserved() {
        let mut table = RegionTable::new();
        table.upsert("B", coord(1.0, 1.0), None);
        table.upsert("A", coord(2.0, 2.0), None);
        table.upsert("B", coord(3.0, 3.0), None);

        let names: Vec<&str> = table.centers().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_display_casing_first_seen_wins() {
        let mut table = RegionTable::new();
        table.upsert("San Francisco, CA", coord(37.7, -122.4), None);
        table.upsert("SAN FRANCISCO, CA", coord(37.8, -122.5), None);

        assert_eq!(table.get("san francisco, ca").unwrap().name, "San Francisco, CA");
    }
}
