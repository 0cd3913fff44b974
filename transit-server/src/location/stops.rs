//! Subway station index.
//!
//! Built once from a GTFS `stops.txt` table. Nearby queries only consider
//! parent stations; platform records share their parent's location and
//! would otherwise show up as duplicates.
//!
//! Queries are a linear scan over the parent stations. The NYC subway has a
//! few hundred of them, so this is cheaper than maintaining a spatial index.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use super::distance::{haversine_meters, meters_to_miles};
use super::error::LocationError;

/// GTFS `location_type` discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    /// `location_type = 1`: a physical station grouping its platforms.
    ParentStation,
    /// `location_type = 0`: a boarding platform.
    Platform,
    /// Entrances, generic nodes, boarding areas.
    Other,
}

impl StopKind {
    /// Map a GTFS `location_type` value.
    pub fn from_location_type(location_type: i32) -> Self {
        match location_type {
            1 => StopKind::ParentStation,
            0 => StopKind::Platform,
            _ => StopKind::Other,
        }
    }
}

/// A stop record from the static table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stop {
    #[serde(rename = "stop_id")]
    pub id: String,
    #[serde(rename = "stop_name")]
    pub name: String,
    #[serde(rename = "stop_lat")]
    pub lat: f64,
    #[serde(rename = "stop_lon")]
    pub lng: f64,
    #[serde(rename = "location_type")]
    pub kind: StopKind,
    #[serde(rename = "parent_station", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// A stop annotated with its distance from a query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopWithDistance {
    #[serde(flatten)]
    pub stop: Stop,
    pub distance_meters: f64,
    pub distance_miles: f64,
}

/// Immutable, in-memory index of stops.
#[derive(Debug, Clone, Default)]
pub struct StopIndex {
    /// All records, in load order.
    stops: Vec<Stop>,
    /// Positions of parent stations in `stops`.
    parents: Vec<usize>,
    /// Stop id → position in `stops`.
    by_id: HashMap<String, usize>,
}

impl StopIndex {
    /// Build an index from stop records.
    ///
    /// If an id appears twice, `get_by_id` returns the first record.
    pub fn new(stops: Vec<Stop>) -> Self {
        let parents = stops
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind == StopKind::ParentStation)
            .map(|(i, _)| i)
            .collect();

        let mut by_id = HashMap::with_capacity(stops.len());
        for (i, stop) in stops.iter().enumerate() {
            by_id.entry(stop.id.clone()).or_insert(i);
        }

        Self {
            stops,
            parents,
            by_id,
        }
    }

    /// Load a GTFS `stops.txt` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LocationError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| LocationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Parse GTFS stops CSV from a reader.
    ///
    /// Columns are positional: `stop_id, stop_name, stop_lat, stop_lon,
    /// location_type[, parent_station]`. Rows with fewer than five columns
    /// are skipped and unparsable numbers read as zero.
    pub fn from_reader(reader: impl Read) -> Result<Self, LocationError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut stops = Vec::new();
        let mut rows = 0usize;

        for record in csv.records() {
            let record = record?;
            rows += 1;
            if record.len() < 5 {
                continue;
            }

            let field = |i: usize| record.get(i).unwrap_or_default().trim();
            let parent = field(5);

            stops.push(Stop {
                id: field(0).to_string(),
                name: field(1).to_string(),
                lat: field(2).parse().unwrap_or(0.0),
                lng: field(3).parse().unwrap_or(0.0),
                kind: StopKind::from_location_type(field(4).parse().unwrap_or(0)),
                parent_id: (!parent.is_empty()).then(|| parent.to_string()),
            });
        }

        if rows == 0 {
            return Err(LocationError::Empty("stops file".to_string()));
        }

        Ok(Self::new(stops))
    }

    /// Parent stations within `radius_meters` of a point, nearest first.
    ///
    /// Ties keep load order.
    pub fn find_nearby(&self, lat: f64, lng: f64, radius_meters: f64) -> Vec<StopWithDistance> {
        let mut results: Vec<StopWithDistance> = self
            .parent_stations()
            .filter_map(|stop| {
                let d = haversine_meters(lat, lng, stop.lat, stop.lng);
                (d <= radius_meters).then(|| with_distance(stop, d))
            })
            .collect();

        sort_by_distance(&mut results);
        results
    }

    /// The `limit` parent stations closest to a point, nearest first.
    ///
    /// A `limit` of zero, or one larger than the number of stations, returns
    /// every station.
    pub fn find_closest(&self, lat: f64, lng: f64, limit: usize) -> Vec<StopWithDistance> {
        let mut results: Vec<StopWithDistance> = self
            .parent_stations()
            .map(|stop| with_distance(stop, haversine_meters(lat, lng, stop.lat, stop.lng)))
            .collect();

        sort_by_distance(&mut results);
        if limit > 0 {
            results.truncate(limit);
        }
        results
    }

    /// The single closest parent station.
    pub fn find_nearest(&self, lat: f64, lng: f64) -> Option<StopWithDistance> {
        self.find_closest(lat, lng, 1).into_iter().next()
    }

    /// Look up any stop (station, platform or other) by exact id.
    pub fn get_by_id(&self, id: &str) -> Option<&Stop> {
        self.by_id.get(id).map(|&i| &self.stops[i])
    }

    /// Total number of loaded records.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Returns true if no records are loaded.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Number of parent stations.
    pub fn parent_station_count(&self) -> usize {
        self.parents.len()
    }

    fn parent_stations(&self) -> impl Iterator<Item = &Stop> {
        self.parents.iter().map(|&i| &self.stops[i])
    }
}

fn with_distance(stop: &Stop, distance_meters: f64) -> StopWithDistance {
    StopWithDistance {
        stop: stop.clone(),
        distance_meters,
        distance_miles: meters_to_miles(distance_meters),
    }
}

/// Stable sort, so equal distances stay in load order.
fn sort_by_distance(results: &mut [StopWithDistance]) {
    results.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
}

#[cfg(test)]
pub(crate) fn station(id: &str, name: &str, lat: f64, lng: f64) -> Stop {
    Stop {
        id: id.to_string(),
        name: name.to_string(),
        lat,
        lng,
        kind: StopKind::ParentStation,
        parent_id: None,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn stations() -> impl Strategy<Value = Vec<Stop>> {
        prop::collection::vec((40.5..40.95f64, -74.25..-73.7f64), 0..40).prop_map(|coords| {
            coords
                .into_iter()
                .enumerate()
                .map(|(i, (lat, lng))| station(&i.to_string(), "Station", lat, lng))
                .collect()
        })
    }

    proptest! {
        /// Nearby results are sorted and within the radius.
        #[test]
        fn nearby_sorted_and_bounded(
            stops in stations(),
            lat in 40.5..40.95f64,
            lng in -74.25..-73.7f64,
            radius in 0.0..20_000.0f64,
        ) {
            let index = StopIndex::new(stops);
            let found = index.find_nearby(lat, lng, radius);

            for pair in found.windows(2) {
                prop_assert!(pair[0].distance_meters <= pair[1].distance_meters);
            }
            for s in &found {
                prop_assert!(s.distance_meters <= radius);
            }
        }

        /// Closest returns min(limit, n) entries, a prefix of the full ordering.
        #[test]
        fn closest_is_prefix(
            stops in stations(),
            lat in 40.5..40.95f64,
            lng in -74.25..-73.7f64,
            limit in 1usize..50,
        ) {
            let index = StopIndex::new(stops);
            let total = index.parent_station_count();
            let all = index.find_closest(lat, lng, total);
            let some = index.find_closest(lat, lng, limit);

            prop_assert_eq!(some.len(), limit.min(total));
            prop_assert_eq!(&all[..some.len()], &some[..]);
        }
    }
}
