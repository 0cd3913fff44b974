//! Zip code lookup.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::distance::haversine_meters;
use super::error::LocationError;

/// A zip code centroid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZipCode {
    pub code: String,
    pub lat: f64,
    pub lng: f64,
    pub city: String,
    pub borough: String,
}

/// On-disk record; the code is the JSON object key.
#[derive(Debug, Deserialize)]
struct RawZipCode {
    lat: f64,
    lng: f64,
    #[serde(default)]
    city: String,
    #[serde(default)]
    borough: String,
}

/// Immutable zip code table.
#[derive(Debug, Clone, Default)]
pub struct ZipCodes {
    /// Sorted by code, so listings are deterministic.
    codes: BTreeMap<String, ZipCode>,
}

impl ZipCodes {
    /// Build a table from records.
    pub fn new(zips: impl IntoIterator<Item = ZipCode>) -> Self {
        Self {
            codes: zips.into_iter().map(|z| (z.code.clone(), z)).collect(),
        }
    }

    /// Load a JSON object of `{"<zip>": {"lat", "lng", "city", "borough"}}`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LocationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LocationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Parse the zip code JSON object.
    pub fn from_json(json: &str) -> Result<Self, LocationError> {
        let raw: BTreeMap<String, RawZipCode> = serde_json::from_str(json)?;
        if raw.is_empty() {
            return Err(LocationError::Empty("zip code file".to_string()));
        }

        Ok(Self::new(raw.into_iter().map(|(code, r)| ZipCode {
            code,
            lat: r.lat,
            lng: r.lng,
            city: r.city,
            borough: r.borough,
        })))
    }

    /// Look up a zip code.
    pub fn get(&self, code: &str) -> Option<&ZipCode> {
        self.codes.get(code)
    }

    /// All zip codes, ordered by code.
    pub fn all(&self) -> impl Iterator<Item = &ZipCode> {
        self.codes.values()
    }

    /// Zip codes in a borough, ordered by code.
    pub fn by_borough<'a>(&'a self, borough: &'a str) -> impl Iterator<Item = &'a ZipCode> {
        self.codes.values().filter(move |z| z.borough == borough)
    }

    /// Distinct boroughs, sorted.
    pub fn boroughs(&self) -> Vec<&str> {
        self.codes
            .values()
            .map(|z| z.borough.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The zip code whose centroid is nearest to a point.
    pub fn find_nearest(&self, lat: f64, lng: f64) -> Option<&ZipCode> {
        self.codes.values().min_by(|a, b| {
            haversine_meters(lat, lng, a.lat, a.lng)
                .total_cmp(&haversine_meters(lat, lng, b.lat, b.lng))
        })
    }

    /// Number of zip codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "10001": {"lat": 40.7506, "lng": -73.9972, "city": "New York", "borough": "Manhattan"},
        "11201": {"lat": 40.6940, "lng": -73.9903, "city": "Brooklyn", "borough": "Brooklyn"},
        "10034": {"lat": 40.8670, "lng": -73.9212, "city": "New York", "borough": "Manhattan"}
    }"#;

    #[test]
    fn parse_and_get() {
        let zips = ZipCodes::from_json(SAMPLE).unwrap();

        assert_eq!(zips.len(), 3);
        let z = zips.get("11201").unwrap();
        assert_eq!(z.code, "11201");
        assert_eq!(z.borough, "Brooklyn");
        assert!(zips.get("99999").is_none());
    }

    #[test]
    fn listings_are_sorted() {
        let zips = ZipCodes::from_json(SAMPLE).unwrap();

        let codes: Vec<_> = zips.all().map(|z| z.code.as_str()).collect();
        assert_eq!(codes, ["10001", "10034", "11201"]);

        let manhattan: Vec<_> = zips.by_borough("Manhattan").map(|z| z.code.as_str()).collect();
        assert_eq!(manhattan, ["10001", "10034"]);

        assert_eq!(zips.boroughs(), ["Brooklyn", "Manhattan"]);
    }

    #[test]
    fn nearest_zip() {
        let zips = ZipCodes::from_json(SAMPLE).unwrap();

        // Inwood-207 St is in 10034.
        assert_eq!(zips.find_nearest(40.8681, -73.9199).unwrap().code, "10034");
        assert!(ZipCodes::default().find_nearest(40.0, -74.0).is_none());
    }

    #[test]
    fn empty_object_is_an_error() {
        assert!(matches!(
            ZipCodes::from_json("{}"),
            Err(LocationError::Empty(_))
        ));
        assert!(matches!(
            ZipCodes::from_json("not json"),
            Err(LocationError::Json(_))
        ));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nyc-zipcodes.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let zips = ZipCodes::load(&path).unwrap();
        assert_eq!(zips.len(), 3);
    }
}
