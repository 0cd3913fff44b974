//! Data transfer objects for web requests and responses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::{StopWithDistance, ZipCode};
use crate::transit::{Arrival, BusArrival, BusStop, ServiceAlert, StationArrivals};

/// Query parameters for nearby searches.
///
/// Numbers are taken as strings so that a malformed value falls back to its
/// default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct NearQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub radius: Option<String>,
    pub limit: Option<String>,
}

/// `?borough=` filter for the zip code listing.
#[derive(Debug, Deserialize)]
pub struct BoroughQuery {
    pub borough: Option<String>,
}

/// `?stops=a,b,c` for favorite stations.
#[derive(Debug, Deserialize)]
pub struct StopsQuery {
    pub stops: Option<String>,
}

/// `?routes=A,C` for alerts.
#[derive(Debug, Deserialize)]
pub struct RoutesQuery {
    pub routes: Option<String>,
}

/// Where a nearby search was centered.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Origin {
    Zip { zip_code: String, location: ZipCode },
    Coordinates { lat: f64, lng: f64 },
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub uptime: String,
}

#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Serialize)]
pub struct LocationInfoResponse {
    pub success: bool,
    pub service: &'static str,
    pub description: &'static str,
    pub coverage: Coverage,
    pub defaults: SearchDefaults,
}

#[derive(Debug, Serialize)]
pub struct Coverage {
    pub zipcodes: usize,
    pub subway_stations: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchDefaults {
    pub radius_meters: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct BoroughsResponse {
    pub success: bool,
    pub count: usize,
    pub boroughs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ZipCodesResponse {
    pub success: bool,
    pub count: usize,
    pub zipcodes: Vec<ZipCode>,
}

/// Stations near a zip code, with their distances.
#[derive(Debug, Serialize)]
pub struct NearbyStopsResponse {
    pub success: bool,
    pub zip_code: String,
    pub location: ZipCode,
    /// Absent for closest-N searches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_meters: Option<u32>,
    pub stops: Vec<StopWithDistance>,
    pub metadata: StopsMetadata,
}

#[derive(Debug, Serialize)]
pub struct StopsMetadata {
    pub stops_found: usize,
}

/// Arrivals for a single station.
#[derive(Debug, Serialize)]
pub struct StationResponse {
    pub success: bool,
    pub stop_id: String,
    pub arrivals: DirectionalArrivals,
}

#[derive(Debug, Serialize)]
pub struct DirectionalArrivals {
    pub northbound: Vec<Arrival>,
    pub southbound: Vec<Arrival>,
}

impl From<StationArrivals> for DirectionalArrivals {
    fn from(station: StationArrivals) -> Self {
        Self {
            northbound: station.northbound,
            southbound: station.southbound,
        }
    }
}

/// Stations with arrivals near a point.
#[derive(Debug, Serialize)]
pub struct SubwayNearResponse {
    pub success: bool,
    #[serde(flatten)]
    pub origin: Origin,
    pub radius_meters: u32,
    pub stations: Vec<StationArrivals>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// A station in a stops-only listing.
#[derive(Debug, Serialize)]
pub struct SubwayStop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub distance_meters: f64,
    pub distance_miles: f64,
}

impl From<StopWithDistance> for SubwayStop {
    fn from(found: StopWithDistance) -> Self {
        Self {
            id: found.stop.id,
            name: found.stop.name,
            lat: found.stop.lat,
            lng: found.stop.lng,
            distance_meters: found.distance_meters,
            distance_miles: found.distance_miles,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubwayStopsResponse {
    pub success: bool,
    pub zip_code: String,
    pub location: ZipCode,
    pub radius_meters: u32,
    pub stops: Vec<SubwayStop>,
    pub count: usize,
}

/// Arrivals for explicitly requested stations.
#[derive(Debug, Serialize)]
pub struct StationsResponse {
    pub success: bool,
    pub stations: Vec<StationArrivals>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct BusNearResponse {
    pub success: bool,
    #[serde(flatten)]
    pub origin: Origin,
    pub radius_meters: u32,
    pub arrivals: Vec<BusArrival>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct BusStopsResponse {
    pub success: bool,
    pub zip_code: String,
    pub location: ZipCode,
    pub radius_meters: u32,
    pub stops: Vec<BusStop>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub success: bool,
    pub alerts: Vec<ServiceAlert>,
    pub count: usize,
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
