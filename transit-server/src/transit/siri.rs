//! Wire types for the MTA Bus Time JSON API.
//!
//! Only the fields the bus aggregator reads are modeled; everything else in
//! the payloads is ignored.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// A field upstream sends either as a single value or as a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// The value, or the first element of the list.
    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) => values.first(),
        }
    }
}

/// First string of an optional one-or-many field, or empty.
pub(crate) fn first_string(field: &Option<OneOrMany<String>>) -> String {
    field
        .as_ref()
        .and_then(OneOrMany::first)
        .cloned()
        .unwrap_or_default()
}

// stops-for-location.json

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StopsForLocation {
    #[serde(default)]
    pub data: StopsData,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StopsData {
    #[serde(default)]
    pub stops: Vec<RawStop>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStop {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub direction: Option<String>,
}

// siri/stop-monitoring.json

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SiriResponse {
    #[serde(default)]
    pub siri: Siri,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Siri {
    #[serde(default)]
    pub service_delivery: ServiceDelivery,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceDelivery {
    #[serde(default)]
    pub stop_monitoring_delivery: Vec<StopMonitoringDelivery>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StopMonitoringDelivery {
    #[serde(default)]
    pub monitored_stop_visit: Vec<MonitoredStopVisit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct MonitoredStopVisit {
    pub monitored_vehicle_journey: VehicleJourney,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct VehicleJourney {
    #[serde(default)]
    pub published_line_name: Option<OneOrMany<String>>,
    #[serde(default)]
    pub destination_name: Option<OneOrMany<String>>,
    #[serde(default)]
    pub monitored_call: MonitoredCall,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct MonitoredCall {
    #[serde(default)]
    pub expected_arrival_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub expected_departure_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub extensions: Extensions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Extensions {
    #[serde(default)]
    pub distances: Distances,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Distances {
    pub stops_from_call: Option<i64>,
    pub distance_from_call: Option<f64>,
}

impl SiriResponse {
    /// Visits from the first delivery; upstream only ever sends one.
    pub fn visits(&self) -> &[MonitoredStopVisit] {
        self.siri
            .service_delivery
            .stop_monitoring_delivery
            .first()
            .map(|d| d.monitored_stop_visit.as_slice())
            .unwrap_or_default()
    }
}
