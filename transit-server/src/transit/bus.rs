//! Bus arrivals from the MTA Bus Time API.
//!
//! Stop discovery (`stops-for-location`) and per-stop predictions (SIRI
//! `stop-monitoring`) are cached independently: discovery results by a
//! quantized location and radius, predictions by stop id.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheConfig, TtlCache};

use super::error::TransitError;
use super::fetch::{Fetch, HttpFetcher};
use super::merge_best_effort;
use super::siri::{SiriResponse, StopsForLocation, first_string};
use super::subway::minutes_until;

/// Bus Time API host.
const DEFAULT_BASE_URL: &str = "https://bustime.mta.info";

/// Search radius used when the caller passes zero.
const DEFAULT_RADIUS_METERS: u32 = 400;

/// Upper bound on stops queried per nearby search.
const DEFAULT_MAX_STOPS: usize = 10;

/// Environment variable holding the Bus Time key, named in errors.
const API_KEY_VAR: &str = "MTA_BUS_API_KEY";

/// Bus aggregator configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Bus Time API key. Empty disables the bus aggregator.
    pub api_key: String,
    /// Scheme and host of the Bus Time API.
    pub base_url: String,
    /// Radius substituted for a zero radius.
    pub default_radius_meters: u32,
    /// Maximum stops queried by [`BusService::get_arrivals_near`].
    pub max_stops: usize,
}

impl BusConfig {
    /// Create a config with the given API key and MTA defaults.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Point at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the default search radius.
    pub fn with_default_radius(mut self, meters: u32) -> Self {
        self.default_radius_meters = meters;
        self
    }

    /// Set the per-search stop cap.
    pub fn with_max_stops(mut self, n: usize) -> Self {
        self.max_stops = n;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_radius_meters: DEFAULT_RADIUS_METERS,
            max_stops: DEFAULT_MAX_STOPS,
        }
    }
}

/// A bus stop returned by stop discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusStop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Compass heading label, e.g. `"W"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

/// A predicted bus arrival at a stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusArrival {
    pub route: String,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    pub stop_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stop_name: String,
    pub stops_away: i64,
    pub feet_away: i64,
    pub expected_arrival: DateTime<Utc>,
    pub minutes_away: i64,
}

/// Bus arrival aggregator.
pub struct BusService<F = HttpFetcher> {
    fetcher: F,
    config: BusConfig,
    stops: TtlCache<Vec<BusStop>>,
    arrivals: TtlCache<Vec<BusArrival>>,
}

impl<F: Fetch> BusService<F> {
    /// Create a new aggregator.
    pub fn new(fetcher: F, config: BusConfig, cache: &CacheConfig) -> Self {
        Self {
            fetcher,
            config,
            stops: TtlCache::new(cache),
            arrivals: TtlCache::new(cache),
        }
    }

    /// Whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    fn api_key(&self) -> Result<&str, TransitError> {
        if self.has_api_key() {
            Ok(&self.config.api_key)
        } else {
            Err(TransitError::NotConfigured(API_KEY_VAR.to_string()))
        }
    }

    /// Stops within `radius_meters` of a point, as upstream orders them.
    ///
    /// A zero radius uses the configured default.
    pub async fn find_stops_near(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
    ) -> Result<Vec<BusStop>, TransitError> {
        let key = self.api_key()?;
        let radius = if radius_meters == 0 {
            self.config.default_radius_meters
        } else {
            radius_meters
        };

        let cache_key = format!("{lat:.4},{lng:.4},{radius}");
        if let Some(stops) = self.stops.get(&cache_key).await {
            return Ok(stops);
        }

        let url = format!("{}/api/where/stops-for-location.json", self.config.base_url);
        let query = [
            ("key", key.to_string()),
            ("lat", format!("{lat:.6}")),
            ("lon", format!("{lng:.6}")),
            ("radius", radius.to_string()),
        ];
        let body = self.fetcher.get(&url, &query).await?;
        let response: StopsForLocation = serde_json::from_slice(&body)?;

        let stops: Vec<BusStop> = response
            .data
            .stops
            .into_iter()
            .map(|s| BusStop {
                id: s.id,
                name: s.name,
                lat: s.lat,
                lng: s.lon,
                direction: s.direction.filter(|d| !d.is_empty()),
            })
            .collect();

        debug!(%cache_key, stops = stops.len(), "bus stops discovered");
        self.stops.set(cache_key, stops.clone()).await;
        Ok(stops)
    }

    /// Upcoming arrivals at one stop, in upstream order.
    pub async fn get_arrivals_for_stop(&self, stop_id: &str) -> Result<Vec<BusArrival>, TransitError> {
        let key = self.api_key()?;
        let now = Utc::now();

        if let Some(mut arrivals) = self.arrivals.get(stop_id).await {
            for arrival in &mut arrivals {
                arrival.minutes_away = minutes_until(arrival.expected_arrival, now);
            }
            return Ok(arrivals);
        }

        let url = format!("{}/api/siri/stop-monitoring.json", self.config.base_url);
        let query = [
            ("key", key.to_string()),
            ("MonitoringRef", stop_id.to_string()),
            ("version", "2".to_string()),
        ];
        let body = self.fetcher.get(&url, &query).await?;
        let response: SiriResponse = serde_json::from_slice(&body)?;

        let arrivals = parse_arrivals(&response, stop_id, now);
        self.arrivals.set(stop_id, arrivals.clone()).await;
        Ok(arrivals)
    }

    /// Arrivals at the stops near a point, soonest first.
    ///
    /// At most `limit` stops are queried; zero or anything above the
    /// configured maximum uses the maximum. Discovery failing is an error;
    /// a single stop failing is skipped.
    pub async fn get_arrivals_near(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
        limit: usize,
    ) -> Result<Vec<BusArrival>, TransitError> {
        let mut stops = self.find_stops_near(lat, lng, radius_meters).await?;

        let max = self.config.max_stops;
        let limit = if limit == 0 || limit > max { max } else { limit };
        stops.truncate(limit);

        let attempts = join_all(stops.iter().map(|stop| async move {
            let found = self.get_arrivals_for_stop(&stop.id).await.map(|arrivals| {
                arrivals
                    .into_iter()
                    .map(|arrival| BusArrival {
                        stop_name: stop.name.clone(),
                        direction: stop.direction.clone(),
                        ..arrival
                    })
                    .collect()
            });
            (stop.id.as_str(), found)
        }))
        .await;

        let merged = merge_best_effort(attempts, |a: &BusArrival| a.expected_arrival);
        debug!(
            stops = stops.len(),
            arrivals = merged.items.len(),
            failed_stops = merged.failed,
            "bus arrivals near"
        );
        Ok(merged.items)
    }
}

/// Build arrivals from a stop-monitoring response.
///
/// Each visit uses its expected arrival time, falling back to departure;
/// visits with neither are dropped.
fn parse_arrivals(response: &SiriResponse, stop_id: &str, now: DateTime<Utc>) -> Vec<BusArrival> {
    response
        .visits()
        .iter()
        .filter_map(|visit| {
            let journey = &visit.monitored_vehicle_journey;
            let call = &journey.monitored_call;
            let expected = call
                .expected_arrival_time
                .or(call.expected_departure_time)?
                .with_timezone(&Utc);
            let distances = &call.extensions.distances;

            Some(BusArrival {
                route: first_string(&journey.published_line_name),
                destination: first_string(&journey.destination_name),
                direction: None,
                stop_id: stop_id.to_string(),
                stop_name: String::new(),
                stops_away: distances.stops_from_call.unwrap_or(0),
                feet_away: distances.distance_from_call.map_or(0, |d| d.round() as i64),
                expected_arrival: expected,
                minutes_away: minutes_until(expected, now),
            })
        })
        .collect()
}
