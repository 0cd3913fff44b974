//! Subway arrivals from GTFS-realtime feed groups.
//!
//! Each feed group's raw protobuf payload is cached for the TTL, keyed by
//! group name. Queries decode the payload, keep the stop-time updates for
//! the requested stops that are not already in the past, merge across
//! groups, and sort by time.
//!
//! NYC stop ids encode the platform direction as a suffix: `127N` and `127S`
//! are the two platforms of parent station `127`.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use gtfs_rt::FeedMessage;
use gtfs_rt::trip_update::StopTimeUpdate;
use prost::Message;
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheConfig, TtlCache};
use crate::location::{Stop, StopWithDistance};

use super::error::TransitError;
use super::feeds::FeedConfig;
use super::fetch::{Fetch, HttpFetcher};
use super::merge_best_effort;

/// Default maximum number of stations per multi-station query.
const DEFAULT_MAX_STATIONS: usize = 5;

/// Default maximum arrivals kept per direction per station.
const DEFAULT_MAX_PER_DIRECTION: usize = 5;

/// Travel direction, taken from the stop id suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Northbound,
    Southbound,
    Unknown,
}

impl Direction {
    /// `...N` is northbound, `...S` southbound.
    pub fn from_stop_id(stop_id: &str) -> Self {
        if stop_id.ends_with('N') {
            Direction::Northbound
        } else if stop_id.ends_with('S') {
            Direction::Southbound
        } else {
            Direction::Unknown
        }
    }
}

/// A predicted train arrival at a stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arrival {
    pub route: String,
    pub stop_id: String,
    pub direction: Direction,
    pub arrival_time: DateTime<Utc>,
    /// Whole minutes from response time to `arrival_time`.
    pub minutes_away: i64,
    /// Final stop of the trip. Holds a stop id until the web layer
    /// resolves it to a display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// Arrivals at one station, split by direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StationArrivals {
    pub stop_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stop_name: String,
    #[serde(rename = "stop_lat", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(rename = "stop_lon", skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<f64>,
    pub northbound: Vec<Arrival>,
    pub southbound: Vec<Arrival>,
}

impl StationArrivals {
    /// Empty arrivals for a station id.
    pub fn new(stop_id: impl Into<String>) -> Self {
        Self {
            stop_id: stop_id.into(),
            ..Self::default()
        }
    }

    /// Fill in name and coordinates from the static stop record.
    pub fn with_stop(mut self, stop: &Stop) -> Self {
        self.stop_name = stop.name.clone();
        self.lat = Some(stop.lat);
        self.lng = Some(stop.lng);
        self
    }

    /// Fill in stop details and distance from a nearby-search result.
    pub fn with_distance(self, found: &StopWithDistance) -> Self {
        let mut station = self.with_stop(&found.stop);
        station.distance_meters = Some(found.distance_meters);
        station.distance_miles = Some(found.distance_miles);
        station
    }

    /// Every arrival in both directions.
    pub fn arrivals_mut(&mut self) -> impl Iterator<Item = &mut Arrival> {
        self.northbound.iter_mut().chain(self.southbound.iter_mut())
    }
}

/// Limits for multi-station queries.
#[derive(Debug, Clone)]
pub struct SubwayConfig {
    /// Stations beyond this many are ignored.
    pub max_stations: usize,
    /// Arrivals kept per direction per station.
    pub max_per_direction: usize,
}

impl Default for SubwayConfig {
    fn default() -> Self {
        Self {
            max_stations: DEFAULT_MAX_STATIONS,
            max_per_direction: DEFAULT_MAX_PER_DIRECTION,
        }
    }
}

/// One decoded stop-time update. Becomes an [`Arrival`] when a response is
/// built, which is when `minutes_away` is fixed.
#[derive(Debug, Clone, PartialEq)]
struct Prediction {
    route: String,
    stop_id: String,
    time: DateTime<Utc>,
    destination: Option<String>,
}

impl Prediction {
    fn into_arrival(self, now: DateTime<Utc>) -> Arrival {
        Arrival {
            direction: Direction::from_stop_id(&self.stop_id),
            minutes_away: minutes_until(self.time, now),
            route: self.route,
            stop_id: self.stop_id,
            arrival_time: self.time,
            destination: self.destination,
        }
    }
}

/// Whole minutes from `now` until `time`, truncated toward zero.
pub(crate) fn minutes_until(time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (time - now).num_minutes()
}

/// Subway arrival aggregator.
pub struct SubwayService<F = HttpFetcher> {
    fetcher: F,
    feeds: FeedConfig,
    /// Raw feed payloads keyed by group name.
    cache: TtlCache<Bytes>,
    config: SubwayConfig,
}

impl<F: Fetch> SubwayService<F> {
    /// Create a new aggregator over the given feed table.
    pub fn new(fetcher: F, feeds: FeedConfig, cache: &CacheConfig) -> Self {
        Self {
            fetcher,
            feeds,
            cache: TtlCache::new(cache),
            config: SubwayConfig::default(),
        }
    }

    /// Override the multi-station limits.
    pub fn with_config(mut self, config: SubwayConfig) -> Self {
        self.config = config;
        self
    }

    /// The feed routing table.
    pub fn feeds(&self) -> &FeedConfig {
        &self.feeds
    }

    /// Upcoming arrivals at every platform of `stop_id`, soonest first.
    ///
    /// Only the feed groups carrying `routes` are read; an empty list reads
    /// all of them. Any stop id starting with `stop_id` matches, which covers
    /// both direction suffixes.
    pub async fn get_arrivals_for_stop(&self, stop_id: &str, routes: &[String]) -> Vec<Arrival> {
        let now = Utc::now();
        let keep = |id: &str| id.starts_with(stop_id);
        let keep = &keep;

        let attempts = join_all(
            self.feeds
                .groups_for_routes(routes)
                .into_iter()
                .map(|group| async move { (group, self.feed_predictions(group, now, keep).await) }),
        )
        .await;

        let merged = merge_best_effort(attempts, |p: &Prediction| p.time);
        debug!(
            stop_id,
            arrivals = merged.items.len(),
            failed_feeds = merged.failed,
            "subway arrivals for stop"
        );

        merged
            .items
            .into_iter()
            .map(|p| p.into_arrival(now))
            .collect()
    }

    /// Upcoming arrivals at one station, both directions, uncapped.
    pub async fn get_arrivals_for_station(&self, stop_id: &str) -> StationArrivals {
        let now = Utc::now();
        let ids = [stop_id.to_string()];
        let buckets = self.predictions_by_stop(&ids, now).await;

        let mut station = StationArrivals::new(stop_id);
        station.northbound = direction_arrivals(&buckets, stop_id, 'N', now, usize::MAX);
        station.southbound = direction_arrivals(&buckets, stop_id, 'S', now, usize::MAX);
        station
    }

    /// Upcoming arrivals for several stations, in request order.
    ///
    /// At most `max_stations` stations are queried and each direction list
    /// is capped at `max_per_direction`. Every feed group is read, since a
    /// station's platforms may appear in any of them.
    pub async fn get_arrivals_for_stations(&self, stop_ids: &[String]) -> Vec<StationArrivals> {
        if stop_ids.is_empty() {
            return Vec::new();
        }
        let stop_ids = &stop_ids[..stop_ids.len().min(self.config.max_stations)];

        let now = Utc::now();
        let buckets = self.predictions_by_stop(stop_ids, now).await;
        let cap = self.config.max_per_direction;

        stop_ids
            .iter()
            .map(|id| StationArrivals {
                northbound: direction_arrivals(&buckets, id, 'N', now, cap),
                southbound: direction_arrivals(&buckets, id, 'S', now, cap),
                ..StationArrivals::new(id.as_str())
            })
            .collect()
    }

    /// Predictions for both platforms of each station, bucketed by exact
    /// platform id and sorted by time within each bucket.
    async fn predictions_by_stop(
        &self,
        stop_ids: &[String],
        now: DateTime<Utc>,
    ) -> HashMap<String, Vec<Prediction>> {
        let wanted: HashSet<String> = stop_ids
            .iter()
            .flat_map(|id| [format!("{id}N"), format!("{id}S")])
            .collect();
        let keep = |id: &str| wanted.contains(id);
        let keep = &keep;

        let attempts = join_all(
            self.feeds
                .groups()
                .map(|group| async move { (group, self.feed_predictions(group, now, keep).await) }),
        )
        .await;

        let merged = merge_best_effort(attempts, |p: &Prediction| p.time);
        debug!(
            stations = stop_ids.len(),
            arrivals = merged.items.len(),
            failed_feeds = merged.failed,
            "subway arrivals for stations"
        );

        let mut buckets: HashMap<String, Vec<Prediction>> = HashMap::new();
        for prediction in merged.items {
            buckets
                .entry(prediction.stop_id.clone())
                .or_default()
                .push(prediction);
        }
        buckets
    }

    /// Decode one feed group and keep matching, upcoming predictions.
    async fn feed_predictions(
        &self,
        group: &str,
        now: DateTime<Utc>,
        keep: &(dyn Fn(&str) -> bool + Sync),
    ) -> Result<Vec<Prediction>, TransitError> {
        let feed = self.feed(group).await?;
        Ok(predictions(&feed, now, keep))
    }

    /// Fetch-or-reuse a feed group's payload.
    ///
    /// A payload is cached only after it decodes, so a corrupt response is
    /// retried on the next request instead of being served for the TTL.
    async fn feed(&self, group: &str) -> Result<FeedMessage, TransitError> {
        if let Some(body) = self.cache.get(group).await {
            return Ok(FeedMessage::decode(body)?);
        }

        let url = self
            .feeds
            .url(group)
            .ok_or_else(|| TransitError::UnknownFeed(group.to_string()))?;
        let body = self.fetcher.get(url, &[]).await?;
        let feed = FeedMessage::decode(body.clone())?;

        self.cache.set(group, body).await;
        Ok(feed)
    }
}

/// Arrivals for one platform of a station, capped.
fn direction_arrivals(
    buckets: &HashMap<String, Vec<Prediction>>,
    stop_id: &str,
    suffix: char,
    now: DateTime<Utc>,
    cap: usize,
) -> Vec<Arrival> {
    buckets
        .get(&format!("{stop_id}{suffix}"))
        .into_iter()
        .flatten()
        .take(cap)
        .cloned()
        .map(|p| p.into_arrival(now))
        .collect()
}

/// Extract predictions from a decoded feed.
///
/// Each stop-time update uses its arrival time, falling back to departure.
/// Updates with neither, or with a time before `now`, are dropped.
fn predictions(
    feed: &FeedMessage,
    now: DateTime<Utc>,
    keep: &(dyn Fn(&str) -> bool + Sync),
) -> Vec<Prediction> {
    let mut found = Vec::new();

    for trip_update in feed.entity.iter().filter_map(|e| e.trip_update.as_ref()) {
        let route = trip_update.trip.route_id.clone().unwrap_or_default();
        let destination = trip_update
            .stop_time_update
            .last()
            .and_then(|u| u.stop_id.clone());

        for update in &trip_update.stop_time_update {
            let Some(stop_id) = update.stop_id.as_deref() else {
                continue;
            };
            if !keep(stop_id) {
                continue;
            }
            let Some(time) = event_time(update) else {
                continue;
            };
            if time < now {
                continue;
            }

            found.push(Prediction {
                route: route.clone(),
                stop_id: stop_id.to_string(),
                time,
                destination: destination.clone(),
            });
        }
    }

    found
}

/// Arrival time, else departure time. Zero counts as absent.
fn event_time(update: &StopTimeUpdate) -> Option<DateTime<Utc>> {
    let arrival = update.arrival.as_ref().and_then(|e| e.time);
    let departure = update.departure.as_ref().and_then(|e| e.time);
    let secs = arrival
        .filter(|&t| t != 0)
        .or(departure.filter(|&t| t != 0))?;

    Utc.timestamp_opt(secs, 0).single()
}
