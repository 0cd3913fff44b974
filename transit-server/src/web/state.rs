//! Application state for the web layer.

use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::location::{StopIndex, ZipCodes};
use crate::transit::{
    AlertService, BusArrival, BusService, BusStop, Fetch, ServiceAlert, StationArrivals,
    SubwayService, TransitError,
};

/// Subway arrivals as seen by the handlers.
pub trait SubwayProvider: Send + Sync {
    /// Both directions for one station.
    fn arrivals_for_station<'a>(&'a self, stop_id: &'a str) -> BoxFuture<'a, StationArrivals>;

    /// Capped arrivals for several stations, in request order.
    fn arrivals_for_stations<'a>(
        &'a self,
        stop_ids: &'a [String],
    ) -> BoxFuture<'a, Vec<StationArrivals>>;
}

/// Bus stops and arrivals as seen by the handlers.
pub trait BusProvider: Send + Sync {
    fn has_api_key(&self) -> bool;

    fn stops_near(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
    ) -> BoxFuture<'_, Result<Vec<BusStop>, TransitError>>;

    fn arrivals_near(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<BusArrival>, TransitError>>;
}

/// Service alerts as seen by the handlers.
pub trait AlertProvider: Send + Sync {
    fn alerts<'a>(
        &'a self,
        routes: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<ServiceAlert>, TransitError>>;
}

impl<F: Fetch> SubwayProvider for SubwayService<F> {
    fn arrivals_for_station<'a>(&'a self, stop_id: &'a str) -> BoxFuture<'a, StationArrivals> {
        self.get_arrivals_for_station(stop_id).boxed()
    }

    fn arrivals_for_stations<'a>(
        &'a self,
        stop_ids: &'a [String],
    ) -> BoxFuture<'a, Vec<StationArrivals>> {
        self.get_arrivals_for_stations(stop_ids).boxed()
    }
}

impl<F: Fetch> BusProvider for BusService<F> {
    fn has_api_key(&self) -> bool {
        BusService::has_api_key(self)
    }

    fn stops_near(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
    ) -> BoxFuture<'_, Result<Vec<BusStop>, TransitError>> {
        self.find_stops_near(lat, lng, radius_meters).boxed()
    }

    fn arrivals_near(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<BusArrival>, TransitError>> {
        self.get_arrivals_near(lat, lng, radius_meters, limit).boxed()
    }
}

impl<F: Fetch> AlertProvider for AlertService<F> {
    fn alerts<'a>(
        &'a self,
        routes: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<ServiceAlert>, TransitError>> {
        self.get_alerts(routes).boxed()
    }
}

/// Shared application state.
///
/// Static reference data plus the three aggregators behind their provider
/// traits.
#[derive(Clone)]
pub struct AppState {
    pub subway: Arc<dyn SubwayProvider>,
    pub bus: Arc<dyn BusProvider>,
    pub alerts: Arc<dyn AlertProvider>,

    /// Subway stations and platforms
    pub stops: Arc<StopIndex>,

    /// NYC zip code centroids
    pub zip_codes: Arc<ZipCodes>,

    /// When the server started, for `/health`
    pub started_at: Instant,
}

impl AppState {
    /// Create a new app state.
    pub fn new(
        subway: impl SubwayProvider + 'static,
        bus: impl BusProvider + 'static,
        alerts: impl AlertProvider + 'static,
        stops: StopIndex,
        zip_codes: ZipCodes,
    ) -> Self {
        Self {
            subway: Arc::new(subway),
            bus: Arc::new(bus),
            alerts: Arc::new(alerts),
            stops: Arc::new(stops),
            zip_codes: Arc::new(zip_codes),
            started_at: Instant::now(),
        }
    }

    /// Replace each arrival's destination stop id with a display name such
    /// as `"Inwood-207 St (Manhattan)"`. Unknown stop ids are left as-is.
    pub fn resolve_destinations(&self, station: &mut StationArrivals) {
        for arrival in station.arrivals_mut() {
            let resolved = arrival
                .destination
                .as_deref()
                .and_then(|id| self.destination_name(id));
            if resolved.is_some() {
                arrival.destination = resolved;
            }
        }
    }

    fn destination_name(&self, stop_id: &str) -> Option<String> {
        let stop = self.stops.get_by_id(stop_id)?;
        let name = match self.zip_codes.find_nearest(stop.lat, stop.lng) {
            Some(zip) if !zip.borough.is_empty() => format!("{} ({})", stop.name, zip.borough),
            _ => stop.name.clone(),
        };
        Some(name)
    }
}
