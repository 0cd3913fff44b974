//! HTTP route handlers.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::location::ZipCode;
use crate::transit::{StationArrivals, TransitError};

use super::dto::*;
use super::state::AppState;

/// Bounds and default for an integer query parameter.
#[derive(Debug, Clone, Copy)]
struct IntParam {
    default: u32,
    min: u32,
    max: u32,
}

impl IntParam {
    /// Missing or unparsable values take the default; others are clamped.
    fn parse(self, raw: Option<&str>) -> u32 {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => self.default,
            Some(s) => match s.parse::<i64>() {
                Ok(v) => v.clamp(self.min as i64, self.max as i64) as u32,
                Err(_) => self.default,
            },
        }
    }
}

const STOPS_RADIUS: IntParam = IntParam {
    default: 1600,
    min: 50,
    max: 8000,
};
const STOPS_LIMIT: IntParam = IntParam {
    default: 5,
    min: 1,
    max: 20,
};
const SUBWAY_RADIUS: IntParam = IntParam {
    default: 800,
    min: 100,
    max: 3200,
};
const SUBWAY_LIMIT: IntParam = IntParam {
    default: 3,
    min: 1,
    max: 5,
};
const BUS_RADIUS: IntParam = IntParam {
    default: 400,
    min: 100,
    max: 3200,
};
const BUS_LIMIT: IntParam = IntParam {
    default: 5,
    min: 1,
    max: 10,
};

/// Favorite stations accepted per request.
const MAX_FAVORITE_STATIONS: usize = 5;

/// Every route, for `/api`.
const ENDPOINTS: &[(&str, &str)] = &[
    ("GET /health", "Health check"),
    ("GET /api", "API information"),
    ("GET /transit/location/info", "Lookup service coverage and defaults"),
    ("GET /transit/location/boroughs", "Boroughs with zip codes"),
    ("GET /transit/location/zipcodes/all", "All zip codes (?borough=)"),
    ("GET /transit/location/zip/{zip}", "Subway stations near a zip code (?radius=)"),
    ("GET /transit/location/zip/{zip}/closest", "Closest subway stations (?limit=)"),
    ("GET /transit/subway/station/{stopId}", "Arrivals at one station"),
    ("GET /transit/subway/near/{zip}", "Arrivals near a zip code (?radius=&limit=)"),
    ("GET /transit/subway/near", "Arrivals near a point (?lat=&lng=&radius=&limit=)"),
    ("GET /transit/subway/stops/{zip}", "Subway stations near a zip code"),
    ("GET /transit/subway/arrivals", "Arrivals for favorite stations (?stops=)"),
    ("GET /transit/bus/near/{zip}", "Bus arrivals near a zip code"),
    ("GET /transit/bus/near", "Bus arrivals near a point (?lat=&lng=)"),
    ("GET /transit/bus/stops/{zip}", "Bus stops near a zip code"),
    ("GET /transit/alerts", "Active service alerts (?routes=)"),
];

/// Create the application router.
///
/// `request_timeout` bounds each whole request, upstream fetches included.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api", get(api_info))
        .route("/transit/location/info", get(location_info))
        .route("/transit/location/boroughs", get(boroughs))
        .route("/transit/location/zipcodes/all", get(all_zip_codes))
        .route("/transit/location/zip/:zip", get(stops_by_zip))
        .route("/transit/location/zip/:zip/closest", get(closest_stops))
        .route("/transit/subway/station/:stop_id", get(station_arrivals))
        .route("/transit/subway/near/:zip", get(subway_near_zip))
        .route("/transit/subway/near", get(subway_near_coordinates))
        .route("/transit/subway/stops/:zip", get(subway_stops_near))
        .route("/transit/subway/arrivals", get(favorite_arrivals))
        .route("/transit/bus/near/:zip", get(bus_near_zip))
        .route("/transit/bus/near", get(bus_near_coordinates))
        .route("/transit/bus/stops/:zip", get(bus_stops_near))
        .route("/transit/alerts", get(service_alerts))
        .fallback(not_found)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}

/// Health check endpoint.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        uptime: format!("{}s", state.started_at.elapsed().as_secs()),
    })
}

/// Service description and route list.
async fn api_info() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        name: env!("CARGO_PKG_NAME"),
        description: "Real-time NYC subway and bus arrivals",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS.iter().copied().collect::<BTreeMap<_, _>>(),
    })
}

async fn not_found() -> AppError {
    AppError::NotFound {
        message: "Route not found; see /api for available routes".to_string(),
    }
}

async fn location_info(State(state): State<AppState>) -> Json<LocationInfoResponse> {
    Json(LocationInfoResponse {
        success: true,
        service: "NYC Zip Code Transit Lookup",
        description: "Find nearby subway stations by NYC zip code",
        coverage: Coverage {
            zipcodes: state.zip_codes.len(),
            subway_stations: state.stops.parent_station_count(),
        },
        defaults: SearchDefaults {
            radius_meters: STOPS_RADIUS.default,
            limit: STOPS_LIMIT.default,
        },
    })
}

async fn boroughs(State(state): State<AppState>) -> Json<BoroughsResponse> {
    let boroughs: Vec<String> = state
        .zip_codes
        .boroughs()
        .into_iter()
        .map(str::to_string)
        .collect();

    Json(BoroughsResponse {
        success: true,
        count: boroughs.len(),
        boroughs,
    })
}

async fn all_zip_codes(
    State(state): State<AppState>,
    Query(query): Query<BoroughQuery>,
) -> Json<ZipCodesResponse> {
    let zipcodes: Vec<ZipCode> = match query.borough.as_deref().filter(|b| !b.is_empty()) {
        Some(borough) => state.zip_codes.by_borough(borough).cloned().collect(),
        None => state.zip_codes.all().cloned().collect(),
    };

    Json(ZipCodesResponse {
        success: true,
        count: zipcodes.len(),
        zipcodes,
    })
}

/// Stations within a radius of a zip code.
async fn stops_by_zip(
    State(state): State<AppState>,
    Path(zip): Path<String>,
    Query(query): Query<NearQuery>,
) -> Result<Json<NearbyStopsResponse>, AppError> {
    let location = lookup_zip(&state, &zip)?;
    let radius = STOPS_RADIUS.parse(query.radius.as_deref());
    let stops = state
        .stops
        .find_nearby(location.lat, location.lng, f64::from(radius));

    Ok(Json(NearbyStopsResponse {
        success: true,
        zip_code: zip,
        location,
        radius_meters: Some(radius),
        metadata: StopsMetadata {
            stops_found: stops.len(),
        },
        stops,
    }))
}

/// The closest N stations to a zip code.
async fn closest_stops(
    State(state): State<AppState>,
    Path(zip): Path<String>,
    Query(query): Query<NearQuery>,
) -> Result<Json<NearbyStopsResponse>, AppError> {
    let location = lookup_zip(&state, &zip)?;
    let limit = STOPS_LIMIT.parse(query.limit.as_deref());
    let stops = state
        .stops
        .find_closest(location.lat, location.lng, limit as usize);

    Ok(Json(NearbyStopsResponse {
        success: true,
        zip_code: zip,
        location,
        radius_meters: None,
        metadata: StopsMetadata {
            stops_found: stops.len(),
        },
        stops,
    }))
}

/// Both directions for one station.
async fn station_arrivals(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
) -> Result<Json<StationResponse>, AppError> {
    let stop_id = stop_id.trim();
    if stop_id.is_empty() {
        return Err(AppError::BadRequest {
            message: "Stop ID is required".to_string(),
        });
    }

    let mut station = state.subway.arrivals_for_station(stop_id).await;
    state.resolve_destinations(&mut station);

    Ok(Json(StationResponse {
        success: true,
        stop_id: stop_id.to_string(),
        arrivals: station.into(),
    }))
}

async fn subway_near_zip(
    State(state): State<AppState>,
    Path(zip): Path<String>,
    Query(query): Query<NearQuery>,
) -> Result<Json<SubwayNearResponse>, AppError> {
    let location = lookup_zip(&state, &zip)?;
    let (lat, lng) = (location.lat, location.lng);
    let origin = Origin::Zip {
        zip_code: zip,
        location,
    };
    Ok(Json(subway_near(&state, origin, lat, lng, &query).await))
}

async fn subway_near_coordinates(
    State(state): State<AppState>,
    Query(query): Query<NearQuery>,
) -> Result<Json<SubwayNearResponse>, AppError> {
    let (lat, lng) = coordinates(&query)?;
    let origin = Origin::Coordinates { lat, lng };
    Ok(Json(subway_near(&state, origin, lat, lng, &query).await))
}

/// Nearby stations, closest first, each with its arrivals.
async fn subway_near(
    state: &AppState,
    origin: Origin,
    lat: f64,
    lng: f64,
    query: &NearQuery,
) -> SubwayNearResponse {
    let radius = SUBWAY_RADIUS.parse(query.radius.as_deref());
    let limit = SUBWAY_LIMIT.parse(query.limit.as_deref()) as usize;

    let mut nearby = state.stops.find_nearby(lat, lng, f64::from(radius));
    nearby.truncate(limit);

    if nearby.is_empty() {
        return SubwayNearResponse {
            success: true,
            origin,
            radius_meters: radius,
            stations: Vec::new(),
            count: 0,
            message: Some("No subway stations found within radius"),
        };
    }

    let stop_ids: Vec<String> = nearby.iter().map(|s| s.stop.id.clone()).collect();
    let arrivals = state.subway.arrivals_for_stations(&stop_ids).await;

    let stations: Vec<StationArrivals> = arrivals
        .into_iter()
        .zip(&nearby)
        .map(|(station, found)| {
            let mut station = station.with_distance(found);
            state.resolve_destinations(&mut station);
            station
        })
        .collect();

    SubwayNearResponse {
        success: true,
        origin,
        radius_meters: radius,
        count: stations.len(),
        stations,
        message: None,
    }
}

/// Stations near a zip code, without arrivals.
async fn subway_stops_near(
    State(state): State<AppState>,
    Path(zip): Path<String>,
    Query(query): Query<NearQuery>,
) -> Result<Json<SubwayStopsResponse>, AppError> {
    let location = lookup_zip(&state, &zip)?;
    let radius = SUBWAY_RADIUS.parse(query.radius.as_deref());
    let stops: Vec<SubwayStop> = state
        .stops
        .find_nearby(location.lat, location.lng, f64::from(radius))
        .into_iter()
        .map(SubwayStop::from)
        .collect();

    Ok(Json(SubwayStopsResponse {
        success: true,
        zip_code: zip,
        location,
        radius_meters: radius,
        count: stops.len(),
        stops,
    }))
}

/// Arrivals for a comma-separated list of station ids.
async fn favorite_arrivals(
    State(state): State<AppState>,
    Query(query): Query<StopsQuery>,
) -> Result<Json<StationsResponse>, AppError> {
    let mut stop_ids = split_list(query.stops.as_deref());
    if stop_ids.is_empty() {
        return Err(AppError::BadRequest {
            message: "stops query parameter is required (comma-separated stop IDs)".to_string(),
        });
    }
    stop_ids.truncate(MAX_FAVORITE_STATIONS);

    let stations: Vec<StationArrivals> = state
        .subway
        .arrivals_for_stations(&stop_ids)
        .await
        .into_iter()
        .map(|station| {
            let mut station = match state.stops.get_by_id(&station.stop_id) {
                Some(stop) => station.with_stop(stop),
                None => station,
            };
            state.resolve_destinations(&mut station);
            station
        })
        .collect();

    Ok(Json(StationsResponse {
        success: true,
        count: stations.len(),
        stations,
    }))
}

async fn bus_near_zip(
    State(state): State<AppState>,
    Path(zip): Path<String>,
    Query(query): Query<NearQuery>,
) -> Result<Json<BusNearResponse>, AppError> {
    require_bus(&state)?;
    let location = lookup_zip(&state, &zip)?;
    let (lat, lng) = (location.lat, location.lng);
    let origin = Origin::Zip {
        zip_code: zip,
        location,
    };
    bus_near(&state, origin, lat, lng, &query).await.map(Json)
}

async fn bus_near_coordinates(
    State(state): State<AppState>,
    Query(query): Query<NearQuery>,
) -> Result<Json<BusNearResponse>, AppError> {
    require_bus(&state)?;
    let (lat, lng) = coordinates(&query)?;
    let origin = Origin::Coordinates { lat, lng };
    bus_near(&state, origin, lat, lng, &query).await.map(Json)
}

async fn bus_near(
    state: &AppState,
    origin: Origin,
    lat: f64,
    lng: f64,
    query: &NearQuery,
) -> Result<BusNearResponse, AppError> {
    let radius = BUS_RADIUS.parse(query.radius.as_deref());
    let limit = BUS_LIMIT.parse(query.limit.as_deref()) as usize;
    let arrivals = state.bus.arrivals_near(lat, lng, radius, limit).await?;

    Ok(BusNearResponse {
        success: true,
        origin,
        radius_meters: radius,
        count: arrivals.len(),
        arrivals,
    })
}

async fn bus_stops_near(
    State(state): State<AppState>,
    Path(zip): Path<String>,
    Query(query): Query<NearQuery>,
) -> Result<Json<BusStopsResponse>, AppError> {
    require_bus(&state)?;
    let location = lookup_zip(&state, &zip)?;
    let radius = BUS_RADIUS.parse(query.radius.as_deref());
    let stops = state
        .bus
        .stops_near(location.lat, location.lng, radius)
        .await?;

    Ok(Json(BusStopsResponse {
        success: true,
        zip_code: zip,
        location,
        radius_meters: radius,
        count: stops.len(),
        stops,
    }))
}

async fn service_alerts(
    State(state): State<AppState>,
    Query(query): Query<RoutesQuery>,
) -> Result<Json<AlertsResponse>, AppError> {
    let routes = split_list(query.routes.as_deref());
    let alerts = state.alerts.alerts(&routes).await?;

    Ok(Json(AlertsResponse {
        success: true,
        count: alerts.len(),
        alerts,
    }))
}

/// A known five-character zip code.
fn lookup_zip(state: &AppState, zip: &str) -> Result<ZipCode, AppError> {
    if zip.len() != 5 {
        return Err(AppError::BadRequest {
            message: "Zip code must be exactly 5 digits".to_string(),
        });
    }

    state
        .zip_codes
        .get(zip)
        .cloned()
        .ok_or_else(|| AppError::NotFound {
            message: format!("Zip code {zip} is not in our NYC database"),
        })
}

/// Required, finite `lat` and `lng` query parameters.
fn coordinates(query: &NearQuery) -> Result<(f64, f64), AppError> {
    let (Some(lat), Some(lng)) = (query.lat.as_deref(), query.lng.as_deref()) else {
        return Err(AppError::BadRequest {
            message: "lat and lng query parameters are required".to_string(),
        });
    };

    let parse = |name: &str, raw: &str| {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| AppError::BadRequest {
                message: format!("Invalid {name} parameter"),
            })
    };

    Ok((parse("lat", lat)?, parse("lng", lng)?))
}

fn require_bus(state: &AppState) -> Result<(), AppError> {
    if state.bus.has_api_key() {
        Ok(())
    } else {
        Err(AppError::Unavailable {
            message: "MTA_BUS_API_KEY not configured".to_string(),
        })
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Unavailable { message: String },
    Internal { message: String },
}

impl From<TransitError> for AppError {
    fn from(e: TransitError) -> Self {
        if e.is_config() {
            AppError::Unavailable {
                message: e.to_string(),
            }
        } else {
            AppError::Internal {
                message: e.to_string(),
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, "Bad request", message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, "Not found", message),
            AppError::Unavailable { message } => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", message)
            }
            AppError::Internal { message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error", message)
            }
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            warn!(%status, %message, "request rejected");
        }

        let body = Json(ErrorResponse {
            error: title.to_string(),
            message,
        });
        (status, body).into_response()
    }
}
