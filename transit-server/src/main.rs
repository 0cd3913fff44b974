use std::net::SocketAddr;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use transit_server::cache::CacheConfig;
use transit_server::config::Config;
use transit_server::location::{StopIndex, ZipCodes};
use transit_server::transit::{
    AlertConfig, AlertService, BusService, FeedConfig, HttpFetcher, SubwayService,
};
use transit_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let zip_codes = ZipCodes::load(config.data_dir.join("nyc-zipcodes.json"))
        .expect("Failed to load zip codes");
    info!(count = zip_codes.len(), "loaded zip codes");

    let stops = StopIndex::load(config.data_dir.join("stops.txt")).expect("Failed to load stops");
    info!(
        total = stops.len(),
        stations = stops.parent_station_count(),
        "loaded subway stops"
    );

    // One fetcher, so the concurrency limit spans every aggregator.
    let fetcher = HttpFetcher::new(&config.http()).expect("Failed to create HTTP client");
    let cache: CacheConfig = config.cache();

    let subway = SubwayService::new(fetcher.clone(), FeedConfig::mta(), &cache);
    info!(feeds = subway.feeds().len(), cache_ttl = ?cache.ttl, "initialized subway service");

    let bus = BusService::new(fetcher.clone(), config.bus(), &cache);
    if bus.has_api_key() {
        info!("initialized bus service");
    } else {
        warn!("bus service disabled: MTA_BUS_API_KEY not set");
    }

    let alerts = AlertService::new(fetcher, AlertConfig::default(), &cache);

    let state = AppState::new(subway, bus, alerts, stops, zip_codes);
    let app = create_router(state, config.request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    info!(%addr, env = %config.env, "transit server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    info!("server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
