//! HTTP API for nearby stations, arrivals, and alerts.
//!
//! Handlers reach the aggregators only through the provider traits in
//! [`state`], so routes can be exercised against fakes.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AlertProvider, AppState, BusProvider, SubwayProvider};
