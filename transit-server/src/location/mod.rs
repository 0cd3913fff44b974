//! Static geospatial reference data.
//!
//! Holds the subway station table and the zip code table, both loaded once at
//! startup and read-only afterwards, plus the great-circle distance function
//! used to query them.

mod distance;
mod error;
mod stops;
mod zipcode;

pub use distance::{EARTH_RADIUS_METERS, METERS_PER_MILE, haversine_meters, meters_to_miles};
pub use error::LocationError;
pub use stops::{Stop, StopIndex, StopKind, StopWithDistance};
pub use zipcode::{ZipCode, ZipCodes};
