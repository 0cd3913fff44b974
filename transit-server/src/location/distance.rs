//! Great-circle distance.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters in one international mile.
pub const METERS_PER_MILE: f64 = 1609.344;

/// Haversine distance in meters between two points given in degrees.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Convert meters to miles.
pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_to_self() {
        assert_eq!(haversine_meters(40.7484, -73.9967, 40.7484, -73.9967), 0.0);
    }

    #[test]
    fn penn_station_to_grand_central() {
        // 34 St-Penn Station to Grand Central-42 St is roughly 1.2 km.
        let d = haversine_meters(40.750373, -73.991057, 40.751776, -73.976848);
        assert!((1150.0..1250.0).contains(&d), "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        // One degree along a meridian is R * pi / 180.
        let d = haversine_meters(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6, "got {d}, expected {expected}");
    }

    #[test]
    fn antipodal_points() {
        let d = haversine_meters(0.0, 0.0, 0.0, 180.0);
        let expected = EARTH_RADIUS_METERS * std::f64::consts::PI;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn miles_conversion() {
        assert_eq!(meters_to_miles(1609.344), 1.0);
        assert_eq!(meters_to_miles(0.0), 0.0);
        assert!((meters_to_miles(800.0) - 0.4971).abs() < 1e-4);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn lat() -> impl Strategy<Value = f64> {
        -90.0..=90.0f64
    }

    fn lng() -> impl Strategy<Value = f64> {
        -180.0..=180.0f64
    }

    proptest! {
        /// Distance is symmetric.
        #[test]
        fn symmetric(lat1 in lat(), lng1 in lng(), lat2 in lat(), lng2 in lng()) {
            let ab = haversine_meters(lat1, lng1, lat2, lng2);
            let ba = haversine_meters(lat2, lng2, lat1, lng1);
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        /// A point is at zero distance from itself.
        #[test]
        fn identity(lat1 in lat(), lng1 in lng()) {
            prop_assert_eq!(haversine_meters(lat1, lng1, lat1, lng1), 0.0);
        }

        /// No two points are further apart than half the circumference.
        #[test]
        fn bounded(lat1 in lat(), lng1 in lng(), lat2 in lat(), lng2 in lng()) {
            let d = haversine_meters(lat1, lng1, lat2, lng2);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= EARTH_RADIUS_METERS * std::f64::consts::PI + 1e-6);
        }
    }
}
