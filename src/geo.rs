//! Great-circle distance for radius filtering

/// Mean earth radius (IUGG) in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Name of the SQL scalar function registered on every store connection
pub const DISTANCE_FN: &str = "distance_meters";

/// Haversine distance in meters between two points given in degrees
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Clamp: rounding can push `a` a hair past 1.0 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}
