/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;

/// Equatorial circumference of the WGS84 ellipsoid (meters).
pub const EARTH_CIRCUMFERENCE_M: f64 = WGS84_A * 2.0 * std::f64::consts::PI;

/// Meters spanned by one degree of latitude on the spherical approximation.
pub const METERS_PER_DEGREE_LATITUDE: f64 = EARTH_CIRCUMFERENCE_M / 360.0;

/// Meters spanned by one degree of longitude at `lat_deg`.
pub fn meters_per_degree_longitude(lat_deg: f64) -> f64 {
    METERS_PER_DEGREE_LATITUDE * lat_deg.to_radians().cos()
}
