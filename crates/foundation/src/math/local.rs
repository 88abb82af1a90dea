use super::{METERS_PER_DEGREE_LATITUDE, meters_per_degree_longitude};

/// Local tangent plane anchored at a fixed `(lon, lat)` origin.
///
/// Offsets are meters: `x` grows east, `y` grows south (screen-style), which
/// is the convention the building mesh and its model matrix share.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalTangentPlane {
    origin_lon_deg: f64,
    origin_lat_deg: f64,
    meters_per_degree_lon: f64,
}

impl LocalTangentPlane {
    pub fn new(origin_lon_deg: f64, origin_lat_deg: f64) -> Self {
        Self {
            origin_lon_deg,
            origin_lat_deg,
            meters_per_degree_lon: meters_per_degree_longitude(origin_lat_deg),
        }
    }

    #[inline]
    pub fn project(&self, lon_deg: f64, lat_deg: f64) -> [f64; 2] {
        [
            (lon_deg - self.origin_lon_deg) * self.meters_per_degree_lon,
            -(lat_deg - self.origin_lat_deg) * METERS_PER_DEGREE_LATITUDE,
        ]
    }
}
