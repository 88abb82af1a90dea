use formats::{GeoPoint, Geometry};
use foundation::math::{
    METERS_PER_DEGREE_LATITUDE, Mat4, Vec3, meters_per_degree_longitude,
};
use gpu::MapCamera;

use crate::options::LayerOptions;

/// Vertical exaggeration applied on top of the layer scale.
pub const HEIGHT_SCALE: f64 = 1.0;

/// Representative coordinate of a geometry, used as the local origin.
///
/// Returns `None` when the coordinate array it would pick from is empty.
pub fn compute_origin(geometry: &Geometry) -> Option<GeoPoint> {
    match geometry {
        Geometry::Point(p) => Some(*p),
        Geometry::MultiPoint(points) | Geometry::LineString(points) => points.first().copied(),
        Geometry::MultiLineString(rings) | Geometry::Polygon(rings) => {
            rings.first()?.first().copied()
        }
        Geometry::MultiPolygon(polygons) => polygons.first()?.first()?.first().copied(),
    }
}

/// Camera-relative model transform for a mesh built around `origin`.
///
/// Applied to a vertex in this order: elevation, scale (with vertical
/// exaggeration), rotation, then the offset from the camera position in
/// meters at the camera's latitude.
pub fn model_matrix(origin: GeoPoint, camera: &MapCamera, options: &LayerOptions) -> Mat4 {
    let mut m = Mat4::identity();
    if options.elevation != 0.0 {
        m = m.then_translate(Vec3::new(0.0, 0.0, options.elevation));
    }

    let s = options.effective_scale();
    m = m.then_scale(Vec3::new(s, s, s * HEIGHT_SCALE));

    if options.rotation != 0.0 {
        m = m.then_rotate_z(-options.rotation);
    }

    let d_lat = origin.lat_deg - camera.lat_deg;
    let d_lon = origin.lon_deg - camera.lon_deg;
    m.then_translate(Vec3::new(
        d_lon * meters_per_degree_longitude(camera.lat_deg),
        -d_lat * METERS_PER_DEGREE_LATITUDE,
        0.0,
    ))
}
