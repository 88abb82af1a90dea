use earcutr::earcut;
use formats::{Feature, GeoPoint, Geometry};
use foundation::math::{LocalTangentPlane, Vec3};
use tracing::trace;

use crate::build::BuildAccumulator;

/// Height used for features without a `height` property, in meters.
pub const DEFAULT_HEIGHT: f64 = 10.0;

pub const DEFAULT_WALL_COLOR: [f32; 3] = [0.78, 0.75, 0.72];
pub const DEFAULT_ROOF_COLOR: [f32; 3] = [0.86, 0.84, 0.82];

const UP: Vec3 = Vec3 {
    x: 0.0,
    y: 0.0,
    z: 1.0,
};

/// Parses `#rrggbb` or `#rgb` into normalized RGB.
pub fn parse_color(s: &str) -> Option<[f32; 3]> {
    let hex = s.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |h: &str| u8::from_str_radix(h, 16).ok().map(|v| v as f32 / 255.0);
    match hex.len() {
        6 => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ]),
        3 => {
            let mut out = [0.0; 3];
            for (slot, c) in out.iter_mut().zip(hex.chars()) {
                *slot = channel(&format!("{c}{c}"))?;
            }
            Some(out)
        }
        _ => None,
    }
}

/// Height, base height and colors of one extruded feature.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Extrusion {
    height: f64,
    min_height: f64,
    wall: [f32; 3],
    roof: [f32; 3],
}

impl Extrusion {
    fn for_feature(feature: &Feature, color_override: Option<[f32; 3]>) -> Self {
        let height = feature.height().unwrap_or(DEFAULT_HEIGHT).max(0.0);
        let min_height = feature.min_height().unwrap_or(0.0).clamp(0.0, height);
        let base = feature.property_str("color").and_then(parse_color);
        let wall = color_override
            .or_else(|| feature.property_str("wallColor").and_then(parse_color))
            .or(base)
            .unwrap_or(DEFAULT_WALL_COLOR);
        let roof = color_override
            .or_else(|| feature.property_str("roofColor").and_then(parse_color))
            .or(base)
            .unwrap_or(DEFAULT_ROOF_COLOR);
        Self {
            height,
            min_height,
            wall,
            roof,
        }
    }
}

/// Extrudes one feature's polygons into `acc` and returns the number of
/// vertices appended.
///
/// Positions are meters relative to `plane`'s origin. Geometries without
/// area contribute no vertices.
pub fn triangulate(
    acc: &mut BuildAccumulator,
    feature: &Feature,
    plane: &LocalTangentPlane,
    color_override: Option<[f32; 3]>,
) -> u32 {
    let before = acc.vertex_count();
    let extrusion = Extrusion::for_feature(feature, color_override);

    match &feature.geometry {
        Geometry::Polygon(rings) => extrude_polygon(acc, rings, plane, &extrusion),
        Geometry::MultiPolygon(polygons) => {
            for rings in polygons {
                extrude_polygon(acc, rings, plane, &extrusion);
            }
        }
        other => {
            trace!(geometry = other.type_name(), "no area to extrude");
        }
    }

    (acc.vertex_count() - before) as u32
}

fn extrude_polygon(
    acc: &mut BuildAccumulator,
    rings: &[Vec<GeoPoint>],
    plane: &LocalTangentPlane,
    extrusion: &Extrusion,
) {
    let mut coords: Vec<f64> = Vec::new();
    let mut holes: Vec<usize> = Vec::new();
    let mut local_rings: Vec<Vec<[f64; 2]>> = Vec::new();

    for ring in rings {
        let mut pts: Vec<[f64; 2]> = ring
            .iter()
            .map(|p| plane.project(p.lon_deg, p.lat_deg))
            .collect();
        drop_closing_duplicate(&mut pts);
        let outer = local_rings.is_empty();
        if pts.len() < 3 {
            // a degenerate outer ring makes the whole polygon unusable
            if outer {
                return;
            }
            continue;
        }
        orient(&mut pts, outer);
        if !outer {
            holes.push(coords.len() / 2);
        }
        coords.extend(pts.iter().flatten());
        local_rings.push(pts);
    }

    if local_rings.is_empty() {
        return;
    }

    if let Ok(indices) = earcut(&coords, &holes, 2) {
        let z = extrusion.height;
        for idx in indices {
            let v = Vec3::new(coords[idx * 2], coords[idx * 2 + 1], z);
            acc.push_vertex(v, UP, extrusion.roof, [0.0, 0.0]);
        }
    }

    if extrusion.height > extrusion.min_height {
        for ring in &local_rings {
            extrude_walls(acc, ring, extrusion);
        }
    }
}

fn extrude_walls(acc: &mut BuildAccumulator, ring: &[[f64; 2]], extrusion: &Extrusion) {
    let (lo, hi) = (extrusion.min_height, extrusion.height);
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        let a_lo = Vec3::new(a[0], a[1], lo);
        let b_lo = Vec3::new(b[0], b[1], lo);
        let a_hi = Vec3::new(a[0], a[1], hi);
        let b_hi = Vec3::new(b[0], b[1], hi);

        let edge = b_lo - a_lo;
        if edge.dot(edge) <= f64::EPSILON {
            continue;
        }
        let normal = edge.cross(UP).normalize();

        let quad = [
            (a_lo, [0.0, 0.0]),
            (b_lo, [1.0, 0.0]),
            (b_hi, [1.0, 1.0]),
            (a_lo, [0.0, 0.0]),
            (b_hi, [1.0, 1.0]),
            (a_hi, [0.0, 1.0]),
        ];
        for (p, uv) in quad {
            acc.push_vertex(p, normal, extrusion.wall, uv);
        }
    }
}

/// Twice the signed area of a local ring, positive for counter-clockwise
/// order in the plane's `(x, y)` axes.
fn signed_area2(ring: &[[f64; 2]]) -> f64 {
    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
        .sum()
}

/// Outer rings counter-clockwise, holes clockwise, so `edge × up` always
/// points out of the solid.
fn orient(ring: &mut [[f64; 2]], outer: bool) {
    if (signed_area2(ring) > 0.0) != outer {
        ring.reverse();
    }
}

fn drop_closing_duplicate(points: &mut Vec<[f64; 2]>) {
    if points.len() >= 2 && points.first() == points.last() {
        points.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_ROOF_COLOR, DEFAULT_WALL_COLOR, parse_color, triangulate};
    use crate::build::BuildAccumulator;
    use formats::FeatureCollection;
    use foundation::math::LocalTangentPlane;
    use pretty_assertions::assert_eq;

    fn feature(props: &str, geometry: &str) -> formats::Feature {
        let payload = format!(
            r#"{{"type":"FeatureCollection","features":[
                {{"type":"Feature","properties":{props},"geometry":{geometry}}}
            ]}}"#
        );
        FeatureCollection::from_geojson_str(&payload)
            .expect("parse")
            .features
            .remove(0)
    }

    const SQUARE: &str = r#"{"type":"Polygon","coordinates":[[[0,0],[0.001,0],[0.001,0.001],[0,0.001],[0,0]]]}"#;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_color("#ff0000"), Some([1.0, 0.0, 0.0]));
        assert_eq!(parse_color("#0f0"), Some([0.0, 1.0, 0.0]));
        assert_eq!(parse_color("red"), None);
        assert_eq!(parse_color("#12345"), None);
    }

    #[test]
    fn square_extrudes_roof_and_four_walls() {
        let f = feature(r#"{"height":20}"#, SQUARE);
        let mut acc = BuildAccumulator::default();
        let plane = LocalTangentPlane::new(0.0, 0.0);
        let n = triangulate(&mut acc, &f, &plane, None);

        // 2 roof triangles + 4 walls of 2 triangles
        assert_eq!(n, 6 + 24);
        assert_eq!(acc.vertex_count(), 30);
        assert_eq!(acc.normals.len(), acc.positions.len());
        assert_eq!(acc.colors.len(), acc.positions.len());
        assert_eq!(acc.texcoords.len(), 30 * 2);

        // roof sits at the feature height
        assert!(acc.positions[..18].chunks(3).all(|p| p[2] == 20.0));
        assert_eq!(&acc.colors[..3], &DEFAULT_ROOF_COLOR);
        assert_eq!(&acc.colors[18..21], &DEFAULT_WALL_COLOR);
    }

    fn assert_walls_face_out(acc: &BuildAccumulator, roof_vertices: usize, inside: [f32; 2]) {
        let walls = acc
            .positions
            .chunks(3)
            .zip(acc.normals.chunks(3))
            .skip(roof_vertices);
        for (i, (p, n)) in walls.enumerate() {
            let outward = (p[0] - inside[0]) * n[0] + (p[1] - inside[1]) * n[1];
            assert!(outward > 0.0, "wall vertex {i} normal {n:?} at {p:?}");
            assert_eq!(n[2], 0.0);
        }
    }

    #[test]
    fn wall_normals_point_out_for_either_winding() {
        let counter_clockwise = SQUARE;
        let clockwise = r#"{"type":"Polygon","coordinates":[[[0,0],[0,0.001],[0.001,0.001],[0.001,0],[0,0]]]}"#;
        let plane = LocalTangentPlane::new(0.0, 0.0);
        let [cx, cy] = plane.project(0.0005, 0.0005);

        for geometry in [counter_clockwise, clockwise] {
            let f = feature(r#"{"height":20}"#, geometry);
            let mut acc = BuildAccumulator::default();
            assert_eq!(triangulate(&mut acc, &f, &plane, None), 30);
            assert_walls_face_out(&acc, 6, [cx as f32, cy as f32]);

            // southern wall (lat 0) faces south, which is +y locally
            let south = acc.positions[6 * 3..]
                .chunks(6 * 3)
                .zip(acc.normals[6 * 3..].chunks(6 * 3))
                .find(|(wall, _)| wall.chunks(3).all(|p| p[1] == 0.0))
                .map(|(_, normals)| [normals[0], normals[1], normals[2]]);
            let Some([nx, ny, _]) = south else {
                panic!("no southern wall");
            };
            assert!(nx.abs() < 1e-6 && ny > 0.999, "southern wall normal [{nx}, {ny}]");
        }
    }

    #[test]
    fn hole_walls_face_into_the_hole() {
        let courtyard = r#"{"type":"Polygon","coordinates":[
            [[0,0],[0.003,0],[0.003,0.003],[0,0.003],[0,0]],
            [[0.001,0.001],[0.002,0.001],[0.002,0.002],[0.001,0.002],[0.001,0.001]]]}"#;
        let f = feature(r#"{"height":20}"#, courtyard);
        let plane = LocalTangentPlane::new(0.0, 0.0);
        let mut acc = BuildAccumulator::default();
        let n = triangulate(&mut acc, &f, &plane, None) as usize;

        // 8 walls of 6 vertices each follow the roof
        let roof = n - 8 * 6;
        let hole_walls = acc
            .positions
            .chunks(3)
            .zip(acc.normals.chunks(3))
            .skip(roof + 4 * 6);
        let [cx, cy] = plane.project(0.0015, 0.0015);
        for (p, n) in hole_walls {
            let toward_center = (cx as f32 - p[0]) * n[0] + (cy as f32 - p[1]) * n[1];
            assert!(toward_center > 0.0, "hole wall normal {n:?} at {p:?}");
        }
    }

    #[test]
    fn min_height_lifts_wall_base() {
        let f = feature(r#"{"height":20,"minHeight":5}"#, SQUARE);
        let mut acc = BuildAccumulator::default();
        triangulate(&mut acc, &f, &LocalTangentPlane::new(0.0, 0.0), None);
        let lowest = acc
            .positions
            .chunks(3)
            .map(|p| p[2])
            .fold(f32::INFINITY, f32::min);
        assert_eq!(lowest, 5.0);
    }

    #[test]
    fn color_override_wins_over_properties() {
        let f = feature(r##"{"color":"#00ff00","roofColor":"#0000ff"}"##, SQUARE);
        let mut acc = BuildAccumulator::default();
        let plane = LocalTangentPlane::new(0.0, 0.0);
        triangulate(&mut acc, &f, &plane, None);
        assert_eq!(&acc.colors[..3], &[0.0, 0.0, 1.0]);
        assert_eq!(&acc.colors[18..21], &[0.0, 1.0, 0.0]);

        let mut acc = BuildAccumulator::default();
        triangulate(&mut acc, &f, &plane, Some([1.0, 0.0, 0.0]));
        assert!(acc.colors.chunks(3).all(|c| c == [1.0, 0.0, 0.0]));
    }

    #[test]
    fn points_and_lines_have_no_area() {
        let f = feature("{}", r#"{"type":"LineString","coordinates":[[0,0],[1,1]]}"#);
        let mut acc = BuildAccumulator::default();
        assert_eq!(
            triangulate(&mut acc, &f, &LocalTangentPlane::new(0.0, 0.0), None),
            0
        );
        assert!(acc.positions.is_empty());
    }
}
