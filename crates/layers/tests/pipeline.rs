use formats::{FeatureCollection, GeoPoint, Geometry};
use foundation::time::Time;
use gpu::{Attribute, RecordingDevice};
use layers::projection::compute_origin;
use layers::{BuildPolicy, Layer, LayerId, LayerOptions, LayerStack};
use pretty_assertions::assert_eq;
use runtime::Frame;

/// Mixed collection: squares, a triangle with a hole-free L-shape, features
/// without ids and a few non-area geometries.
fn city(n: usize) -> FeatureCollection {
    let features: Vec<String> = (0..n)
        .map(|i| {
            let x = 13.0 + (i % 25) as f64 * 0.0004;
            let y = 52.0 + (i / 25) as f64 * 0.0004;
            let (x2, y2) = (x + 0.0002, y + 0.0002);
            let id = match i % 4 {
                0 => format!(r#""id":"w{i}","#),
                1 => format!(r#""id":{i},"#),
                _ => String::new(),
            };
            let props = match i % 3 {
                0 => format!(r#"{{"height":{},"relationId":"r{}"}}"#, 5 + i % 7, i / 2),
                1 => r#"{"minHeight":2}"#.to_string(),
                _ => format!(r#"{{"id":"p{i}","data":{{"n":{i}}}}}"#),
            };
            let geometry = if i % 10 == 9 {
                format!(r#"{{"type":"Point","coordinates":[{x},{y}]}}"#)
            } else {
                format!(
                    r#"{{"type":"Polygon","coordinates":[[[{x},{y}],[{x2},{y}],[{x2},{y2}],[{x},{y2}],[{x},{y}]]]}}"#
                )
            };
            format!(r#"{{"type":"Feature",{id}"properties":{props},"geometry":{geometry}}}"#)
        })
        .collect();
    FeatureCollection::from_geojson_str(&format!(
        r#"{{"type":"FeatureCollection","features":[{}]}}"#,
        features.join(",")
    ))
    .expect("parse city")
}

struct Built {
    positions: Vec<f32>,
    picking: Vec<f32>,
    filters: Vec<f32>,
    counts: Vec<u32>,
    item_ids: Vec<Option<String>>,
    decoded: Vec<Option<String>>,
}

fn build(fc: FeatureCollection, batch: usize, options: LayerOptions, start: Time) -> Built {
    let mut stack = LayerStack::new(RecordingDevice::new(), BuildPolicy::new(batch, 75.0));
    stack.advance(Frame::at(0, start));
    let id = stack.add(fc.into(), options);

    let mut frame = Frame::at(0, start);
    let mut guard = 0;
    while !stack.is_idle() {
        frame = Frame::at(frame.index + 1, Time(frame.time.0 + 0.075));
        stack.advance(frame);
        guard += 1;
        assert!(guard < 10_000, "build did not finish");
    }

    let layer = stack.layer(id).expect("layer");
    assert!(layer.is_ready());
    let buffers = layer.buffers().expect("buffers");
    let data = |a: Attribute| {
        stack
            .device()
            .data(buffers.get(a))
            .expect("buffer data")
            .to_vec()
    };
    let picking = data(Attribute::Id);
    let decoded = picking
        .chunks(3)
        .map(|c| {
            stack
                .picking()
                .pick_color_to_id([c[0], c[1], c[2]])
                .map(str::to_string)
        })
        .collect();

    Built {
        positions: data(Attribute::Position),
        filters: data(Attribute::Filter),
        picking,
        counts: layer.items().iter().map(|i| i.vertex_count).collect(),
        item_ids: layer.items().iter().map(|i| i.id.clone()).collect(),
        decoded,
    }
}

#[test]
fn vertex_counts_sum_to_position_count() {
    let built = build(city(120), 90, LayerOptions::default(), Time::ZERO);
    let total: u32 = built.counts.iter().sum();
    assert_eq!(total as usize, built.positions.len() / 3);
    assert_eq!(built.counts.len(), 120);
}

#[test]
fn picking_colors_decode_to_item_ids() {
    let one = build(city(60), 1, LayerOptions::default(), Time::ZERO);
    let all = build(city(60), 60, LayerOptions::default(), Time::ZERO);

    assert_eq!(one.picking.len(), one.positions.len());
    let mut vertex = 0;
    for (count, id) in one.counts.iter().zip(&one.item_ids) {
        for v in vertex..vertex + *count as usize {
            assert_eq!(&one.decoded[v], id, "vertex {v}");
        }
        vertex += *count as usize;
    }
    assert_eq!(one.decoded, all.decoded);
    assert_eq!(one.picking, all.picking);
}

#[test]
fn apply_filter_twice_is_byte_identical() {
    let mut stack = LayerStack::new(RecordingDevice::new(), BuildPolicy::default());
    let id = stack.add(city(30).into(), LayerOptions::default());
    let read = |stack: &LayerStack<RecordingDevice>| -> Vec<u8> {
        let layer = stack.layer(id).expect("layer");
        let buffers = layer.buffers().expect("buffers");
        let data = stack.device().data(buffers.get(Attribute::Filter)).expect("data");
        data.iter().flat_map(|f| f.to_le_bytes()).collect()
    };

    stack.apply_filter(id).expect("apply");
    let first = read(&stack);
    stack.apply_filter(id).expect("apply");
    let second = read(&stack);
    assert_eq!(first, second);
    assert_eq!(stack.device().writes(), 2);
}

#[test]
fn destroy_mid_build_never_becomes_ready() {
    let mut stack = LayerStack::new(RecordingDevice::new(), BuildPolicy::new(10, 75.0));
    let id = stack.add(city(50).into(), LayerOptions::default());
    stack.advance(Frame::at(1, Time(0.1)));
    let processed = stack.layer(id).and_then(|l| l.progress());
    assert_eq!(processed, Some((20, 50)));
    let loaded_before = stack.events().iter().filter(|e| e.kind == "loadfeature").count();

    assert!(stack.remove(id));
    for i in 2..20 {
        stack.advance(Frame::at(i, Time(i as f64 * 0.1)));
    }
    let loaded_after = stack.events().iter().filter(|e| e.kind == "loadfeature").count();
    assert_eq!(loaded_before, loaded_after);
    assert!(stack.layer(id).is_none());
    assert!(!stack.index().contains(id));
    assert_eq!(stack.device().created(), 0);

    // a fresh layer over the same data builds from scratch
    let again = stack.add(city(50).into(), LayerOptions::default());
    for i in 20..40 {
        stack.advance(Frame::at(i, Time(i as f64 * 0.1)));
    }
    let layer = stack.layer(again).expect("layer");
    assert!(layer.is_ready());
    assert_eq!(layer.items().len(), 50);
    assert_eq!(again, LayerId(id.0 + 1));
}

#[test]
fn fade_windows_follow_build_completion_time() {
    let faded = build(city(20), 90, LayerOptions::default(), Time(4.0));
    assert!(
        faded
            .filters
            .chunks(4)
            .all(|f| f == [4250.0, 4750.0, 0.0, 1.0])
    );

    let options = LayerOptions {
        fade_in: false,
        ..LayerOptions::default()
    };
    let instant = build(city(20), 90, options, Time(4.0));
    assert!(
        instant
            .filters
            .chunks(4)
            .all(|f| f == [4000.0, 4000.0, 0.0, 1.0])
    );
}

#[test]
fn origin_of_each_geometry_type() {
    let p = GeoPoint::new;
    let cases = [
        (Geometry::Point(p(1.0, 2.0)), p(1.0, 2.0)),
        (Geometry::MultiPoint(vec![p(1.0, 2.0), p(3.0, 4.0)]), p(1.0, 2.0)),
        (Geometry::LineString(vec![p(5.0, 6.0), p(3.0, 4.0)]), p(5.0, 6.0)),
        (
            Geometry::MultiLineString(vec![vec![p(7.0, 8.0)], vec![p(3.0, 4.0)]]),
            p(7.0, 8.0),
        ),
        (
            Geometry::Polygon(vec![vec![p(1.0, 2.0), p(3.0, 4.0)], vec![p(9.0, 9.0)]]),
            p(1.0, 2.0),
        ),
        (
            Geometry::MultiPolygon(vec![
                vec![vec![p(-1.0, -2.0), p(3.0, 4.0)]],
                vec![vec![p(9.0, 9.0)]],
            ]),
            p(-1.0, -2.0),
        ),
    ];
    for (geometry, expected) in cases {
        assert_eq!(compute_origin(&geometry), Some(expected), "{}", geometry.type_name());
    }
}

#[test]
fn batch_size_does_not_change_the_mesh() {
    let small = build(city(250), 1, LayerOptions::default(), Time::ZERO);
    let large = build(city(250), 1000, LayerOptions::default(), Time::ZERO);
    assert_eq!(small.counts, large.counts);
    assert!(small.positions == large.positions);
    assert!(small.picking == large.picking);
}
