use std::ops::Range;
use std::sync::Arc;

use formats::{Feature, FeatureCollection, GeoPoint};
use foundation::math::{LocalTangentPlane, Vec3};
use scene::picking::PickingRegistry;
use serde_json::Value;

use crate::extrude::{DEFAULT_HEIGHT, triangulate};
use crate::filter::FadeFilter;

/// Growing vertex arrays of a build in progress.
///
/// All sequences describe the same vertices: `positions`, `normals`,
/// `colors` and `picking_colors` hold 3 floats per vertex, `texcoords` 2.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BuildAccumulator {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub colors: Vec<f32>,
    pub texcoords: Vec<f32>,
    pub picking_colors: Vec<f32>,
}

impl BuildAccumulator {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3, color: [f32; 3], uv: [f32; 2]) {
        self.positions.extend_from_slice(&position.to_f32());
        self.normals.extend_from_slice(&normal.to_f32());
        self.colors.extend_from_slice(&color);
        self.texcoords.extend_from_slice(&uv);
    }

    /// Tags the last `count` vertices with one picking color.
    fn tag_vertices(&mut self, count: u32, color: [f32; 3]) {
        for _ in 0..count {
            self.picking_colors.extend_from_slice(&color);
        }
    }
}

/// One input feature as emitted into the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: Option<String>,
    pub vertex_count: u32,
    pub height: f32,
    pub data: Option<Value>,
    pub filter: FadeFilter,
}

/// Items in emission order.
///
/// Vertex ranges are not stored: item `i` covers the vertices after the
/// first `i` items, so the list only ever grows at the end.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Items {
    items: Vec<Item>,
}

impl Items {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Item] {
        &self.items
    }

    pub(crate) fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    /// Filters may be rewritten; the items themselves may not move.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [Item] {
        &mut self.items
    }

    pub fn total_vertices(&self) -> usize {
        self.items.iter().map(|i| i.vertex_count as usize).sum()
    }

    pub fn vertex_range(&self, index: usize) -> Option<Range<usize>> {
        let item = self.items.get(index)?;
        let start: usize = self.items[..index]
            .iter()
            .map(|i| i.vertex_count as usize)
            .sum();
        Some(start..start + item.vertex_count as usize)
    }

    /// Index of the item that emitted vertex `vertex`.
    pub fn item_for_vertex(&self, vertex: usize) -> Option<usize> {
        let mut end = 0;
        for (index, item) in self.items.iter().enumerate() {
            end += item.vertex_count as usize;
            if vertex < end {
                return Some(index);
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a Items {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Picking identifier of a feature.
///
/// A forced layer id wins, then `properties.relationId`, the top-level id
/// and finally `properties.id`.
pub fn resolve_id(feature: &Feature, forced: Option<&str>) -> Option<String> {
    if let Some(id) = forced {
        return Some(id.to_string());
    }
    feature
        .property_id("relationId")
        .or_else(|| feature.id.clone())
        .or_else(|| feature.property_id("id"))
}

/// Cursor over a shared collection, converting it batch by batch.
///
/// Each batch runs to completion and only ever appends to the accumulator
/// and the item list, in input order.
#[derive(Debug)]
pub struct ChunkedBuild {
    collection: Arc<FeatureCollection>,
    cursor: usize,
    plane: LocalTangentPlane,
    forced_id: Option<String>,
    color_override: Option<[f32; 3]>,
    accumulator: BuildAccumulator,
    items: Items,
}

impl ChunkedBuild {
    pub fn new(
        collection: Arc<FeatureCollection>,
        origin: GeoPoint,
        forced_id: Option<String>,
        color_override: Option<[f32; 3]>,
    ) -> Self {
        Self {
            collection,
            cursor: 0,
            plane: LocalTangentPlane::new(origin.lon_deg, origin.lat_deg),
            forced_id,
            color_override,
            accumulator: BuildAccumulator::default(),
            items: Items::default(),
        }
    }

    pub fn total(&self) -> usize {
        self.collection.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.total()
    }

    pub fn accumulator(&self) -> &BuildAccumulator {
        &self.accumulator
    }

    pub fn items(&self) -> &Items {
        &self.items
    }

    /// Converts up to `batch` features and returns how many were processed.
    ///
    /// `on_feature` sees every feature, with its resolved id, before it is
    /// converted.
    pub fn process_batch(
        &mut self,
        batch: usize,
        picking: &mut PickingRegistry,
        mut on_feature: impl FnMut(&Feature, Option<&str>),
    ) -> usize {
        let end = (self.cursor + batch.max(1)).min(self.total());
        for feature in &self.collection.features[self.cursor..end] {
            let id = resolve_id(feature, self.forced_id.as_deref());
            on_feature(feature, id.as_deref());

            let vertex_count = triangulate(
                &mut self.accumulator,
                feature,
                &self.plane,
                self.color_override,
            );
            let pick = picking.id_to_color(id.as_deref());
            self.accumulator.tag_vertices(vertex_count, pick);

            self.items.push(Item {
                id,
                vertex_count,
                height: feature.height().unwrap_or(DEFAULT_HEIGHT) as f32,
                data: feature.data().cloned(),
                filter: FadeFilter::default(),
            });
        }
        let processed = end - self.cursor;
        self.cursor = end;
        processed
    }

    pub fn into_parts(self) -> (BuildAccumulator, Items) {
        (self.accumulator, self.items)
    }
}
