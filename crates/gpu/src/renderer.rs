use foundation::handles::Handle;
use foundation::math::Mat4;
use scene::index::DataIndex;
use tracing::trace;

use crate::shader::{Attribute, ShaderVariant};

/// Read-only view of the map camera the building pass renders against.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MapCamera {
    pub lon_deg: f64,
    pub lat_deg: f64,
    pub zoom: f64,
    pub rotation_deg: f64,
    pub tilt_deg: f64,
}

impl MapCamera {
    pub fn new(lon_deg: f64, lat_deg: f64, zoom: f64) -> Self {
        Self {
            lon_deg,
            lat_deg,
            zoom,
            rotation_deg: 0.0,
            tilt_deg: 0.0,
        }
    }
}

/// Buffers bound for one building draw, in [`Attribute::ALL`] order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MeshBindings {
    pub buffers: [Handle; 7],
    pub vertex_count: u32,
}

impl MeshBindings {
    pub fn buffer(&self, attribute: Attribute) -> Handle {
        self.buffers[attribute.slot()]
    }
}

/// Anything the building pass can draw: a mesh placed relative to the camera.
pub trait MeshDrawable {
    /// Inclusive zoom range in which the mesh is drawn.
    fn zoom_range(&self) -> (f64, f64);

    /// Camera-relative model transform; `None` while the mesh is not ready.
    fn model_matrix(&self, camera: &MapCamera) -> Option<Mat4>;

    fn bindings(&self) -> Option<MeshBindings>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawBuildings<K> {
    pub layer: K,
    pub model: [f32; 16],
    pub bindings: MeshBindings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame<K> {
    pub variant: ShaderVariant,
    pub draws: Vec<DrawBuildings<K>>,
}

impl<K> RenderFrame<K> {
    pub fn vertex_count(&self) -> u64 {
        self.draws
            .iter()
            .map(|d| d.bindings.vertex_count as u64)
            .sum()
    }
}

/// Building pass: turns the registered layers into draw commands.
#[derive(Debug, Copy, Clone, Default)]
pub struct Renderer {
    variant: ShaderVariant,
}

impl Renderer {
    pub fn new(variant: ShaderVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> ShaderVariant {
        self.variant
    }

    /// Walks `index` in registration order and emits one draw per layer that
    /// is inside its zoom range and has a matrix and buffers.
    pub fn collect_buildings<'a, K, D, F>(
        &self,
        index: &DataIndex<K>,
        camera: &MapCamera,
        mut lookup: F,
    ) -> RenderFrame<K>
    where
        K: Copy + Eq + std::fmt::Debug,
        D: MeshDrawable + ?Sized + 'a,
        F: FnMut(K) -> Option<&'a D>,
    {
        let mut frame = RenderFrame {
            variant: self.variant,
            draws: Vec::new(),
        };
        for key in index.iter() {
            let Some(item) = lookup(key) else {
                continue;
            };
            let (min_zoom, max_zoom) = item.zoom_range();
            if camera.zoom < min_zoom || camera.zoom > max_zoom {
                trace!(layer = ?key, zoom = camera.zoom, "outside zoom range");
                continue;
            }
            let Some(model) = item.model_matrix(camera) else {
                continue;
            };
            let Some(bindings) = item.bindings() else {
                continue;
            };
            frame.draws.push(DrawBuildings {
                layer: key,
                model: model.to_cols_array_f32(),
                bindings,
            });
        }
        frame
    }
}
