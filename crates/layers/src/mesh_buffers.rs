use gpu::{Attribute, BufferDevice, BufferError, GpuBuffer, MeshBindings};
use tracing::debug;

use crate::build::{BuildAccumulator, Items};
use crate::filter::expand_per_vertex;

/// The seven vertex buffers of a finished building mesh.
///
/// Buffers are stored in [`Attribute::ALL`] order. Only the filter buffer
/// changes after creation.
#[derive(Debug)]
pub struct MeshBuffers {
    buffers: [GpuBuffer; 7],
    vertex_count: u32,
}

impl MeshBuffers {
    /// Uploads the accumulated arrays plus per-vertex heights and filters.
    ///
    /// On failure every buffer created so far is released again.
    pub fn finalize(
        device: &mut dyn BufferDevice,
        acc: &BuildAccumulator,
        items: &Items,
    ) -> Result<Self, BufferError> {
        let vertex_count = acc.vertex_count();
        if items.total_vertices() != vertex_count {
            return Err(BufferError::SizeMismatch {
                expected: vertex_count,
                actual: items.total_vertices(),
            });
        }

        let heights = expand_per_vertex(items.as_slice(), |item| [item.height]);
        let filters = filter_data(items);

        let mut created: Vec<GpuBuffer> = Vec::with_capacity(Attribute::ALL.len());
        for attribute in Attribute::ALL {
            let data: &[f32] = match attribute {
                Attribute::Position => &acc.positions,
                Attribute::TexCoord => &acc.texcoords,
                Attribute::Color => &acc.colors,
                Attribute::Filter => &filters,
                Attribute::Normal => &acc.normals,
                Attribute::Id => &acc.picking_colors,
                Attribute::Height => &heights,
            };
            let result = check_vertex_count(attribute, data, vertex_count).and_then(|_| {
                device.create_buffer(attribute.name(), attribute.components(), data)
            });
            match result {
                Ok(buffer) => created.push(buffer),
                Err(e) => {
                    for buffer in created {
                        device.destroy_buffer(buffer);
                    }
                    return Err(e);
                }
            }
        }

        let buffers: [GpuBuffer; 7] = created.try_into().map_err(|rest: Vec<GpuBuffer>| {
            BufferError::SizeMismatch {
                expected: Attribute::ALL.len(),
                actual: rest.len(),
            }
        })?;
        debug!(vertices = vertex_count, "uploaded building mesh");
        Ok(Self {
            buffers,
            vertex_count: vertex_count as u32,
        })
    }

    /// Rewrites the filter buffer in place from the items' fade windows.
    pub fn apply_filter(
        &self,
        device: &mut dyn BufferDevice,
        items: &Items,
    ) -> Result<(), BufferError> {
        device.write_buffer(self.get(Attribute::Filter), &filter_data(items))
    }

    /// Releases every buffer. Consuming `self` makes a second release impossible.
    pub fn destroy_all(self, device: &mut dyn BufferDevice) {
        for buffer in self.buffers {
            device.destroy_buffer(buffer);
        }
    }

    pub fn get(&self, attribute: Attribute) -> &GpuBuffer {
        &self.buffers[attribute.slot()]
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn bindings(&self) -> MeshBindings {
        MeshBindings {
            buffers: std::array::from_fn(|i| self.buffers[i].handle()),
            vertex_count: self.vertex_count,
        }
    }
}

fn filter_data(items: &Items) -> Vec<f32> {
    expand_per_vertex(items.as_slice(), |item| item.filter.to_array())
}

fn check_vertex_count(
    attribute: Attribute,
    data: &[f32],
    vertex_count: usize,
) -> Result<(), BufferError> {
    let expected = vertex_count * attribute.components() as usize;
    if data.len() != expected {
        return Err(BufferError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
