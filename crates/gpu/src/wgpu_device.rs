use wgpu::util::DeviceExt;
use tracing::debug;

use crate::buffers::{BufferDevice, BufferError, GpuBuffer, Slots, check_alignment};

/// [`BufferDevice`] backed by a wgpu device/queue pair.
///
/// Buffers are created with `VERTEX | COPY_DST` so the fade filter can be
/// rewritten in place through the queue.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: Slots<wgpu::Buffer>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: Slots::default(),
        }
    }

    /// Headless device on the default adapter, for offline builds.
    pub fn headless() -> Result<Self, BufferError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(
            instance.request_adapter(&wgpu::RequestAdapterOptions::default()),
        )
        .map_err(|e| BufferError::Device(format!("adapter error: {e}")))?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("buildings-headless-device"),
                ..Default::default()
            },
        ))
        .map_err(|e| BufferError::Device(format!("device error: {e}")))?;
        Ok(Self::new(device, queue))
    }

    /// Borrow the backing buffer for binding in a render pass.
    pub fn buffer(&self, buffer: &GpuBuffer) -> Option<&wgpu::Buffer> {
        self.buffers.get(buffer.handle())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.live()
    }
}

impl BufferDevice for WgpuDevice {
    fn create_buffer(
        &mut self,
        label: &str,
        components: u32,
        data: &[f32],
    ) -> Result<GpuBuffer, BufferError> {
        let num_items = check_alignment(data, components)?;
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
        debug!(label, bytes = data.len() * 4, "created vertex buffer");
        let handle = self.buffers.insert(buffer);
        Ok(GpuBuffer::new(handle, components, num_items))
    }

    fn write_buffer(&mut self, buffer: &GpuBuffer, data: &[f32]) -> Result<(), BufferError> {
        let handle = buffer.handle();
        let target = self
            .buffers
            .get(handle)
            .ok_or(BufferError::UnknownBuffer(handle))?;
        if buffer.len_floats() != data.len() {
            return Err(BufferError::SizeMismatch {
                expected: buffer.len_floats(),
                actual: data.len(),
            });
        }
        self.queue
            .write_buffer(target, 0, bytemuck::cast_slice(data));
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        if let Some(b) = self.buffers.remove(buffer.handle()) {
            b.destroy();
        }
    }
}
