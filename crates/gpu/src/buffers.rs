use foundation::handles::Handle;

/// A GPU-resident array of `f32` vertex attributes.
///
/// Owning a `GpuBuffer` is owning the device allocation: it is not `Clone`,
/// and [`BufferDevice::destroy_buffer`] consumes it, so a buffer can only be
/// released once. Render code borrows it through [`GpuBuffer::handle`].
#[derive(Debug, PartialEq, Eq)]
pub struct GpuBuffer {
    handle: Handle,
    components: u32,
    num_items: u32,
}

impl GpuBuffer {
    pub fn new(handle: Handle, components: u32, num_items: u32) -> Self {
        Self {
            handle,
            components,
            num_items,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Components per vertex (3 for positions, 4 for fade filters, ...).
    pub fn components(&self) -> u32 {
        self.components
    }

    /// Number of vertices stored.
    pub fn num_items(&self) -> u32 {
        self.num_items
    }

    pub fn len_floats(&self) -> usize {
        self.components as usize * self.num_items as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Data length is not a multiple of the component count.
    Misaligned { len: usize, components: u32 },
    /// In-place write with a different size than the allocation.
    SizeMismatch { expected: usize, actual: usize },
    /// Handle does not name a live buffer on this device.
    UnknownBuffer(Handle),
    /// The device refused the allocation.
    Device(String),
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::Misaligned { len, components } => {
                write!(f, "{len} floats is not a multiple of {components} components")
            }
            BufferError::SizeMismatch { expected, actual } => {
                write!(f, "buffer holds {expected} floats, write has {actual}")
            }
            BufferError::UnknownBuffer(h) => {
                write!(f, "unknown buffer {}:{}", h.index(), h.generation())
            }
            BufferError::Device(msg) => write!(f, "device error: {msg}"),
        }
    }
}

impl std::error::Error for BufferError {}

/// GPU buffer primitive the mesh pipeline allocates through.
pub trait BufferDevice {
    fn create_buffer(
        &mut self,
        label: &str,
        components: u32,
        data: &[f32],
    ) -> Result<GpuBuffer, BufferError>;

    /// Overwrites the whole buffer in place; sizes must match.
    fn write_buffer(&mut self, buffer: &GpuBuffer, data: &[f32]) -> Result<(), BufferError>;

    fn destroy_buffer(&mut self, buffer: GpuBuffer);
}

pub fn check_alignment(data: &[f32], components: u32) -> Result<u32, BufferError> {
    if components == 0 || data.len() % components as usize != 0 {
        return Err(BufferError::Misaligned {
            len: data.len(),
            components,
        });
    }
    Ok((data.len() / components as usize) as u32)
}

/// Generational slot table shared by the device backends.
#[derive(Debug)]
pub(crate) struct Slots<T> {
    slots: Vec<(u32, Option<T>)>,
    free: Vec<u32>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Slots<T> {
    pub(crate) fn insert(&mut self, value: T) -> Handle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let handle = Handle::new(index, slot.0).next_generation();
            *slot = (handle.generation(), Some(value));
            return handle;
        }
        let index = self.slots.len() as u32;
        self.slots.push((0, Some(value)));
        Handle::new(index, 0)
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&T> {
        let (generation, value) = self.slots.get(handle.index() as usize)?;
        if *generation != handle.generation() {
            return None;
        }
        value.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let (generation, value) = self.slots.get_mut(handle.index() as usize)?;
        if *generation != handle.generation() {
            return None;
        }
        value.as_mut()
    }

    pub(crate) fn remove(&mut self, handle: Handle) -> Option<T> {
        let (generation, value) = self.slots.get_mut(handle.index() as usize)?;
        if *generation != handle.generation() {
            return None;
        }
        let out = value.take()?;
        self.free.push(handle.index());
        Some(out)
    }

    pub(crate) fn live(&self) -> usize {
        self.slots.iter().filter(|(_, v)| v.is_some()).count()
    }
}

/// In-memory device: keeps a CPU copy of every buffer.
///
/// Used for headless runs and tests; `fail_after` simulates an allocation
/// failure after a number of successful creations.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    buffers: Slots<(String, Vec<f32>)>,
    created: usize,
    destroyed: usize,
    writes: usize,
    fail_after: Option<usize>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(successful_creates: usize) -> Self {
        Self {
            fail_after: Some(successful_creates),
            ..Self::default()
        }
    }

    pub fn data(&self, buffer: &GpuBuffer) -> Option<&[f32]> {
        self.buffers
            .get(buffer.handle())
            .map(|(_, data)| data.as_slice())
    }

    pub fn label(&self, buffer: &GpuBuffer) -> Option<&str> {
        self.buffers
            .get(buffer.handle())
            .map(|(label, _)| label.as_str())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.live()
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl BufferDevice for RecordingDevice {
    fn create_buffer(
        &mut self,
        label: &str,
        components: u32,
        data: &[f32],
    ) -> Result<GpuBuffer, BufferError> {
        let num_items = check_alignment(data, components)?;
        if let Some(limit) = self.fail_after
            && self.created >= limit
        {
            return Err(BufferError::Device(format!("out of memory creating {label}")));
        }
        self.created += 1;
        let handle = self.buffers.insert((label.to_string(), data.to_vec()));
        Ok(GpuBuffer::new(handle, components, num_items))
    }

    fn write_buffer(&mut self, buffer: &GpuBuffer, data: &[f32]) -> Result<(), BufferError> {
        let handle = buffer.handle();
        let (_, stored) = self
            .buffers
            .get_mut(handle)
            .ok_or(BufferError::UnknownBuffer(handle))?;
        if stored.len() != data.len() {
            return Err(BufferError::SizeMismatch {
                expected: stored.len(),
                actual: data.len(),
            });
        }
        stored.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        if self.buffers.remove(buffer.handle()).is_some() {
            self.destroyed += 1;
        }
    }
}
