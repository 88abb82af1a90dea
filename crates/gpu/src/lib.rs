pub mod buffers;
pub mod renderer;
pub mod shader;
pub mod wgpu_device;

pub use buffers::*;
pub use renderer::*;
pub use shader::*;
pub use wgpu_device::WgpuDevice;
