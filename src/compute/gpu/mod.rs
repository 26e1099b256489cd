//! GPU Backend for the Life simulation
//!
//! Device acquisition, buffers, pipelines and the frame loop using WebGPU
//! (wgpu).

mod buffers;
mod context;
mod layout;
mod pipelines;
mod simulation;

pub use buffers::{GridBuffers, GridUniform};
pub use context::{DeviceContext, Frame, RenderTarget};
pub use layout::ResourceLayout;
pub use pipelines::{CLEAR_COLOR, ComputePipeline, Pipelines, RenderPipeline};
pub use simulation::{FrameOutcome, GpuSimulation};

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No WebGPU backend is available on this platform")]
    UnsupportedPlatform,

    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Presentation surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Grid {width}x{height} needs {bytes} bytes per state buffer, device allows {limit}")]
    GridTooLarge {
        width: u32,
        height: u32,
        bytes: u64,
        limit: u64,
    },

    #[error(
        "Grid {width}x{height} needs {groups_x}x{groups_y} workgroups, device allows {limit} per dimension"
    )]
    TooManyWorkgroups {
        width: u32,
        height: u32,
        groups_x: u32,
        groups_y: u32,
        limit: u32,
    },

    #[error("Seed has {actual} cells, grid has {expected}")]
    SeedSizeMismatch { expected: usize, actual: usize },

    #[error("Grid buffers have been destroyed")]
    BuffersDestroyed,

    #[error("Out of memory while acquiring a frame")]
    OutOfMemory,

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Readback channel closed before mapping completed")]
    ReadbackCancelled,
}
