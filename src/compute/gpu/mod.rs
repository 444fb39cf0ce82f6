//! GPU Compute Backend for the particle canvas
//!
//! Provides the device context, the kernel program, and the per-frame
//! pipeline using WebGPU (wgpu).

mod canvas;
mod context;
mod program;
mod renderer;
mod store;

use std::path::PathBuf;

pub use canvas::GpuCanvas;
pub use context::{BackendOptions, ComputeContext};
pub use program::{
    CANVAS_BINDING, IndexRange, KernelId, KernelProgram, PARTICLE_PROGRAM, PARTICLES_BINDING,
    ProgramFlags, RangeShape, SEEDS_BINDING, validate_program,
};
pub use renderer::{FRAME_SEQUENCE, FrameStage, GpuRenderer};
pub use store::ParticleStore;

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Adapter \"{name}\" ({device_type}) rejected: {reason}")]
    AdapterRejected {
        name: String,
        device_type: String,
        reason: &'static str,
    },

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Cannot allocate {label} of {size} bytes (device limit {limit})")]
    BufferAllocation {
        label: &'static str,
        size: u64,
        limit: u64,
    },

    #[error("Failed to read kernel program {path}: {source}")]
    KernelSource {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Kernel program failed to build: {0}")]
    ProgramBuild(String),

    #[error("Kernel program has no entry point `{0}`")]
    MissingEntryPoint(&'static str),

    #[error("Kernel `{kernel}` takes {expected} buffer arguments, got {found}")]
    ArgumentCount {
        kernel: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Kernel `{kernel}` must be dispatched over a {expected:?} index range")]
    IndexRangeShape {
        kernel: &'static str,
        expected: RangeShape,
    },

    #[error("Seed array covers {found} particles, store holds {expected}")]
    SeedCount { expected: usize, found: usize },

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("Readback callback dropped before the buffer was mapped")]
    ReadbackAborted,

    #[error("Readback returned {found} values, expected {expected}")]
    ReadbackSize { expected: usize, found: usize },
}
