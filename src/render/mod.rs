//! Frame loop: warm-up, the continuous render loop, and its stop signal.

mod frame_loop;
mod stop;

pub use frame_loop::{FrameLoop, LoopState, RunSummary};
pub use stop::{ChannelStop, NeverStop, StopSignal};

use crate::compute::gpu::GpuError;
use crate::output::SinkError;
use crate::schema::ConfigError;

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    #[error("Frame output failed: {0}")]
    Sink(#[from] SinkError),

    #[error("Frame loop has already run")]
    AlreadyRun,
}
