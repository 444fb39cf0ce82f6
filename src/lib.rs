//! Particle Canvas - a GPU-resident particle system.
//!
//! Thousands of independent particles are spawned at an emitter, advanced
//! by a small stochastic motion model, and composited into a square RGBA
//! canvas with atomic integer accumulation, all on the GPU. The host only
//! orders the kernel dispatches and reads each finished frame back.
//!
//! # Architecture
//!
//! - `schema`: Run configuration
//! - `compute`: Particle layout, seeds, the host canvas, and the wgpu backend
//! - `output`: Frame sinks (PNG dumper, logging display)
//! - `render`: The frame loop and its stop signals
//!
//! # Example
//!
//! ```rust,no_run
//! use particle_canvas::{
//!     output::LogDisplay,
//!     render::{FrameLoop, NeverStop},
//!     schema::{Palette, RenderConfig},
//! };
//!
//! let config = RenderConfig {
//!     particles: 10_000,
//!     palette: Palette::Fire,
//!     max_frames: Some(120),
//!     ..Default::default()
//! };
//!
//! let mut frame_loop = FrameLoop::new(config).unwrap();
//! let summary = frame_loop
//!     .run(&mut LogDisplay::default(), &mut NeverStop)
//!     .unwrap();
//!
//! println!("Rendered {} frames", summary.frames_rendered);
//! ```

pub mod compute;
pub mod output;
pub mod render;
pub mod schema;

// Re-export commonly used types
pub use compute::{Canvas, Particle, RgbFrame, SeedArray};
pub use render::{FrameLoop, LoopState, RenderError, RunSummary};
pub use schema::{Palette, RenderConfig};
