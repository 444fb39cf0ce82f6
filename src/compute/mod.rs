//! Compute module - particle records, canvas, and the GPU kernel pipeline.

mod canvas;
mod particle;

pub mod gpu;

pub use canvas::*;
pub use particle::*;
