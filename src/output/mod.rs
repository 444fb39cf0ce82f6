//! Frame output: sinks that receive each rendered 8-bit RGB frame.
//!
//! Two sinks ship with the crate:
//!
//! - `FrameDumper` writes `<dir>/<n>.png` for frame `n` (1-based)
//! - `LogDisplay` stands in for a window and logs frame statistics
//!
//! Anything else (a window, a video encoder) implements `FrameSink`.

mod display;
mod dump;

pub use display::LogDisplay;
pub use dump::FrameDumper;

use crate::compute::RgbFrame;

/// One rendered frame as handed to a sink.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Sequential frame number, starting at 1.
    pub index: u64,
    /// The converted image.
    pub image: &'a RgbFrame,
}

/// Receiver of rendered frames.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame<'_>) -> Result<(), SinkError>;
}

/// Frame output errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Frame {index} holds {len} bytes, expected {size}x{size} RGB")]
    Shape { index: u64, size: u32, len: usize },
}
