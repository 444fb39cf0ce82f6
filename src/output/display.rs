//! Headless stand-in for a display window.

use std::time::Instant;

use log::{debug, info};

use super::{Frame, FrameSink, SinkError};

/// Logs a summary line every `interval` frames instead of showing them.
pub struct LogDisplay {
    interval: u64,
    started: Option<Instant>,
}

impl LogDisplay {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            started: None,
        }
    }
}

impl Default for LogDisplay {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameSink for LogDisplay {
    fn present(&mut self, frame: &Frame<'_>) -> Result<(), SinkError> {
        let started = *self.started.get_or_insert_with(Instant::now);

        if frame.index % self.interval == 0 {
            let fps = frame.index as f32 / started.elapsed().as_secs_f32().max(f32::EPSILON);
            info!(
                "Frame {}: {} lit pixels, {:.1} frames/s",
                frame.index,
                frame.image.lit_pixels(),
                fps
            );
        } else {
            debug!("Frame {}", frame.index);
        }
        Ok(())
    }
}
