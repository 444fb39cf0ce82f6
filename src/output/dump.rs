//! Frame dumper for writing rendered frames as numbered PNG files.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::{Frame, FrameSink, SinkError};

/// Writes each frame to `<dir>/<index>.png`.
///
/// The directory is created on the first frame, so a run that fails before
/// rendering leaves nothing behind.
///
/// Usage:
/// ```ignore
/// let mut dumper = FrameDumper::new("dump");
/// dumper.present(&Frame { index: 1, image: &canvas.to_rgb8() })?;
/// ```
pub struct FrameDumper {
    dir: PathBuf,
    dir_ready: bool,
    frames_written: u64,
}

impl FrameDumper {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            dir_ready: false,
            frames_written: 0,
        }
    }

    /// Path of the file for frame `index`.
    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{index}.png"))
    }

    /// Get number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl FrameSink for FrameDumper {
    fn present(&mut self, frame: &Frame<'_>) -> Result<(), SinkError> {
        let image = frame.image;
        if image.pixels.len() != image.size as usize * image.size as usize * 3 {
            return Err(SinkError::Shape {
                index: frame.index,
                size: image.size,
                len: image.pixels.len(),
            });
        }

        if !self.dir_ready {
            fs::create_dir_all(&self.dir)?;
            self.dir_ready = true;
            info!("Dumping frames to {}", self.dir.display());
        }

        let path = self.frame_path(frame.index);
        image::save_buffer_with_format(
            &path,
            &image.pixels,
            image.size,
            image.size,
            image::ColorType::Rgb8,
            image::ImageFormat::Png,
        )?;
        self.frames_written += 1;

        debug!("Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Canvas, RgbFrame};
    use tempfile::tempdir;

    #[test]
    fn test_dumper_writes_numbered_frames() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("dump");

        let mut canvas = Canvas::new(480);
        canvas.set_cell(10, 20, [255, 64, 0, 1]);
        let image = canvas.to_rgb8();

        let mut dumper = FrameDumper::new(&out);
        assert!(!out.exists());

        for index in 1..=3 {
            dumper.present(&Frame { index, image: &image }).unwrap();
        }
        assert_eq!(dumper.frames_written(), 3);

        for index in 1..=3 {
            let decoded = image::open(out.join(format!("{index}.png")))
                .unwrap()
                .to_rgb8();
            assert_eq!(decoded.dimensions(), (480, 480));
            assert_eq!(decoded.get_pixel(10, 20).0, [255, 64, 0]);
            assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0]);
        }
    }

    #[test]
    fn test_dumper_rejects_malformed_frames() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("dump");
        let image = RgbFrame {
            size: 4,
            pixels: vec![0; 10],
        };

        let mut dumper = FrameDumper::new(&out);
        let result = dumper.present(&Frame { index: 1, image: &image });

        assert!(matches!(result, Err(SinkError::Shape { .. })));
        assert!(!out.exists());
    }
}
