//! The render loop state machine.

use std::time::{Duration, Instant};

use log::{debug, info};

use super::{RenderError, StopSignal};
use crate::compute::SeedArray;
use crate::compute::gpu::GpuRenderer;
use crate::output::{Frame, FrameDumper, FrameSink};
use crate::schema::RenderConfig;

/// Lifecycle of a `FrameLoop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    WarmingUp,
    Rendering,
    Stopped,
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_rendered: u64,
    pub frames_dumped: u64,
    pub adapter: String,
}

/// Drives warm-up and the per-frame pipeline from a single host thread.
///
/// Usage:
/// ```ignore
/// let mut frame_loop = FrameLoop::new(RenderConfig::default())?;
/// let summary = frame_loop.run(&mut LogDisplay::default(), &mut ChannelStop::stdin())?;
/// ```
pub struct FrameLoop {
    config: RenderConfig,
    state: LoopState,
}

impl FrameLoop {
    /// Validate `config` and build a loop that has not touched the GPU yet.
    pub fn new(config: RenderConfig) -> Result<Self, RenderError> {
        config.validate()?;
        Ok(Self {
            config,
            state: LoopState::Uninitialized,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    fn enter(&mut self, state: LoopState) {
        debug!("Frame loop: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Run until the stop signal fires or the frame budget is spent.
    ///
    /// Always leaves the loop `Stopped` with every device resource
    /// released, whether the run succeeds or fails. A loop runs once.
    pub fn run(
        &mut self,
        display: &mut dyn FrameSink,
        stop: &mut dyn StopSignal,
    ) -> Result<RunSummary, RenderError> {
        if self.state != LoopState::Uninitialized {
            return Err(RenderError::AlreadyRun);
        }

        let result = match pollster::block_on(GpuRenderer::new(&self.config)) {
            Ok(mut renderer) => {
                let result = self.drive(&mut renderer, display, stop);
                renderer.release();
                result
            }
            Err(e) => Err(e.into()),
        };

        self.enter(LoopState::Stopped);
        if let Ok(summary) = &result {
            info!(
                "Rendered {} frames ({} dumped) on \"{}\"",
                summary.frames_rendered, summary.frames_dumped, summary.adapter
            );
        }
        result
    }

    fn drive(
        &mut self,
        renderer: &mut GpuRenderer,
        display: &mut dyn FrameSink,
        stop: &mut dyn StopSignal,
    ) -> Result<RunSummary, RenderError> {
        self.enter(LoopState::WarmingUp);
        let seeds = SeedArray::new(self.config.particles, self.config.random_seed);
        renderer.initialize(&seeds)?;
        drop(seeds);

        let started = Instant::now();
        renderer.warm_up(self.config.warmup_iterations)?;
        info!(
            "Warm-up: {} iterations in {:.2}s",
            self.config.warmup_iterations,
            started.elapsed().as_secs_f32()
        );

        self.enter(LoopState::Rendering);
        info!(
            "Rendering {} particles on a {}x{} canvas",
            renderer.particle_count(),
            renderer.window_size(),
            renderer.window_size()
        );
        let mut dumper = self
            .config
            .dump_frames
            .then(|| FrameDumper::new(&self.config.dump_dir));
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let mut index = 0;

        loop {
            let canvas = renderer.render_frame()?;
            let image = canvas.to_rgb8();
            index += 1;

            let frame = Frame {
                index,
                image: &image,
            };
            display.present(&frame)?;
            if let Some(dumper) = dumper.as_mut() {
                dumper.present(&frame)?;
            }

            if self.config.max_frames.is_some_and(|max| index >= max) {
                debug!("Frame budget of {index} reached");
                break;
            }
            if stop.should_stop(poll) {
                debug!("Stop requested after frame {index}");
                break;
            }
        }

        Ok(RunSummary {
            frames_rendered: index,
            frames_dumped: dumper.map_or(0, |d| d.frames_written()),
            adapter: renderer.adapter_info().name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::gpu::GpuError;
    use crate::output::SinkError;
    use crate::render::{ChannelStop, NeverStop};
    use crate::schema::ConfigError;
    use tempfile::tempdir;

    /// Display that remembers the frames it was shown.
    #[derive(Default)]
    struct RecordingDisplay {
        indices: Vec<u64>,
        sizes: Vec<u32>,
    }

    impl FrameSink for RecordingDisplay {
        fn present(&mut self, frame: &Frame<'_>) -> Result<(), SinkError> {
            self.indices.push(frame.index);
            self.sizes.push(frame.image.size);
            Ok(())
        }
    }

    fn is_missing_gpu(error: &RenderError) -> bool {
        matches!(
            error,
            RenderError::Gpu(GpuError::NoAdapter | GpuError::AdapterRejected { .. })
        )
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = RenderConfig {
            particles: 0,
            ..Default::default()
        };
        assert!(matches!(
            FrameLoop::new(config),
            Err(RenderError::Config(ConfigError::NoParticles))
        ));
    }

    #[test]
    fn test_new_loop_is_uninitialized() {
        let frame_loop = FrameLoop::new(RenderConfig::default()).unwrap();
        assert_eq!(frame_loop.state(), LoopState::Uninitialized);
        assert_eq!(frame_loop.config().particles, 200);
    }

    #[test]
    fn test_dumps_numbered_frames() {
        let dir = tempdir().unwrap();
        let dump_dir = dir.path().join("dump");
        let config = RenderConfig {
            particles: 200,
            dump_frames: true,
            dump_dir: dump_dir.clone(),
            max_frames: Some(5),
            random_seed: Some(3),
            allow_software_adapter: true,
            ..Default::default()
        };

        let mut display = RecordingDisplay::default();
        let mut frame_loop = FrameLoop::new(config).unwrap();
        let summary = match frame_loop.run(&mut display, &mut NeverStop) {
            Ok(summary) => summary,
            Err(e) if is_missing_gpu(&e) => {
                eprintln!("Skipping GPU test: no adapter available");
                return;
            }
            Err(e) => panic!("Run failed: {e}"),
        };

        assert_eq!(frame_loop.state(), LoopState::Stopped);
        assert_eq!(summary.frames_rendered, 5);
        assert_eq!(summary.frames_dumped, 5);
        assert_eq!(display.indices, vec![1, 2, 3, 4, 5]);
        assert!(display.sizes.iter().all(|&s| s == 480));

        for index in 1..=5 {
            let image = image::open(dump_dir.join(format!("{index}.png")))
                .unwrap()
                .to_rgb8();
            assert_eq!(image.dimensions(), (480, 480));
        }
        assert!(!dump_dir.join("0.png").exists());
        assert!(!dump_dir.join("6.png").exists());
    }

    #[test]
    fn test_stop_signal_ends_loop() {
        let config = RenderConfig {
            particles: 64,
            warmup_iterations: 10,
            poll_interval_ms: 1,
            allow_software_adapter: true,
            ..Default::default()
        };

        let (sender, mut stop) = ChannelStop::new();
        sender.send(()).unwrap();

        let mut display = RecordingDisplay::default();
        let mut frame_loop = FrameLoop::new(config).unwrap();
        match frame_loop.run(&mut display, &mut stop) {
            Ok(summary) => assert_eq!(summary.frames_rendered, 1),
            Err(e) if is_missing_gpu(&e) => {
                eprintln!("Skipping GPU test: no adapter available");
                return;
            }
            Err(e) => panic!("Run failed: {e}"),
        }
        assert_eq!(display.indices, vec![1]);
        assert_eq!(frame_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn test_missing_device_fails_without_output() {
        let dir = tempdir().unwrap();
        let dump_dir = dir.path().join("dump");
        let config = RenderConfig {
            dump_frames: true,
            dump_dir: dump_dir.clone(),
            max_frames: Some(5),
            adapter_name: Some("no-such-adapter-0f3a9c".to_string()),
            ..Default::default()
        };

        let mut display = RecordingDisplay::default();
        let mut frame_loop = FrameLoop::new(config).unwrap();
        let result = frame_loop.run(&mut display, &mut NeverStop);

        assert!(matches!(&result, Err(e) if is_missing_gpu(e)));
        assert_eq!(frame_loop.state(), LoopState::Stopped);
        assert!(display.indices.is_empty());
        assert!(!dump_dir.exists());

        // A stopped loop does not start again.
        assert!(matches!(
            frame_loop.run(&mut display, &mut NeverStop),
            Err(RenderError::AlreadyRun)
        ));
    }
}
