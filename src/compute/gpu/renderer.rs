//! GPU Renderer - owns the device, program, particles and canvas, and
//! records the per-frame kernel sequence.

use log::{debug, info};

use super::{
    BackendOptions, ComputeContext, GpuCanvas, GpuError, KernelProgram, ParticleStore,
    ProgramFlags,
};
use crate::compute::{Canvas, Particle, SeedArray};
use crate::schema::RenderConfig;

/// One step of the per-frame pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    ClearCanvas,
    DrawParticles,
    Saturate,
    DrawEmitter,
    Advance,
}

/// Order of the stages in every frame. Readback follows the last stage.
pub const FRAME_SEQUENCE: [FrameStage; 5] = [
    FrameStage::ClearCanvas,
    FrameStage::DrawParticles,
    FrameStage::Saturate,
    FrameStage::DrawEmitter,
    FrameStage::Advance,
];

/// GPU particle renderer.
///
/// All stages go through one queue, so each dispatch sees the writes of the
/// one before it. A frame is recorded into a single command encoder.
pub struct GpuRenderer {
    store: ParticleStore,
    canvas: GpuCanvas,
    program: KernelProgram,
    context: ComputeContext,
}

impl GpuRenderer {
    /// Acquire a device, compile the program, and allocate buffers.
    pub async fn new(config: &RenderConfig) -> Result<Self, GpuError> {
        let context = ComputeContext::acquire(&BackendOptions::from_config(config)).await?;
        let program = KernelProgram::load(
            &context,
            ProgramFlags::from_config(config),
            config.kernel_source.as_deref(),
            config.diagnostics,
        )?;
        let store = ParticleStore::allocate(&context, config.particles)?;
        let canvas = GpuCanvas::allocate(&context, config.window_size)?;

        info!(
            "Allocated {} particles and a {}x{} canvas",
            config.particles, config.window_size, config.window_size
        );

        Ok(Self {
            store,
            canvas,
            program,
            context,
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        self.context.adapter_info()
    }

    pub fn particle_count(&self) -> u32 {
        self.store.len()
    }

    pub fn window_size(&self) -> u32 {
        self.canvas.size()
    }

    /// Run `initParticles` from the given seeds.
    pub fn initialize(&mut self, seeds: &SeedArray) -> Result<(), GpuError> {
        self.store.initialize(&self.context, &self.program, seeds)
    }

    /// Run `iterations` invisible updates.
    pub fn warm_up(&mut self, iterations: u32) -> Result<(), GpuError> {
        self.store.warm_up(&self.context, &self.program, iterations)
    }

    fn encode_stage(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        stage: FrameStage,
    ) -> Result<(), GpuError> {
        let (ctx, program) = (&self.context, &self.program);
        match stage {
            FrameStage::ClearCanvas => self.canvas.clear(ctx, program, encoder),
            FrameStage::DrawParticles => self.canvas.draw(ctx, program, &self.store, encoder),
            FrameStage::Saturate => self.canvas.saturate(ctx, program, encoder),
            FrameStage::DrawEmitter => self.canvas.draw_emitter(ctx, program, encoder),
            FrameStage::Advance => self.store.advance(ctx, program, encoder),
        }
    }

    /// Submit an arbitrary run of stages without reading anything back.
    pub fn run_stages(&mut self, stages: &[FrameStage]) -> Result<(), GpuError> {
        let mut encoder = self.context.encoder("Stage Encoder");
        for &stage in stages {
            self.encode_stage(&mut encoder, stage)?;
        }
        self.context.submit(encoder);
        Ok(())
    }

    /// Render one frame and read the canvas back.
    ///
    /// Blocks on the readback, so the next frame cannot start before this
    /// one is on the host.
    pub fn render_frame(&mut self) -> Result<Canvas, GpuError> {
        let mut encoder = self.context.encoder("Frame Encoder");
        for stage in FRAME_SEQUENCE {
            self.encode_stage(&mut encoder, stage)?;
        }
        self.canvas.encode_readback(&mut encoder);
        self.context.submit(encoder);

        let canvas = self.canvas.read_back(&self.context)?;
        debug!("Frame read back: {} lit cells", canvas.lit_cells());
        Ok(canvas)
    }

    /// Read the canvas as it currently stands on the device.
    pub fn read_canvas(&mut self) -> Result<Canvas, GpuError> {
        let mut encoder = self.context.encoder("Canvas Readback Encoder");
        self.canvas.encode_readback(&mut encoder);
        self.context.submit(encoder);
        self.canvas.read_back(&self.context)
    }

    /// Diagnostic copy of the particle records.
    pub fn read_particles(&self) -> Result<Vec<Particle>, GpuError> {
        self.store.read_back(&self.context)
    }

    /// Release every buffer, then the device.
    pub fn release(self) {
        let Self {
            store,
            canvas,
            program,
            context,
        } = self;
        drop(store);
        drop(canvas);
        drop(program);
        context.release();
    }
}
