//! GPU canvas - the RGBA i32 accumulator buffer and its readback path.

use super::{ComputeContext, GpuError, IndexRange, KernelId, KernelProgram, ParticleStore};
use crate::compute::{CHANNELS, Canvas};

/// Device-resident canvas plus a persistent staging buffer for readback.
pub struct GpuCanvas {
    size: u32,
    canvas: wgpu::Buffer,
    staging: wgpu::Buffer,
}

impl GpuCanvas {
    /// Allocate a `size x size` canvas.
    pub fn allocate(ctx: &ComputeContext, size: u32) -> Result<Self, GpuError> {
        let bytes = Self::byte_size(size);
        let canvas = ctx.create_buffer(
            "Canvas Buffer",
            bytes,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        )?;
        let staging = ctx.create_buffer(
            "Canvas Staging Buffer",
            bytes,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        )?;
        Ok(Self {
            size,
            canvas,
            staging,
        })
    }

    fn byte_size(size: u32) -> u64 {
        size as u64 * size as u64 * (CHANNELS * std::mem::size_of::<i32>()) as u64
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn grid(&self) -> IndexRange {
        IndexRange::Grid(self.size, self.size)
    }

    /// Record `clearCanvas`.
    pub fn clear(
        &self,
        ctx: &ComputeContext,
        program: &KernelProgram,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), GpuError> {
        program.enqueue(ctx, encoder, KernelId::ClearCanvas, &[&self.canvas], self.grid())
    }

    /// Record `drawParticles`.
    pub fn draw(
        &self,
        ctx: &ComputeContext,
        program: &KernelProgram,
        store: &ParticleStore,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), GpuError> {
        program.enqueue(
            ctx,
            encoder,
            KernelId::DrawParticles,
            &[store.buffer(), &self.canvas],
            IndexRange::Linear(store.len()),
        )
    }

    /// Record `saturate`.
    pub fn saturate(
        &self,
        ctx: &ComputeContext,
        program: &KernelProgram,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), GpuError> {
        program.enqueue(ctx, encoder, KernelId::Saturate, &[&self.canvas], self.grid())
    }

    /// Record `drawEmitter` (a single invocation).
    pub fn draw_emitter(
        &self,
        ctx: &ComputeContext,
        program: &KernelProgram,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), GpuError> {
        program.enqueue(
            ctx,
            encoder,
            KernelId::DrawEmitter,
            &[&self.canvas],
            IndexRange::Linear(1),
        )
    }

    /// Record the canvas-to-staging copy.
    pub fn encode_readback(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_buffer_to_buffer(&self.canvas, 0, &self.staging, 0, self.canvas.size());
    }

    /// Map the staging buffer and wrap it as a host `Canvas`.
    ///
    /// Blocks until the submitted copy from `encode_readback` completes.
    pub fn read_back(&self, ctx: &ComputeContext) -> Result<Canvas, GpuError> {
        let data: Vec<i32> = ctx.map_read(&self.staging)?;
        let found = data.len();
        Canvas::from_raw(self.size, data).ok_or(GpuError::ReadbackSize {
            expected: self.size as usize * self.size as usize * CHANNELS,
            found,
        })
    }
}
