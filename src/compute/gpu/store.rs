//! Particle store - the device-resident particle array.

use log::debug;

use super::{ComputeContext, GpuError, IndexRange, KernelId, KernelProgram};
use crate::compute::{Particle, SeedArray};

/// Updates recorded per submission during warm-up.
const WARMUP_BATCH: u32 = 250;

/// Device-resident array of particle records.
///
/// Created by `initParticles`, advanced in place by `updateParticles`.
pub struct ParticleStore {
    particles: wgpu::Buffer,
    count: u32,
}

impl ParticleStore {
    /// Allocate room for `count` particles.
    pub fn allocate(ctx: &ComputeContext, count: u32) -> Result<Self, GpuError> {
        let particles = ctx.create_buffer(
            "Particle Buffer",
            count as u64 * Particle::SIZE as u64,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        )?;
        Ok(Self { particles, count })
    }

    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.particles
    }

    /// Upload the seed pairs and run `initParticles` over every particle.
    ///
    /// The seed buffer is dropped once the dispatch is submitted.
    pub fn initialize(
        &self,
        ctx: &ComputeContext,
        program: &KernelProgram,
        seeds: &SeedArray,
    ) -> Result<(), GpuError> {
        if seeds.particles() != self.count as usize {
            return Err(GpuError::SeedCount {
                expected: self.count as usize,
                found: seeds.particles(),
            });
        }

        let seed_buffer = ctx.create_buffer(
            "Seed Buffer",
            std::mem::size_of_val(seeds.as_slice()) as u64,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        )?;
        ctx.queue()
            .write_buffer(&seed_buffer, 0, bytemuck::cast_slice(seeds.as_slice()));

        let mut encoder = ctx.encoder("Init Encoder");
        program.enqueue(
            ctx,
            &mut encoder,
            KernelId::InitParticles,
            &[&self.particles, &seed_buffer],
            IndexRange::Linear(self.count),
        )?;
        ctx.submit(encoder);

        debug!("Initialized {} particles", self.count);
        Ok(())
    }

    /// Run `updateParticles` `iterations` times with nothing in between.
    pub fn warm_up(
        &self,
        ctx: &ComputeContext,
        program: &KernelProgram,
        iterations: u32,
    ) -> Result<(), GpuError> {
        let mut remaining = iterations;
        while remaining > 0 {
            let batch = remaining.min(WARMUP_BATCH);
            let mut encoder = ctx.encoder("Warm-up Encoder");
            for _ in 0..batch {
                self.advance(ctx, program, &mut encoder)?;
            }
            ctx.submit(encoder);
            remaining -= batch;
        }

        debug!("Warm-up finished after {iterations} iterations");
        Ok(())
    }

    /// Record one `updateParticles` dispatch.
    pub fn advance(
        &self,
        ctx: &ComputeContext,
        program: &KernelProgram,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), GpuError> {
        program.enqueue(
            ctx,
            encoder,
            KernelId::UpdateParticles,
            &[&self.particles],
            IndexRange::Linear(self.count),
        )
    }

    /// Copy the particle records back to the host.
    ///
    /// Diagnostic only; the frame loop never reads particles.
    pub fn read_back(&self, ctx: &ComputeContext) -> Result<Vec<Particle>, GpuError> {
        ctx.read_buffer(&self.particles)
    }
}
