//! Host-side canvas: RGBA i32 accumulators and 8-bit conversion.
//!
//! `Canvas` is what a GPU readback produces. It also carries host
//! implementations of the canvas kernels, which the tests use as the
//! reference for the GPU pipeline.
//!
//! Data is stored as a flat array indexed `[(y * size + x) * 4 + channel]`.

use rayon::prelude::*;

use super::{EMITTER_POSITION, Particle};

/// Accumulator channels per cell (RGBA).
pub const CHANNELS: usize = 4;

/// Largest value any accumulator holds after `saturate`.
pub const SATURATION_LIMIT: i32 = 255;

/// Half-width of the emitter marker square in pixels.
pub const EMITTER_RADIUS: i32 = 2;

/// RGBA value written by the emitter overlay.
pub const EMITTER_COLOR: [i32; 4] = [255, 255, 255, 255];

/// Map a position in the logical domain to a canvas cell.
///
/// Returns `None` for positions outside `[0, size)` on either axis.
#[inline]
pub fn cell_of(position: [f32; 2], size: u32) -> Option<(usize, usize)> {
    let x = (position[0] * size as f32).floor();
    let y = (position[1] * size as f32).floor();
    let limit = size as f32;
    if x >= 0.0 && y >= 0.0 && x < limit && y < limit {
        Some((x as usize, y as usize))
    } else {
        None
    }
}

/// Canvas cell the emitter marker is centred on.
pub fn emitter_cell(size: u32) -> (i32, i32) {
    (
        (EMITTER_POSITION[0] * size as f32) as i32,
        (EMITTER_POSITION[1] * size as f32) as i32,
    )
}

/// Square RGBA accumulator raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    size: u32,
    data: Vec<i32>,
}

impl Canvas {
    /// Zeroed canvas of `size x size` cells.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            data: vec![0; size as usize * size as usize * CHANNELS],
        }
    }

    /// Wrap raw accumulator data, e.g. from a readback.
    ///
    /// Returns `None` if `data` does not hold exactly `size * size * 4` values.
    pub fn from_raw(size: u32, data: Vec<i32>) -> Option<Self> {
        (data.len() == size as usize * size as usize * CHANNELS).then_some(Self { size, data })
    }

    /// Edge length in cells.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Raw accumulators.
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        (y * self.size as usize + x) * CHANNELS
    }

    /// RGBA accumulators of one cell.
    pub fn cell(&self, x: usize, y: usize) -> [i32; 4] {
        let o = self.offset(x, y);
        [
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ]
    }

    /// Overwrite one cell.
    pub fn set_cell(&mut self, x: usize, y: usize, value: [i32; 4]) {
        let o = self.offset(x, y);
        self.data[o..o + CHANNELS].copy_from_slice(&value);
    }

    /// Sum of one channel over all cells.
    pub fn channel_sum(&self, channel: usize) -> i64 {
        self.data
            .par_chunks_exact(CHANNELS)
            .map(|cell| cell[channel] as i64)
            .sum()
    }

    /// Number of cells with any non-zero colour channel.
    pub fn lit_cells(&self) -> usize {
        self.data
            .par_chunks_exact(CHANNELS)
            .filter(|cell| cell[..3].iter().any(|&v| v != 0))
            .count()
    }

    /// Zero every accumulator (`clearCanvas`).
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Accumulate particle colours (`drawParticles`).
    ///
    /// Each in-bounds particle adds its RGB colour and one alpha count to its
    /// cell. Returns the number of particles that landed on the canvas.
    pub fn draw_particles(&mut self, particles: &[Particle]) -> usize {
        let mut inside = 0;
        for particle in particles {
            if let Some((x, y)) = cell_of(particle.position, self.size) {
                let o = self.offset(x, y);
                let [r, g, b] = particle.rgb();
                self.data[o] += r;
                self.data[o + 1] += g;
                self.data[o + 2] += b;
                self.data[o + 3] += 1;
                inside += 1;
            }
        }
        inside
    }

    /// Clamp every accumulator to `SATURATION_LIMIT` (`saturate`).
    pub fn saturate(&mut self) {
        self.data
            .par_iter_mut()
            .for_each(|v| *v = (*v).min(SATURATION_LIMIT));
    }

    /// Stamp the emitter marker (`drawEmitter`).
    pub fn draw_emitter(&mut self) {
        let (cx, cy) = emitter_cell(self.size);
        let size = self.size as i32;
        for dy in -EMITTER_RADIUS..=EMITTER_RADIUS {
            for dx in -EMITTER_RADIUS..=EMITTER_RADIUS {
                let (x, y) = (cx + dx, cy + dy);
                if x >= 0 && y >= 0 && x < size && y < size {
                    self.set_cell(x as usize, y as usize, EMITTER_COLOR);
                }
            }
        }
    }

    /// Composite one frame from scratch, mirroring the GPU pipeline order.
    pub fn composite(&mut self, particles: &[Particle]) -> usize {
        self.clear();
        let inside = self.draw_particles(particles);
        self.saturate();
        self.draw_emitter();
        inside
    }

    /// Drop alpha and narrow each colour accumulator to 8 bits.
    pub fn to_rgb8(&self) -> RgbFrame {
        let pixels = self
            .data
            .par_chunks_exact(CHANNELS)
            .flat_map_iter(|cell| cell[..3].iter().map(|&v| v.clamp(0, 255) as u8))
            .collect();
        RgbFrame {
            size: self.size,
            pixels,
        }
    }
}

/// 8-bit RGB raster handed to display and dump sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    /// Edge length in pixels.
    pub size: u32,
    /// Row-major RGB bytes.
    pub pixels: Vec<u8>,
}

impl RgbFrame {
    /// RGB bytes of one pixel.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let o = (y * self.size as usize + x) * 3;
        [self.pixels[o], self.pixels[o + 1], self.pixels[o + 2]]
    }

    /// Number of pixels that are not black.
    pub fn lit_pixels(&self) -> usize {
        self.pixels
            .chunks_exact(3)
            .filter(|px| px.iter().any(|&v| v != 0))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn particle_at(x: f32, y: f32, color: u32) -> Particle {
        Particle {
            position: [x, y],
            color,
            ..Default::default()
        }
    }

    #[test]
    fn test_cell_of_bounds() {
        assert_eq!(cell_of([0.0, 0.0], 480), Some((0, 0)));
        assert_eq!(cell_of([0.5, 0.8], 480), Some((240, 384)));
        assert_eq!(cell_of([0.9999, 0.9999], 480), Some((479, 479)));
        assert_eq!(cell_of([1.0, 0.5], 480), None);
        assert_eq!(cell_of([0.5, -0.0001], 480), None);
        assert_eq!(cell_of([-3.0, 7.0], 480), None);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut canvas = Canvas::new(16);
        canvas.draw_particles(&[particle_at(0.5, 0.5, 0x00FF_FFFF)]);
        canvas.clear();
        let once = canvas.clone();
        canvas.clear();
        assert_eq!(canvas, once);
        assert!(canvas.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_overlapping_particles_accumulate() {
        let mut canvas = Canvas::new(8);
        let color = Particle::pack_rgb(10, 20, 30);
        let particles = vec![particle_at(0.3, 0.3, color); 5];

        assert_eq!(canvas.draw_particles(&particles), 5);
        assert_eq!(canvas.cell(2, 2), [50, 100, 150, 5]);
    }

    #[test]
    fn test_out_of_bounds_particles_are_clipped() {
        let mut canvas = Canvas::new(8);
        let particles = [
            particle_at(-0.1, 0.5, 0x0000_00FF),
            particle_at(0.5, 1.2, 0x0000_00FF),
            particle_at(0.5, 0.5, 0x0000_00FF),
        ];
        assert_eq!(canvas.draw_particles(&particles), 1);
        assert_eq!(canvas.channel_sum(3), 1);
    }

    #[test]
    fn test_emitter_survives_saturation() {
        let mut canvas = Canvas::new(480);
        let (cx, cy) = emitter_cell(480);
        canvas.composite(&[]);

        assert_eq!(canvas.cell(cx as usize, cy as usize), EMITTER_COLOR);
        let side = (2 * EMITTER_RADIUS + 1) as usize;
        assert_eq!(canvas.lit_cells(), side * side);
    }

    #[test]
    fn test_emitter_clipped_at_edge() {
        // 2x2 canvas: the marker covers every cell without indexing outside.
        let mut canvas = Canvas::new(2);
        canvas.draw_emitter();
        assert_eq!(canvas.lit_cells(), 4);
    }

    #[test]
    fn test_rgb8_drops_alpha() {
        let mut canvas = Canvas::new(4);
        canvas.set_cell(1, 2, [200, 17, 255, 9]);
        let frame = canvas.to_rgb8();

        assert_eq!(frame.size, 4);
        assert_eq!(frame.pixels.len(), 4 * 4 * 3);
        assert_eq!(frame.pixel(1, 2), [200, 17, 255]);
        assert_eq!(frame.pixel(0, 0), [0, 0, 0]);
        assert_eq!(frame.lit_pixels(), 1);
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(Canvas::from_raw(4, vec![0; 64]).is_some());
        assert!(Canvas::from_raw(4, vec![0; 63]).is_none());
    }

    fn arb_particle() -> impl Strategy<Value = Particle> {
        (-0.5f32..1.5, -0.5f32..1.5, 0u8..=255, 0u8..=255, 0u8..=255).prop_map(
            |(x, y, r, g, b)| particle_at(x, y, Particle::pack_rgb(r, g, b)),
        )
    }

    proptest! {
        #[test]
        fn alpha_counts_in_bounds_particles(
            mut particles in prop::collection::vec(arb_particle(), 0..400),
        ) {
            let expected = particles
                .iter()
                .filter(|p| cell_of(p.position, 32).is_some())
                .count();

            let mut forward = Canvas::new(32);
            prop_assert_eq!(forward.draw_particles(&particles), expected);
            prop_assert_eq!(forward.channel_sum(3), expected as i64);

            // Accumulation does not depend on draw order.
            particles.reverse();
            let mut reversed = Canvas::new(32);
            reversed.draw_particles(&particles);
            prop_assert_eq!(forward, reversed);
        }

        #[test]
        fn saturate_clamps_only_at_threshold(values in prop::collection::vec(0i32..2000, 64)) {
            let mut canvas = Canvas::from_raw(4, values.clone()).unwrap();
            canvas.saturate();
            for (&before, &after) in values.iter().zip(canvas.as_slice()) {
                if before >= SATURATION_LIMIT {
                    prop_assert_eq!(after, SATURATION_LIMIT);
                } else {
                    prop_assert_eq!(after, before);
                }
            }
        }
    }
}
