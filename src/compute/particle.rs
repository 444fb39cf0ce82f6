//! Particle record layout and the host-generated seed array.
//!
//! The host never inspects particle fields while rendering; the layout only
//! has to agree byte for byte with `struct Particle` in `particles.wgsl`.

use rand::prelude::*;

/// Emitter position in the logical `[0, 1) x [0, 1)` domain (y points down).
pub const EMITTER_POSITION: [f32; 2] = [0.5, 0.8];

/// Mean launch velocity in domain units per update (upwards).
pub const BASE_VELOCITY: [f32; 2] = [0.0, -0.004];

/// Launch velocity spread; a seed pair in `[-0.5, 0.5)` is scaled by this.
pub const VELOCITY_SPREAD: [f32; 2] = [0.006, 0.004];

/// Random velocity jitter added per update.
pub const VELOCITY_JITTER: f32 = 0.0004;

/// Constant acceleration per update (negative y rises).
pub const BUOYANCY: [f32; 2] = [0.0, -0.00002];

/// Velocity damping factor per update.
pub const DRAG: f32 = 0.995;

/// Lifetime range in updates: `[MIN_LIFETIME, MIN_LIFETIME + LIFETIME_RANGE)`.
pub const MIN_LIFETIME: f32 = 120.0;
pub const LIFETIME_RANGE: f32 = 180.0;

/// A single particle as stored on the device.
///
/// Fields are public for diagnostic readback only.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
    /// Position in the logical domain.
    pub position: [f32; 2],
    /// Velocity in domain units per update.
    pub velocity: [f32; 2],
    /// Colour packed as `0x00BBGGRR`.
    pub color: u32,
    /// Updates since the last (re)spawn.
    pub age: f32,
    /// Per-particle PCG state.
    pub rng_state: u32,
    /// Age at which the particle respawns.
    pub lifetime: f32,
}

impl Particle {
    /// Size of one record in bytes.
    pub const SIZE: usize = std::mem::size_of::<Particle>();

    /// Unpacked RGB colour channels.
    #[inline]
    pub fn rgb(&self) -> [i32; 3] {
        [
            (self.color & 0xFF) as i32,
            ((self.color >> 8) & 0xFF) as i32,
            ((self.color >> 16) & 0xFF) as i32,
        ]
    }

    /// Pack RGB channels into the device colour format.
    #[inline]
    pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
        r as u32 | (g as u32) << 8 | (b as u32) << 16
    }
}

/// Per-particle random seed pairs, uniform in `[-0.5, 0.5)`.
///
/// Drawn once per run and consumed by `initParticles`.
#[derive(Debug, Clone)]
pub struct SeedArray {
    values: Vec<f32>,
}

impl SeedArray {
    /// Draw `2 * particles` values from system entropy.
    pub fn from_entropy(particles: u32) -> Self {
        Self::generate(particles, &mut StdRng::from_entropy())
    }

    /// Draw `2 * particles` values from a fixed seed.
    pub fn from_seed(particles: u32, seed: u64) -> Self {
        Self::generate(particles, &mut StdRng::seed_from_u64(seed))
    }

    /// Draw from entropy unless a fixed seed is given.
    pub fn new(particles: u32, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(particles, seed),
            None => Self::from_entropy(particles),
        }
    }

    fn generate<R: Rng>(particles: u32, rng: &mut R) -> Self {
        let values = (0..2 * particles as usize)
            .map(|_| rng.r#gen::<f32>() - 0.5)
            .collect();
        Self { values }
    }

    /// Number of particles covered (one pair each).
    pub fn particles(&self) -> usize {
        self.values.len() / 2
    }

    /// Flat `[x0, y0, x1, y1, ...]` values.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Seed pair for one particle.
    pub fn pair(&self, index: usize) -> [f32; 2] {
        [self.values[2 * index], self.values[2 * index + 1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_particle_layout() {
        assert_eq!(Particle::SIZE, 32);
        assert_eq!(std::mem::align_of::<Particle>(), 4);
    }

    #[test]
    fn test_pack_unpack_rgb() {
        let particle = Particle {
            color: Particle::pack_rgb(255, 128, 7),
            ..Default::default()
        };
        assert_eq!(particle.rgb(), [255, 128, 7]);
    }

    #[test]
    fn test_seed_array_length() {
        let seeds = SeedArray::from_seed(200, 1);
        assert_eq!(seeds.as_slice().len(), 400);
        assert_eq!(seeds.particles(), 200);
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let a = SeedArray::from_seed(64, 42);
        let b = SeedArray::from_seed(64, 42);
        let c = SeedArray::from_seed(64, 43);
        assert_eq!(a.as_slice(), b.as_slice());
        assert_ne!(a.as_slice(), c.as_slice());
    }

    #[test]
    fn test_entropy_seeds_differ_between_runs() {
        let a = SeedArray::from_entropy(256);
        let b = SeedArray::from_entropy(256);
        assert_ne!(a.as_slice(), b.as_slice());
    }

    proptest! {
        #[test]
        fn seeds_stay_in_half_open_range(particles in 1u32..2048, seed in any::<u64>()) {
            let seeds = SeedArray::from_seed(particles, seed);
            prop_assert_eq!(seeds.as_slice().len(), 2 * particles as usize);
            for &v in seeds.as_slice() {
                prop_assert!((-0.5..0.5).contains(&v), "seed {} out of range", v);
            }
        }
    }
}
