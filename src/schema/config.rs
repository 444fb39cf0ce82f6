//! Configuration types for particle canvas runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Largest particle count a single 1-D dispatch can cover
/// (65535 workgroups of 64 invocations).
pub const MAX_PARTICLES: u32 = 65_535 * 64;

/// Largest supported canvas edge. Keeps the RGBA i32 canvas within the
/// default storage binding limit.
pub const MAX_WINDOW_SIZE: u32 = 2048;

fn default_particles() -> u32 {
    200
}

fn default_window_size() -> u32 {
    480
}

fn default_warmup_iterations() -> u32 {
    1000
}

fn default_dump_dir() -> PathBuf {
    PathBuf::from("dump")
}

fn default_poll_interval_ms() -> u64 {
    10
}

/// Colour palette compiled into the kernel program.
///
/// The palette is a compile-time variant of the program, never switched
/// mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Cool blue-white particles.
    #[default]
    Default,
    /// Fire-like reds and yellows.
    Fire,
}

/// Top-level run configuration.
///
/// Resolved once at startup; nothing here is mutable while rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Number of particles.
    #[serde(default = "default_particles")]
    pub particles: u32,
    /// Palette variant compiled into the kernels.
    pub palette: Palette,
    /// Edge length of the square canvas in pixels.
    #[serde(default = "default_window_size")]
    pub window_size: u32,
    /// Invisible update iterations before the first frame.
    #[serde(default = "default_warmup_iterations")]
    pub warmup_iterations: u32,
    /// Write every rendered frame as `<dump_dir>/<n>.png`.
    pub dump_frames: bool,
    /// Directory for dumped frames.
    #[serde(default = "default_dump_dir")]
    pub dump_dir: PathBuf,
    /// Surface full compiler output when the kernel program fails to build.
    pub diagnostics: bool,
    /// Stop after this many rendered frames (None = until stop signal).
    pub max_frames: Option<u64>,
    /// Stop-signal poll timeout per frame, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Fixed seed for the particle seed array (None = system entropy).
    pub random_seed: Option<u64>,
    /// Accept CPU/software adapters (llvmpipe, WARP).
    pub allow_software_adapter: bool,
    /// Only accept an adapter whose name contains this string.
    pub adapter_name: Option<String>,
    /// Load the WGSL kernel program from this file instead of the embedded one.
    pub kernel_source: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            particles: default_particles(),
            palette: Palette::Default,
            window_size: default_window_size(),
            warmup_iterations: default_warmup_iterations(),
            dump_frames: false,
            dump_dir: default_dump_dir(),
            diagnostics: false,
            max_frames: None,
            poll_interval_ms: default_poll_interval_ms(),
            random_seed: None,
            allow_software_adapter: false,
            adapter_name: None,
            kernel_source: None,
        }
    }
}

impl RenderConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particles == 0 {
            return Err(ConfigError::NoParticles);
        }
        if self.particles > MAX_PARTICLES {
            return Err(ConfigError::TooManyParticles {
                requested: self.particles,
                max: MAX_PARTICLES,
            });
        }
        if self.window_size == 0 || self.window_size > MAX_WINDOW_SIZE {
            return Err(ConfigError::InvalidWindowSize {
                size: self.window_size,
                max: MAX_WINDOW_SIZE,
            });
        }
        if self.max_frames == Some(0) {
            return Err(ConfigError::EmptyFrameBudget);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Particle count must be non-zero")]
    NoParticles,
    #[error("Particle count {requested} exceeds the dispatch limit of {max}")]
    TooManyParticles { requested: u32, max: u32 },
    #[error("Window size {size} must be in 1..={max}")]
    InvalidWindowSize { size: u32, max: u32 },
    #[error("Frame budget must be at least one frame")]
    EmptyFrameBudget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.particles, 200);
        assert_eq!(config.window_size, 480);
        assert_eq!(config.warmup_iterations, 1000);
    }

    #[test]
    fn test_zero_particles_rejected() {
        let config = RenderConfig {
            particles: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoParticles)));
    }

    #[test]
    fn test_particle_limit() {
        let config = RenderConfig {
            particles: MAX_PARTICLES + 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyParticles { .. })
        ));
    }

    #[test]
    fn test_window_size_bounds() {
        for size in [0, MAX_WINDOW_SIZE + 1] {
            let config = RenderConfig {
                window_size: size,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidWindowSize { .. })
            ));
        }
    }

    #[test]
    fn test_zero_frame_budget_rejected() {
        let config = RenderConfig {
            max_frames: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyFrameBudget)
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{ "particles": 5000, "palette": "fire" }"#).unwrap();

        assert_eq!(config.particles, 5000);
        assert_eq!(config.palette, Palette::Fire);
        assert_eq!(config.window_size, 480);
        assert_eq!(config.dump_dir, PathBuf::from("dump"));
        assert_eq!(config.poll_interval_ms, 10);
        assert!(config.max_frames.is_none());
    }
}
