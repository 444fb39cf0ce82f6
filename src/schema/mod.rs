//! Schema module - Configuration types for particle canvas runs.

mod config;

pub use config::*;
