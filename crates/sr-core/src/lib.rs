//! Core types and utilities for DIV2K single-image super-resolution.
//!
//! This crate provides:
//! - The shared error type
//! - Domain types (scale, subset, degradation, architecture)
//! - Training configuration, presets and session settings
//! - Logging setup for the binaries

pub mod cli;
pub mod config;
pub mod error;
pub mod profile;
pub mod session;
pub mod types;

pub use config::{DatasetConfig, LoaderConfig, ModelConfig, OutputConfig, TrainConfig, TrainingParams};
pub use error::{Error, Result};
pub use profile::Profile;
pub use session::SessionConfig;
pub use types::{Architecture, Downgrade, ImageIdRange, OptimizerKind, Scale, Subset};

/// Mean RGB value of the DIV2K training images on a 0-255 scale.
pub const DIV2K_RGB_MEAN: [f32; 3] = [0.4488 * 255.0, 0.4371 * 255.0, 0.4040 * 255.0];
