//! Error types for fluidsim-rs.

use glam::UVec3;
use thiserror::Error;

/// The main error type for fluidsim-core operations.
///
/// Per-volume resource gaps (a missing texture or kernel) are not errors; they
/// are reported as [`crate::NotReadyReason`] values instead.
#[derive(Error, Debug)]
pub enum FluidSimError {
    /// `build` has not been called with compute programs yet.
    #[error("fluid sim volume manager not built - call build() with pipeline resources first")]
    NotBuilt,

    /// A volume extent had a zero-sized axis.
    #[error("invalid volume extent {width}x{height}x{depth}: every axis must be > 0")]
    InvalidExtent { width: u32, height: u32, depth: u32 },

    /// A volume does not fit inside the atlas along at least one axis.
    #[error("volume of size {size} does not fit in atlas of size {atlas}")]
    VolumeTooLarge { size: UVec3, atlas: UVec3 },

    /// The atlas has no room left for another volume.
    #[error("volume atlas is full: cannot place volume of size {size}")]
    AtlasFull { size: UVec3 },

    /// The atlas texture does not have the size the options ask for.
    #[error("atlas texture is {extent} but atlas_resolution is {resolution}")]
    AtlasSizeMismatch {
        extent: crate::VolumeExtent,
        resolution: u32,
    },

    /// An option value is out of range.
    #[error("invalid option '{name}': {reason}")]
    InvalidOption { name: &'static str, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for fluidsim-core operations.
pub type Result<T> = std::result::Result<T, FluidSimError>;
