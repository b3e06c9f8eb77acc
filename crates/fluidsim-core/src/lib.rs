//! Core abstractions for fluidsim-rs.
//!
//! This crate holds the backend-agnostic fluid simulation volume manager:
//! - [`VolumeRegistry`] of caller-owned [`SimulationVolume`]s
//! - ping-pong stepping through the [`CommandRecorder`] trait
//! - atlas layout and compositing into a shared [`VolumeAtlas`]
//! - [`FluidSimOptions`] configuration and [`FluidSimError`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod atlas;
pub mod compute;
pub mod error;
pub mod manager;
pub mod options;
pub mod readiness;
pub mod registry;
pub mod volume;

pub use atlas::{AtlasLayout, AtlasRegion, VolumeAtlas};
pub use compute::{
    group_count, CommandRecorder, ComputeProgram, DispatchSize, KernelId, TextureParam,
    VectorParam, VolumeTexture, KERNEL_COPY_TEXTURE, KERNEL_INITIAL_STATE, KERNEL_SIMULATE,
    TILE_SIZE,
};
pub use error::{FluidSimError, Result};
pub use manager::{FluidSimResources, FluidSimVolumeManager};
pub use options::{
    AtlasRefreshPolicy, FluidSimOptions, DEFAULT_ATLAS_RESOLUTION, DEFAULT_VOLUME_RESOLUTION,
};
pub use readiness::{
    CopyOutcome, CopyReport, NotReadyReason, SimulationReport, StepOutcome, VolumeReadiness,
};
pub use registry::VolumeRegistry;
pub use volume::{SimulationVolume, VolumeExtent, VolumeHandle};

// Re-export glam types for convenience
pub use glam::{UVec3, Vec4};
