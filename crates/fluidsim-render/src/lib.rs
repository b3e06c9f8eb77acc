//! wgpu backend for fluidsim-rs.
//!
//! This crate implements the compute seams of `fluidsim-core`:
//! - [`WgpuComputeProgram`]s compiled from WGSL, one pipeline per kernel
//! - [`WgpuCommandRecorder`] recording dispatches into a `wgpu::CommandEncoder`
//! - [`GpuVolumeTexture`] 3D textures for volumes, buffers, and the atlas
//! - [`GpuContext`] for headless device creation

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
// Texel counts are bounded by wgpu texture limits
#![allow(clippy::cast_possible_truncation)]

pub mod context;
pub mod error;
pub mod program;
pub mod readback;
pub mod recorder;
pub mod texture;

pub use context::GpuContext;
pub use error::{RenderError, RenderResult};
pub use program::{
    create_atlas_copy_program, create_fluid_sim_program, create_fluid_sim_resources,
    ComputeParams, ComputeProgramBuilder, WgpuComputeProgram,
};
pub use readback::read_volume;
pub use recorder::WgpuCommandRecorder;
pub use texture::{GpuVolumeTexture, SimulationBuffers, VOLUME_TEXTURE_FORMAT};

/// The fluid simulation volume manager specialised for this backend.
pub type GpuFluidSimVolumeManager =
    fluidsim_core::FluidSimVolumeManager<WgpuComputeProgram, GpuVolumeTexture>;

/// Creates a built manager with a freshly allocated atlas.
pub fn create_manager(
    device: &wgpu::Device,
    options: fluidsim_core::FluidSimOptions,
) -> RenderResult<GpuFluidSimVolumeManager> {
    let atlas = GpuVolumeTexture::create_atlas(device, options.atlas_resolution)?;
    let mut manager = fluidsim_core::FluidSimVolumeManager::new(atlas, options)?;
    manager.build(create_fluid_sim_resources(device)?);
    Ok(manager)
}
