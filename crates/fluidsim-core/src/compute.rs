//! Seams to the compute-dispatch environment.
//!
//! The manager never talks to a GPU API directly. It records work through a
//! [`CommandRecorder`], looks kernels up on a [`ComputeProgram`], and reads
//! sizes from [`VolumeTexture`]s. A backend (such as the wgpu one in
//! `fluidsim-render`) implements these traits; submission of the recorded
//! commands stays with the caller.

use glam::Vec4;

use crate::volume::VolumeExtent;

/// Thread-group edge length the shipped kernels are compiled with.
pub const TILE_SIZE: u32 = 4;

/// Kernel that seeds a volume's output buffer from its initial state.
pub const KERNEL_INITIAL_STATE: &str = "InitialState";
/// Kernel that advances a volume by one step.
pub const KERNEL_SIMULATE: &str = "Simulate";
/// Kernel that copies a volume into its atlas region.
pub const KERNEL_COPY_TEXTURE: &str = "CopyTexture";

/// Index of a kernel inside a [`ComputeProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(pub u32);

/// Texture slots a kernel can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureParam {
    /// The volume read by the kernel.
    InputVolumeTexture,
    /// The simulation buffer written by the kernel.
    OutputVolumeTexture,
    /// The shared atlas written by the copy kernel.
    OutputVolumeAtlas,
}

/// Vector uniforms shared by every kernel of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorParam {
    /// Volume resolution in texels (`w, h, d, 0`).
    FluidSimVolumeRes,
    /// Texel offset of the volume's atlas region (`x, y, z, 0`).
    AtlasOffset,
}

/// Thread-group counts for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchSize {
    /// Group counts covering `extent` with cubic tiles of edge `tile_size`.
    ///
    /// # Panics
    ///
    /// Panics if `tile_size` is zero.
    pub fn for_extent(extent: VolumeExtent, tile_size: u32) -> Self {
        Self {
            x: group_count(extent.width, tile_size),
            y: group_count(extent.height, tile_size),
            z: group_count(extent.depth, tile_size),
        }
    }

    /// Total number of thread groups.
    pub fn total_groups(&self) -> u64 {
        u64::from(self.x) * u64::from(self.y) * u64::from(self.z)
    }
}

/// Ceiling division of `dimension` by `tile_size`.
///
/// Equivalent to `(dimension + tile_size - 1) / tile_size` without the
/// overflow near `u32::MAX`.
pub fn group_count(dimension: u32, tile_size: u32) -> u32 {
    dimension.div_ceil(tile_size)
}

/// A compiled compute program exposing named kernels.
pub trait ComputeProgram {
    /// Looks up a kernel by entry-point name.
    fn find_kernel(&self, name: &str) -> Option<KernelId>;
}

/// A 3D texture whose size can be queried.
pub trait VolumeTexture {
    /// Texel dimensions of the texture.
    fn extent(&self) -> VolumeExtent;
}

/// Records compute work for deferred submission.
///
/// Parameters set before a [`dispatch`](Self::dispatch) apply to it; calls are
/// executed in recording order.
pub trait CommandRecorder {
    type Program: ComputeProgram;
    type Texture: VolumeTexture;

    /// Binds `texture` to `param` for `kernel`.
    fn set_texture_param(
        &mut self,
        program: &Self::Program,
        kernel: KernelId,
        param: TextureParam,
        texture: &Self::Texture,
    );

    /// Sets a vector uniform for every kernel of `program`.
    fn set_vector_param(&mut self, program: &Self::Program, param: VectorParam, value: Vec4);

    /// Records a dispatch of `kernel` with the given thread-group counts.
    fn dispatch(&mut self, program: &Self::Program, kernel: KernelId, size: DispatchSize);
}
