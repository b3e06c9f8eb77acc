//! Compute program management.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use fluidsim_core::{
    ComputeProgram, FluidSimResources, KernelId, TextureParam, KERNEL_COPY_TEXTURE,
    KERNEL_INITIAL_STATE, KERNEL_SIMULATE,
};

use crate::error::{RenderError, RenderResult};
use crate::texture::VOLUME_TEXTURE_FORMAT;

/// Binding of the sampled input volume.
pub const INPUT_BINDING: u32 = 0;
/// Binding of the written storage volume (simulation buffer or atlas).
pub const OUTPUT_BINDING: u32 = 1;
/// Binding of the [`ComputeParams`] uniform.
pub const PARAMS_BINDING: u32 = 2;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Vector parameters shared by every kernel.
/// Layout must match WGSL `Params` exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ComputeParams {
    /// Volume resolution in texels (xyz).
    pub volume_res: [f32; 4],
    /// Atlas offset of the volume being copied (xyz).
    pub atlas_offset: [f32; 4],
}

/// Maps a texture parameter to its binding slot.
pub fn texture_binding(param: TextureParam) -> u32 {
    match param {
        TextureParam::InputVolumeTexture => INPUT_BINDING,
        TextureParam::OutputVolumeTexture | TextureParam::OutputVolumeAtlas => OUTPUT_BINDING,
    }
}

/// A WGSL module compiled into one compute pipeline per kernel.
///
/// Every kernel shares the same bind group layout: a 3D input texture, a
/// 3D write-only storage texture, and a [`ComputeParams`] uniform.
pub struct WgpuComputeProgram {
    id: u64,
    label: String,
    kernels: Vec<(String, wgpu::ComputePipeline)>,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl WgpuComputeProgram {
    /// Unique id, used to scope recorder bindings per program.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pipeline(&self, kernel: KernelId) -> Option<&wgpu::ComputePipeline> {
        self.kernels
            .get(kernel.0 as usize)
            .map(|(_, pipeline)| pipeline)
    }

    pub fn kernel_name(&self, kernel: KernelId) -> Option<&str> {
        self.kernels.get(kernel.0 as usize).map(|(name, _)| name.as_str())
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }
}

impl ComputeProgram for WgpuComputeProgram {
    fn find_kernel(&self, name: &str) -> Option<KernelId> {
        self.kernels
            .iter()
            .position(|(kernel, _)| kernel == name)
            .and_then(|index| u32::try_from(index).ok())
            .map(KernelId)
    }
}

/// Builder for creating compute programs.
pub struct ComputeProgramBuilder {
    source: Option<String>,
    kernels: Vec<String>,
    label: Option<String>,
}

impl ComputeProgramBuilder {
    /// Creates a new compute program builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            kernels: Vec::new(),
            label: None,
        }
    }

    /// Sets the compute shader source (WGSL).
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a kernel entry point.
    #[must_use]
    pub fn with_kernel(mut self, entry: impl Into<String>) -> Self {
        self.kernels.push(entry.into());
        self
    }

    /// Sets the program label for debugging.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Compiles the module and creates a pipeline per kernel.
    pub fn build(self, device: &wgpu::Device) -> RenderResult<WgpuComputeProgram> {
        let source = self.source.ok_or_else(|| {
            RenderError::ShaderCompilationFailed("missing compute shader source".into())
        })?;
        if self.kernels.is_empty() {
            return Err(RenderError::PipelineCreationFailed(
                "no kernels declared".into(),
            ));
        }
        let label = self.label.unwrap_or_else(|| "compute program".to_string());

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = create_volume_bind_group_layout(device, &label);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let kernels = self
            .kernels
            .into_iter()
            .map(|name| {
                let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&format!("{label} {name}")),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point: Some(&name),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    cache: None,
                });
                (name, pipeline)
            })
            .collect();

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::PipelineCreationFailed(format!(
                "{label}: {error}"
            )));
        }

        log::debug!("compiled compute program '{label}'");

        Ok(WgpuComputeProgram {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            label,
            kernels,
            bind_group_layout,
        })
    }
}

impl Default for ComputeProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn create_volume_bind_group_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{label} Bind Group Layout")),
        entries: &[
            // Input volume
            wgpu::BindGroupLayoutEntry {
                binding: INPUT_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D3,
                    multisampled: false,
                },
                count: None,
            },
            // Output volume or atlas
            wgpu::BindGroupLayoutEntry {
                binding: OUTPUT_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: VOLUME_TEXTURE_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D3,
                },
                count: None,
            },
            // Params
            wgpu::BindGroupLayoutEntry {
                binding: PARAMS_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<ComputeParams>() as u64),
                },
                count: None,
            },
        ],
    })
}

/// Compiles the program holding the `InitialState` and `Simulate` kernels.
pub fn create_fluid_sim_program(device: &wgpu::Device) -> RenderResult<WgpuComputeProgram> {
    ComputeProgramBuilder::new()
        .with_label("Fluid Sim Volume")
        .with_source(include_str!("shaders/fluid_sim.wgsl"))
        .with_kernel(KERNEL_INITIAL_STATE)
        .with_kernel(KERNEL_SIMULATE)
        .build(device)
}

/// Compiles the program holding the `CopyTexture` kernel.
pub fn create_atlas_copy_program(device: &wgpu::Device) -> RenderResult<WgpuComputeProgram> {
    ComputeProgramBuilder::new()
        .with_label("Texture3D Atlas")
        .with_source(include_str!("shaders/texture3d_atlas.wgsl"))
        .with_kernel(KERNEL_COPY_TEXTURE)
        .build(device)
}

/// Both programs, ready for [`fluidsim_core::FluidSimVolumeManager::build`].
pub fn create_fluid_sim_resources(
    device: &wgpu::Device,
) -> RenderResult<FluidSimResources<WgpuComputeProgram>> {
    Ok(FluidSimResources {
        fluid_sim_program: create_fluid_sim_program(device)?,
        atlas_copy_program: create_atlas_copy_program(device)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<ComputeParams>(), 32);
    }

    #[test]
    fn test_texture_bindings() {
        assert_eq!(texture_binding(TextureParam::InputVolumeTexture), 0);
        assert_eq!(texture_binding(TextureParam::OutputVolumeTexture), 1);
        assert_eq!(texture_binding(TextureParam::OutputVolumeAtlas), 1);
    }
}
