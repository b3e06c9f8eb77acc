//! Command recording into a `wgpu::CommandEncoder`.

use std::collections::HashMap;

use fluidsim_core::{CommandRecorder, DispatchSize, KernelId, TextureParam, VectorParam};
use glam::Vec4;
use wgpu::util::DeviceExt;

use crate::program::{
    texture_binding, ComputeParams, WgpuComputeProgram, INPUT_BINDING, OUTPUT_BINDING,
    PARAMS_BINDING,
};
use crate::texture::GpuVolumeTexture;

/// Records fluid simulation dispatches into an encoder owned by the caller.
///
/// Bindings and vectors are remembered per program, and every dispatch
/// becomes its own compute pass, so wgpu orders a `Simulate` write before the
/// `CopyTexture` read of the same buffer.
pub struct WgpuCommandRecorder<'a> {
    device: &'a wgpu::Device,
    encoder: &'a mut wgpu::CommandEncoder,
    textures: HashMap<(u64, u32), wgpu::TextureView>,
    vectors: HashMap<(u64, VectorParam), Vec4>,
    dispatches: u32,
}

impl<'a> WgpuCommandRecorder<'a> {
    pub fn new(device: &'a wgpu::Device, encoder: &'a mut wgpu::CommandEncoder) -> Self {
        Self {
            device,
            encoder,
            textures: HashMap::new(),
            vectors: HashMap::new(),
            dispatches: 0,
        }
    }

    /// Number of dispatches recorded so far.
    pub fn dispatch_count(&self) -> u32 {
        self.dispatches
    }

    fn params(&self, program: &WgpuComputeProgram) -> ComputeParams {
        let vector = |param| {
            self.vectors
                .get(&(program.id(), param))
                .copied()
                .unwrap_or(Vec4::ZERO)
                .to_array()
        };
        ComputeParams {
            volume_res: vector(VectorParam::FluidSimVolumeRes),
            atlas_offset: vector(VectorParam::AtlasOffset),
        }
    }
}

impl CommandRecorder for WgpuCommandRecorder<'_> {
    type Program = WgpuComputeProgram;
    type Texture = GpuVolumeTexture;

    fn set_texture_param(
        &mut self,
        program: &WgpuComputeProgram,
        _kernel: KernelId,
        param: TextureParam,
        texture: &GpuVolumeTexture,
    ) {
        self.textures
            .insert((program.id(), texture_binding(param)), texture.view().clone());
    }

    fn set_vector_param(&mut self, program: &WgpuComputeProgram, param: VectorParam, value: Vec4) {
        self.vectors.insert((program.id(), param), value);
    }

    fn dispatch(&mut self, program: &WgpuComputeProgram, kernel: KernelId, size: DispatchSize) {
        let Some(pipeline) = program.pipeline(kernel) else {
            log::warn!("{}: no pipeline for kernel {kernel:?}", program.label());
            return;
        };
        let (Some(input), Some(output)) = (
            self.textures.get(&(program.id(), INPUT_BINDING)),
            self.textures.get(&(program.id(), OUTPUT_BINDING)),
        ) else {
            log::warn!(
                "{}: dispatch of {:?} without input and output textures",
                program.label(),
                program.kernel_name(kernel)
            );
            return;
        };

        let params = self.params(program);
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("fluid sim compute params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.label()),
            layout: program.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: INPUT_BINDING,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: OUTPUT_BINDING,
                    resource: wgpu::BindingResource::TextureView(output),
                },
                wgpu::BindGroupEntry {
                    binding: PARAMS_BINDING,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        {
            let mut compute_pass = self
                .encoder
                .begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(program.label()),
                    timestamp_writes: None,
                });
            compute_pass.set_pipeline(pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(size.x, size.y, size.z);
        }

        self.dispatches += 1;
    }
}
