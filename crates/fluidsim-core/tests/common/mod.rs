//! Recording mock of the compute-dispatch environment.

#![allow(dead_code)]

use fluidsim_core::*;

/// A texture identified by a number, with a fixed extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockTexture {
    pub id: u32,
    pub extent: VolumeExtent,
}

impl MockTexture {
    pub fn cube(id: u32, edge: u32) -> Self {
        Self {
            id,
            extent: VolumeExtent::cube(edge).unwrap(),
        }
    }
}

impl VolumeTexture for MockTexture {
    fn extent(&self) -> VolumeExtent {
        self.extent
    }
}

/// A program exposing a fixed list of kernel names.
#[derive(Debug, Clone)]
pub struct MockProgram {
    pub name: &'static str,
    pub kernels: Vec<&'static str>,
}

impl MockProgram {
    pub fn fluid_sim() -> Self {
        Self {
            name: "fluid_sim",
            kernels: vec![KERNEL_INITIAL_STATE, KERNEL_SIMULATE],
        }
    }

    pub fn atlas_copy() -> Self {
        Self {
            name: "texture3d_atlas",
            kernels: vec![KERNEL_COPY_TEXTURE],
        }
    }

    pub fn empty(name: &'static str) -> Self {
        Self {
            name,
            kernels: Vec::new(),
        }
    }

    pub fn kernel_name(&self, kernel: KernelId) -> &'static str {
        self.kernels[kernel.0 as usize]
    }
}

impl ComputeProgram for MockProgram {
    fn find_kernel(&self, name: &str) -> Option<KernelId> {
        self.kernels
            .iter()
            .position(|k| *k == name)
            .map(|i| KernelId(i as u32))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Texture {
        kernel: &'static str,
        param: TextureParam,
        texture: u32,
    },
    Vector {
        program: &'static str,
        param: VectorParam,
        value: Vec4,
    },
    Dispatch {
        kernel: &'static str,
        size: DispatchSize,
    },
}

#[derive(Debug, Default)]
pub struct MockRecorder {
    pub commands: Vec<Command>,
}

impl MockRecorder {
    pub fn dispatches(&self) -> Vec<(&'static str, DispatchSize)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Dispatch { kernel, size } => Some((*kernel, *size)),
                _ => None,
            })
            .collect()
    }

    pub fn dispatch_count(&self, kernel: &str) -> usize {
        self.dispatches().iter().filter(|(k, _)| *k == kernel).count()
    }

    /// Texture ids bound to `param`, in recording order.
    pub fn bound(&self, param: TextureParam) -> Vec<u32> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Texture {
                    param: p, texture, ..
                } if *p == param => Some(*texture),
                _ => None,
            })
            .collect()
    }

    pub fn vectors(&self, param: VectorParam) -> Vec<Vec4> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Vector { param: p, value, .. } if *p == param => Some(*value),
                _ => None,
            })
            .collect()
    }
}

impl CommandRecorder for MockRecorder {
    type Program = MockProgram;
    type Texture = MockTexture;

    fn set_texture_param(
        &mut self,
        program: &MockProgram,
        kernel: KernelId,
        param: TextureParam,
        texture: &MockTexture,
    ) {
        self.commands.push(Command::Texture {
            kernel: program.kernel_name(kernel),
            param,
            texture: texture.id,
        });
    }

    fn set_vector_param(&mut self, program: &MockProgram, param: VectorParam, value: Vec4) {
        self.commands.push(Command::Vector {
            program: program.name,
            param,
            value,
        });
    }

    fn dispatch(&mut self, program: &MockProgram, kernel: KernelId, size: DispatchSize) {
        self.commands.push(Command::Dispatch {
            kernel: program.kernel_name(kernel),
            size,
        });
    }
}

pub type MockManager = FluidSimVolumeManager<MockProgram, MockTexture>;

/// Texture id of the atlas created by [`built_manager`].
pub const ATLAS_ID: u32 = 999;

pub fn built_manager(options: FluidSimOptions) -> MockManager {
    let atlas = MockTexture::cube(ATLAS_ID, options.atlas_resolution);
    let mut manager = FluidSimVolumeManager::new(atlas, options).unwrap();
    manager.build(FluidSimResources {
        fluid_sim_program: MockProgram::fluid_sim(),
        atlas_copy_program: MockProgram::atlas_copy(),
    });
    manager
}

/// A fully provisioned volume: initial state `base`, front `base + 1`, back `base + 2`.
pub fn ready_volume(base: u32, edge: u32) -> VolumeHandle<MockTexture> {
    VolumeHandle::new(
        SimulationVolume::new()
            .with_initial_state(MockTexture::cube(base, edge))
            .with_buffers(
                MockTexture::cube(base + 1, edge),
                MockTexture::cube(base + 2, edge),
            ),
    )
}
