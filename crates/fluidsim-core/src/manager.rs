//! The fluid simulation volume manager.
//!
//! One manager owns the volume registry and the atlas. Construct it once at
//! render-pipeline startup, call [`FluidSimVolumeManager::build`] with the
//! compute programs, and pass it to whatever drives the frame. Per frame the
//! caller records [`simulate_volume`](FluidSimVolumeManager::simulate_volume)
//! and then [`copy_texture_to_atlas`](FluidSimVolumeManager::copy_texture_to_atlas)
//! into the same recorder, and submits it.

use glam::{UVec3, Vec4};

use crate::atlas::{AtlasLayout, AtlasPlacement, AtlasRegion, VolumeAtlas};
use crate::compute::{
    CommandRecorder, ComputeProgram, DispatchSize, KernelId, TextureParam, VectorParam,
    VolumeTexture, KERNEL_COPY_TEXTURE, KERNEL_INITIAL_STATE, KERNEL_SIMULATE,
};
use crate::error::{FluidSimError, Result};
use crate::options::{AtlasRefreshPolicy, FluidSimOptions};
use crate::readiness::{CopyOutcome, CopyReport, NotReadyReason, SimulationReport, StepOutcome};
use crate::registry::VolumeRegistry;
use crate::volume::{SimulationVolume, VolumeHandle};

/// Compute programs the manager dispatches from.
pub struct FluidSimResources<P> {
    /// Program exposing the `InitialState` and `Simulate` kernels.
    pub fluid_sim_program: P,
    /// Program exposing the `CopyTexture` kernel.
    pub atlas_copy_program: P,
}

/// Registry, stepper, and atlas compositor for fluid simulation volumes.
pub struct FluidSimVolumeManager<P, T> {
    options: FluidSimOptions,
    resources: Option<FluidSimResources<P>>,
    registry: VolumeRegistry<T>,
    atlas: VolumeAtlas<T>,
}

impl<P: ComputeProgram, T: VolumeTexture> FluidSimVolumeManager<P, T> {
    /// Creates a manager around an already allocated atlas texture.
    ///
    /// The texture must be a cube of `options.atlas_resolution` texels.
    pub fn new(atlas_texture: T, options: FluidSimOptions) -> Result<Self> {
        options.validate()?;
        let extent = atlas_texture.extent();
        if extent.as_uvec3() != UVec3::splat(options.atlas_resolution) {
            return Err(FluidSimError::AtlasSizeMismatch {
                extent,
                resolution: options.atlas_resolution,
            });
        }
        Ok(Self {
            options,
            resources: None,
            registry: VolumeRegistry::new(),
            atlas: VolumeAtlas::new(atlas_texture),
        })
    }

    /// Supplies the compute programs. Calling it again replaces them.
    pub fn build(&mut self, resources: FluidSimResources<P>) {
        if self.resources.is_some() {
            log::info!("fluid sim volume manager: replacing compute programs");
        } else {
            log::info!("fluid sim volume manager: built");
        }
        self.resources = Some(resources);
    }

    pub fn is_built(&self) -> bool {
        self.resources.is_some()
    }

    pub fn options(&self) -> &FluidSimOptions {
        &self.options
    }

    pub fn registry(&self) -> &VolumeRegistry<T> {
        &self.registry
    }

    pub fn atlas(&self) -> &VolumeAtlas<T> {
        &self.atlas
    }

    /// Adds a volume and, if its size is known, reserves its atlas region.
    ///
    /// A region the current layout no longer reserves is replaced.
    pub fn register_volume(&mut self, volume: &VolumeHandle<T>) {
        self.registry.register(volume.clone());
        if let Ok(mut v) = volume.try_borrow_mut() {
            if v.region_in(self.atlas.layout()).is_none() {
                assign_atlas_region(&mut *v, self.atlas.layout_mut());
            }
        }
    }

    /// Removes one registration of `volume`. Absent volumes are ignored.
    ///
    /// A volume that is no longer registered at all loses its atlas region,
    /// and the atlas is marked for a repack.
    pub fn deregister_volume(&mut self, volume: &VolumeHandle<T>) {
        if !self.registry.deregister(volume) {
            return;
        }
        if !self.registry.contains(volume) {
            if let Ok(mut v) = volume.try_borrow_mut() {
                v.set_atlas_placement(None);
            }
            self.atlas.trigger_refresh();
        }
    }

    /// Marks the atlas stale so the next copy repacks it.
    pub fn trigger_atlas_refresh(&mut self) {
        self.atlas.trigger_refresh();
    }

    pub fn atlas_needs_refresh(&self) -> bool {
        self.atlas.needs_refresh()
    }

    /// Returns the registered volumes for a renderer to sample this frame.
    ///
    /// `camera` and `time` are accepted for per-view culling but currently unused.
    pub fn prepare_fluid_sim_volume_data<C: ?Sized>(
        &self,
        _camera: &C,
        _time: f32,
    ) -> Vec<VolumeHandle<T>> {
        self.registry.snapshot()
    }

    /// Records one simulation step for every registered volume.
    ///
    /// Volumes flagged for initialization are seeded from their initial state;
    /// every other volume swaps its buffers and runs `Simulate`. Volumes
    /// missing a texture or kernel are skipped and reported.
    pub fn simulate_volume<R>(&mut self, recorder: &mut R) -> Result<SimulationReport>
    where
        R: CommandRecorder<Program = P, Texture = T>,
    {
        let resources = self.resources.as_ref().ok_or(FluidSimError::NotBuilt)?;
        let program = &resources.fluid_sim_program;
        let tile_size = self.options.tile_size;

        let mut report = SimulationReport::default();
        for (index, handle) in self.registry.iter().enumerate() {
            let outcome = match handle.try_borrow_mut() {
                Ok(mut volume) => step_volume(&mut *volume, program, recorder, tile_size),
                Err(_) => StepOutcome::NotReady(NotReadyReason::Busy),
            };
            if let StepOutcome::NotReady(reason) = outcome {
                log::debug!("fluid sim volume {index} not simulated: {reason}");
            }
            report.outcomes.push(outcome);
        }
        Ok(report)
    }

    /// Records a copy of every volume's current buffer into its atlas region.
    ///
    /// A pending refresh repacks the layout first, or stays pending while a
    /// registered volume is borrowed elsewhere. Under
    /// [`AtlasRefreshPolicy::OnDemand`] nothing is recorded unless a refresh
    /// is pending.
    pub fn copy_texture_to_atlas<R>(&mut self, recorder: &mut R) -> Result<CopyReport>
    where
        R: CommandRecorder<Program = P, Texture = T>,
    {
        let resources = self.resources.as_ref().ok_or(FluidSimError::NotBuilt)?;
        let refresh_pending = self.atlas.needs_refresh();
        if self.options.atlas_refresh_policy == AtlasRefreshPolicy::OnDemand && !refresh_pending
        {
            return Ok(CopyReport::skipped_by_policy());
        }

        let program = &resources.atlas_copy_program;
        let mut report = CopyReport::default();

        let Some(kernel) = program.find_kernel(KERNEL_COPY_TEXTURE) else {
            log::debug!("fluid sim atlas not copied: kernel '{KERNEL_COPY_TEXTURE}' not found");
            let reason = NotReadyReason::MissingKernel(KERNEL_COPY_TEXTURE);
            report.outcomes = vec![CopyOutcome::NotReady(reason); self.registry.len()];
            return Ok(report);
        };

        if refresh_pending {
            report.repacked = repack_atlas(&self.registry, self.atlas.layout_mut());
        }

        recorder.set_texture_param(
            program,
            kernel,
            TextureParam::OutputVolumeAtlas,
            self.atlas.texture(),
        );

        let tile_size = self.options.tile_size;
        let mut stale = false;
        for (index, handle) in self.registry.iter().enumerate() {
            let outcome = match handle.try_borrow_mut() {
                Ok(mut volume) => copy_volume(
                    &mut *volume,
                    self.atlas.layout_mut(),
                    program,
                    kernel,
                    recorder,
                    tile_size,
                ),
                Err(_) => CopyOutcome::NotReady(NotReadyReason::Busy),
            };
            if let CopyOutcome::NotReady(reason) = outcome {
                log::debug!("fluid sim volume {index} not copied to atlas: {reason}");
                stale |= reason == NotReadyReason::StaleAtlasRegion;
            }
            report.outcomes.push(outcome);
        }

        if stale || (refresh_pending && !report.repacked) {
            self.atlas.trigger_refresh();
        } else {
            self.atlas.clear_refresh();
        }
        Ok(report)
    }
}

fn step_volume<P, T, R>(
    volume: &mut SimulationVolume<T>,
    program: &P,
    recorder: &mut R,
    tile_size: u32,
) -> StepOutcome
where
    P: ComputeProgram,
    T: VolumeTexture,
    R: CommandRecorder<Program = P, Texture = T>,
{
    let Some(extent) = volume.extent() else {
        return StepOutcome::NotReady(NotReadyReason::MissingInitialState);
    };
    let groups = DispatchSize::for_extent(extent, tile_size);

    if volume.needs_initialization() {
        let (input, output) = match volume.initialization_targets() {
            Ok(targets) => targets,
            Err(reason) => return StepOutcome::NotReady(reason),
        };
        let Some(kernel) = program.find_kernel(KERNEL_INITIAL_STATE) else {
            return StepOutcome::NotReady(NotReadyReason::MissingKernel(KERNEL_INITIAL_STATE));
        };

        recorder.set_texture_param(program, kernel, TextureParam::InputVolumeTexture, input);
        recorder.set_texture_param(program, kernel, TextureParam::OutputVolumeTexture, output);
        recorder.dispatch(program, kernel, groups);

        volume.mark_initialized();
        return StepOutcome::Initialized;
    }

    let Some(kernel) = program.find_kernel(KERNEL_SIMULATE) else {
        return StepOutcome::NotReady(NotReadyReason::MissingKernel(KERNEL_SIMULATE));
    };
    let (input, output) = match volume.advance_buffers() {
        Ok(buffers) => buffers,
        Err(reason) => return StepOutcome::NotReady(reason),
    };

    recorder.set_vector_param(program, VectorParam::FluidSimVolumeRes, extent.as_vec4());
    recorder.set_texture_param(program, kernel, TextureParam::InputVolumeTexture, input);
    recorder.set_texture_param(program, kernel, TextureParam::OutputVolumeTexture, output);
    recorder.dispatch(program, kernel, groups);

    volume.record_step();
    StepOutcome::Stepped
}

fn copy_volume<P, T, R>(
    volume: &mut SimulationVolume<T>,
    layout: &mut AtlasLayout,
    program: &P,
    kernel: KernelId,
    recorder: &mut R,
    tile_size: u32,
) -> CopyOutcome
where
    P: ComputeProgram,
    T: VolumeTexture,
    R: CommandRecorder<Program = P, Texture = T>,
{
    let Some(extent) = volume.extent() else {
        return CopyOutcome::NotReady(NotReadyReason::MissingInitialState);
    };
    let region = match volume.region_in(layout) {
        Some(region) if region.matches(extent) => region,
        Some(_) => return CopyOutcome::NotReady(NotReadyReason::StaleAtlasRegion),
        None => match assign_atlas_region(volume, layout) {
            Some(region) => region,
            None => return CopyOutcome::NotReady(NotReadyReason::NoAtlasRegion),
        },
    };
    let Some(source) = volume.front_buffer() else {
        return CopyOutcome::NotReady(NotReadyReason::MissingInputBuffer);
    };

    let offset = region.offset.as_vec3();
    recorder.set_vector_param(program, VectorParam::FluidSimVolumeRes, extent.as_vec4());
    recorder.set_vector_param(program, VectorParam::AtlasOffset, Vec4::from((offset, 0.0)));
    recorder.set_texture_param(program, kernel, TextureParam::InputVolumeTexture, source);
    recorder.dispatch(program, kernel, DispatchSize::for_extent(extent, tile_size));
    CopyOutcome::Copied(region)
}

/// Reserves an atlas region for a volume with a known extent.
///
/// Only the first failure after a successful placement is a warning.
fn assign_atlas_region<T: VolumeTexture>(
    volume: &mut SimulationVolume<T>,
    layout: &mut AtlasLayout,
) -> Option<AtlasRegion> {
    let extent = volume.extent()?;
    match layout.allocate(extent) {
        Ok(region) => {
            volume.set_atlas_placement(Some(AtlasPlacement {
                region,
                generation: layout.generation(),
            }));
            Some(region)
        }
        Err(err) => {
            if volume.mark_unplaced() {
                log::warn!("fluid sim volume of size {extent} has no atlas region: {err}");
            } else {
                log::debug!(
                    "fluid sim volume of size {extent} still has no atlas region: {err}"
                );
            }
            None
        }
    }
}

/// Rebuilds the layout from scratch in registry order.
///
/// Returns `false` and leaves the layout alone if any registered volume is
/// borrowed, since its region could not be moved.
fn repack_atlas<T: VolumeTexture>(
    registry: &VolumeRegistry<T>,
    layout: &mut AtlasLayout,
) -> bool {
    if let Some(index) = registry
        .iter()
        .position(|handle| handle.try_borrow_mut().is_err())
    {
        log::debug!("fluid sim atlas repack deferred: volume {index} is busy");
        return false;
    }

    layout.reset();
    for handle in registry.iter() {
        if let Ok(mut volume) = handle.try_borrow_mut() {
            // Duplicate registrations share one region.
            if volume.region_in(layout).is_none() {
                assign_atlas_region(&mut *volume, layout);
            }
        }
    }
    log::debug!("fluid sim atlas repacked: {} regions", layout.allocations());
    true
}
