//! Simulation volumes and the shared handles the registry stores.

use std::cell::{BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use glam::{UVec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::atlas::{AtlasLayout, AtlasPlacement, AtlasRegion};
use crate::compute::VolumeTexture;
use crate::error::{FluidSimError, Result};
use crate::readiness::{NotReadyReason, VolumeReadiness};

/// Texel dimensions of a 3D volume. Every axis is > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeExtent {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl VolumeExtent {
    /// Creates an extent, rejecting zero-sized axes.
    pub fn new(width: u32, height: u32, depth: u32) -> Result<Self> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(FluidSimError::InvalidExtent {
                width,
                height,
                depth,
            });
        }
        Ok(Self {
            width,
            height,
            depth,
        })
    }

    /// A cube with the given edge length.
    pub fn cube(edge: u32) -> Result<Self> {
        Self::new(edge, edge, edge)
    }

    pub fn as_uvec3(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    /// The extent as a shader vector `(w, h, d, 0)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_vec4(&self) -> Vec4 {
        Vec4::new(self.width as f32, self.height as f32, self.depth as f32, 0.0)
    }

    /// Number of texels.
    pub fn texel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.depth)
    }
}

impl fmt::Display for VolumeExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// One fluid simulation instance.
///
/// The textures belong to the caller. The manager only binds them for
/// dispatches and swaps the roles of the two simulation buffers. The front
/// buffer always holds the most recent result.
pub struct SimulationVolume<T> {
    initial_state: Option<T>,
    front_buffer: Option<T>,
    back_buffer: Option<T>,
    needs_initialization: bool,
    atlas_placement: Option<AtlasPlacement>,
    unplaced: bool,
    steps: u64,
}

impl<T> Default for SimulationVolume<T> {
    fn default() -> Self {
        Self {
            initial_state: None,
            front_buffer: None,
            back_buffer: None,
            needs_initialization: true,
            atlas_placement: None,
            unplaced: false,
            steps: 0,
        }
    }
}

impl<T> SimulationVolume<T> {
    /// Creates an empty volume that will initialize on its first step.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial-state texture.
    #[must_use]
    pub fn with_initial_state(mut self, texture: T) -> Self {
        self.initial_state = Some(texture);
        self
    }

    /// Sets both simulation buffers.
    #[must_use]
    pub fn with_buffers(mut self, front: T, back: T) -> Self {
        self.front_buffer = Some(front);
        self.back_buffer = Some(back);
        self
    }

    pub fn initial_state(&self) -> Option<&T> {
        self.initial_state.as_ref()
    }

    /// Replaces the initial-state texture and requests re-initialization.
    pub fn set_initial_state(&mut self, texture: Option<T>) -> Option<T> {
        self.needs_initialization = true;
        std::mem::replace(&mut self.initial_state, texture)
    }

    /// The buffer holding the current simulation state.
    pub fn front_buffer(&self) -> Option<&T> {
        self.front_buffer.as_ref()
    }

    /// The buffer holding the previous simulation state.
    pub fn back_buffer(&self) -> Option<&T> {
        self.back_buffer.as_ref()
    }

    /// Replaces both simulation buffers, returning the old ones.
    pub fn set_buffers(&mut self, front: Option<T>, back: Option<T>) -> (Option<T>, Option<T>) {
        (
            std::mem::replace(&mut self.front_buffer, front),
            std::mem::replace(&mut self.back_buffer, back),
        )
    }

    pub fn needs_initialization(&self) -> bool {
        self.needs_initialization
    }

    /// Makes the next simulation call re-seed from the initial state.
    pub fn request_initialization(&mut self) {
        self.needs_initialization = true;
    }

    /// Exchanges the roles of the front and back buffers.
    pub fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.front_buffer, &mut self.back_buffer);
    }

    /// Number of `Simulate` steps recorded since the last initialization.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The atlas region assigned by the manager, if any.
    ///
    /// A region left over from before a repack the volume missed is replaced
    /// on its next copy.
    pub fn atlas_region(&self) -> Option<AtlasRegion> {
        self.atlas_placement.map(|placement| placement.region)
    }

    /// The assigned region, if it is still reserved in `layout`.
    pub(crate) fn region_in(&self, layout: &AtlasLayout) -> Option<AtlasRegion> {
        self.atlas_placement
            .filter(|placement| placement.generation == layout.generation())
            .map(|placement| placement.region)
    }

    pub(crate) fn set_atlas_placement(&mut self, placement: Option<AtlasPlacement>) {
        if placement.is_some() {
            self.unplaced = false;
        }
        self.atlas_placement = placement;
    }

    /// Drops the region after a failed placement.
    ///
    /// Returns `true` only for the first failure since the last successful
    /// placement.
    pub(crate) fn mark_unplaced(&mut self) -> bool {
        self.atlas_placement = None;
        !std::mem::replace(&mut self.unplaced, true)
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.needs_initialization = false;
        self.steps = 0;
    }

    pub(crate) fn record_step(&mut self) {
        self.steps += 1;
    }

    /// Initial state and output buffer used by the `InitialState` kernel.
    pub(crate) fn initialization_targets(&self) -> std::result::Result<(&T, &T), NotReadyReason> {
        let input = self
            .initial_state
            .as_ref()
            .ok_or(NotReadyReason::MissingInitialState)?;
        let output = self
            .front_buffer
            .as_ref()
            .ok_or(NotReadyReason::MissingOutputBuffer)?;
        Ok((input, output))
    }

    /// Front and back buffers, in that order.
    ///
    /// Before a swap the front buffer is the next step's input and the back
    /// buffer its output.
    pub(crate) fn step_buffers(&self) -> std::result::Result<(&T, &T), NotReadyReason> {
        if self.initial_state.is_none() {
            return Err(NotReadyReason::MissingInitialState);
        }
        let front = self
            .front_buffer
            .as_ref()
            .ok_or(NotReadyReason::MissingInputBuffer)?;
        let back = self
            .back_buffer
            .as_ref()
            .ok_or(NotReadyReason::MissingOutputBuffer)?;
        Ok((front, back))
    }

    /// Swaps the buffers for one step and returns `(input, output)`.
    ///
    /// The previous output becomes the input. Nothing is swapped unless both
    /// buffers are present.
    pub(crate) fn advance_buffers(&mut self) -> std::result::Result<(&T, &T), NotReadyReason> {
        if self.initial_state.is_none() {
            return Err(NotReadyReason::MissingInitialState);
        }
        match (&mut self.front_buffer, &mut self.back_buffer) {
            (Some(front), Some(back)) => {
                std::mem::swap(front, back);
                Ok((&*back, &*front))
            }
            (None, _) => Err(NotReadyReason::MissingInputBuffer),
            (Some(_), None) => Err(NotReadyReason::MissingOutputBuffer),
        }
    }

    /// Whether the next simulation call can record work, ignoring kernels.
    pub fn readiness(&self) -> VolumeReadiness {
        let check = if self.needs_initialization {
            self.initialization_targets().map(|_| ())
        } else {
            self.step_buffers().map(|_| ())
        };
        check.map_or_else(VolumeReadiness::NotReady, |()| VolumeReadiness::Ready)
    }
}

impl<T: VolumeTexture> SimulationVolume<T> {
    /// Dimensions of the volume, taken from its initial-state texture.
    pub fn extent(&self) -> Option<VolumeExtent> {
        self.initial_state.as_ref().map(VolumeTexture::extent)
    }
}

impl<T> fmt::Debug for SimulationVolume<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationVolume")
            .field("has_initial_state", &self.initial_state.is_some())
            .field("has_front_buffer", &self.front_buffer.is_some())
            .field("has_back_buffer", &self.back_buffer.is_some())
            .field("needs_initialization", &self.needs_initialization)
            .field("atlas_region", &self.atlas_region())
            .field("steps", &self.steps)
            .finish()
    }
}

/// Shared, identity-compared reference to a [`SimulationVolume`].
///
/// The owner keeps one handle and gives clones to the manager. Two handles
/// are equal only if they point at the same volume.
pub struct VolumeHandle<T>(Rc<RefCell<SimulationVolume<T>>>);

impl<T> VolumeHandle<T> {
    pub fn new(volume: SimulationVolume<T>) -> Self {
        Self(Rc::new(RefCell::new(volume)))
    }

    /// Borrows the volume.
    ///
    /// # Panics
    ///
    /// Panics if the volume is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, SimulationVolume<T>> {
        self.0.borrow()
    }

    /// Mutably borrows the volume.
    ///
    /// # Panics
    ///
    /// Panics if the volume is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, SimulationVolume<T>> {
        self.0.borrow_mut()
    }

    /// Mutably borrows the volume, failing if it is already borrowed.
    pub fn try_borrow_mut(
        &self,
    ) -> std::result::Result<RefMut<'_, SimulationVolume<T>>, BorrowMutError> {
        self.0.try_borrow_mut()
    }

    /// Whether both handles refer to the same volume.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for VolumeHandle<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> PartialEq for VolumeHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for VolumeHandle<T> {}

impl<T> fmt::Debug for VolumeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(volume) => volume.fmt(f),
            Err(_) => f.write_str("SimulationVolume { <borrowed> }"),
        }
    }
}

impl<T> From<SimulationVolume<T>> for VolumeHandle<T> {
    fn from(volume: SimulationVolume<T>) -> Self {
        Self::new(volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_rejects_zero() {
        assert!(VolumeExtent::new(0, 4, 4).is_err());
        assert!(VolumeExtent::new(4, 4, 0).is_err());
        let extent = VolumeExtent::new(2, 3, 4).unwrap();
        assert_eq!(extent.texel_count(), 24);
        assert_eq!(extent.to_string(), "2x3x4");
        assert_eq!(extent.as_vec4(), Vec4::new(2.0, 3.0, 4.0, 0.0));
    }

    #[test]
    fn test_new_volume_needs_initialization() {
        let volume: SimulationVolume<u32> = SimulationVolume::new();
        assert!(volume.needs_initialization());
        assert_eq!(
            volume.readiness(),
            VolumeReadiness::NotReady(NotReadyReason::MissingInitialState)
        );
    }

    #[test]
    fn test_swap_buffers() {
        let mut volume = SimulationVolume::new().with_buffers(1u32, 2u32);
        volume.swap_buffers();
        assert_eq!(volume.front_buffer(), Some(&2));
        assert_eq!(volume.back_buffer(), Some(&1));
    }

    #[test]
    fn test_advance_buffers_swaps_only_when_complete() {
        let mut volume = SimulationVolume::new().with_initial_state(0u32);
        volume.set_buffers(Some(1), None);
        assert_eq!(
            volume.advance_buffers(),
            Err(NotReadyReason::MissingOutputBuffer)
        );
        assert_eq!(volume.front_buffer(), Some(&1));

        volume.set_buffers(Some(1), Some(2));
        assert_eq!(volume.advance_buffers(), Ok((&1, &2)));
        assert_eq!(volume.front_buffer(), Some(&2));
        assert_eq!(volume.advance_buffers(), Ok((&2, &1)));
    }

    #[test]
    fn test_unplaced_reported_once_until_placed() {
        let mut layout = AtlasLayout::new(UVec3::splat(8));
        let mut volume = SimulationVolume::<u32>::new();
        assert!(volume.mark_unplaced());
        assert!(!volume.mark_unplaced());

        let region = layout.allocate(VolumeExtent::cube(8).unwrap()).unwrap();
        volume.set_atlas_placement(Some(AtlasPlacement {
            region,
            generation: layout.generation(),
        }));
        assert_eq!(volume.region_in(&layout), Some(region));
        assert!(volume.mark_unplaced());
    }

    #[test]
    fn test_region_expires_with_layout_reset() {
        let mut layout = AtlasLayout::new(UVec3::splat(8));
        let mut volume = SimulationVolume::<u32>::new();
        let region = layout.allocate(VolumeExtent::cube(8).unwrap()).unwrap();
        volume.set_atlas_placement(Some(AtlasPlacement {
            region,
            generation: layout.generation(),
        }));

        layout.reset();
        assert_eq!(volume.region_in(&layout), None);
        assert_eq!(volume.atlas_region(), Some(region));
    }

    #[test]
    fn test_readiness_reasons() {
        let mut volume = SimulationVolume::new().with_initial_state(0u32);
        assert_eq!(
            volume.readiness(),
            VolumeReadiness::NotReady(NotReadyReason::MissingOutputBuffer)
        );

        volume.set_buffers(Some(1), None);
        assert_eq!(volume.readiness(), VolumeReadiness::Ready);

        volume.mark_initialized();
        assert_eq!(
            volume.readiness(),
            VolumeReadiness::NotReady(NotReadyReason::MissingOutputBuffer)
        );

        volume.set_buffers(None, Some(2));
        assert_eq!(
            volume.readiness(),
            VolumeReadiness::NotReady(NotReadyReason::MissingInputBuffer)
        );
    }

    #[test]
    fn test_set_initial_state_requests_initialization() {
        let mut volume = SimulationVolume::new().with_initial_state(0u32);
        volume.mark_initialized();
        assert!(!volume.needs_initialization());
        assert_eq!(volume.set_initial_state(Some(7)), Some(0));
        assert!(volume.needs_initialization());
    }

    #[test]
    fn test_handle_identity() {
        let a = VolumeHandle::new(SimulationVolume::<u32>::new());
        let b = VolumeHandle::new(SimulationVolume::<u32>::new());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_try_borrow_mut_while_borrowed() {
        let handle = VolumeHandle::new(SimulationVolume::<u32>::new());
        let guard = handle.borrow();
        assert!(handle.try_borrow_mut().is_err());
        drop(guard);
        assert!(handle.try_borrow_mut().is_ok());
    }
}
