//! The shared volume atlas and the layout that places volumes inside it.

use glam::UVec3;
use serde::{Deserialize, Serialize};

use crate::compute::VolumeTexture;
use crate::error::{FluidSimError, Result};
use crate::volume::VolumeExtent;

/// An axis-aligned box of texels inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtlasRegion {
    /// Texel coordinate of the region's minimum corner.
    pub offset: UVec3,
    /// Texel size of the region.
    pub size: UVec3,
}

impl AtlasRegion {
    /// Exclusive maximum corner.
    pub fn end(&self) -> UVec3 {
        self.offset.saturating_add(self.size)
    }

    /// Whether two regions share at least one texel.
    pub fn overlaps(&self, other: &AtlasRegion) -> bool {
        self.offset.cmplt(other.end()).all() && other.offset.cmplt(self.end()).all()
    }

    /// Whether the region lies entirely inside `bounds`.
    pub fn fits_within(&self, bounds: UVec3) -> bool {
        self.end().cmple(bounds).all()
    }

    /// Whether the region has exactly the given extent.
    pub fn matches(&self, extent: VolumeExtent) -> bool {
        self.size == extent.as_uvec3()
    }
}

/// A region together with the layout generation that reserved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AtlasPlacement {
    pub(crate) region: AtlasRegion,
    pub(crate) generation: u64,
}

/// Shelf packer assigning non-overlapping regions inside the atlas.
///
/// Regions fill a row along X; a full row starts a new one further along Y,
/// and a full layer starts a new layer further along Z. Individual regions
/// cannot be freed; [`reset`](Self::reset) and re-allocate to compact.
#[derive(Debug, Clone)]
pub struct AtlasLayout {
    bounds: UVec3,
    cursor: UVec3,
    row_height: u32,
    layer_depth: u32,
    allocations: usize,
    generation: u64,
}

impl AtlasLayout {
    pub fn new(bounds: UVec3) -> Self {
        Self {
            bounds,
            cursor: UVec3::ZERO,
            row_height: 0,
            layer_depth: 0,
            allocations: 0,
            generation: 0,
        }
    }

    pub fn bounds(&self) -> UVec3 {
        self.bounds
    }

    /// Number of regions handed out since the last reset.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Bumped by every [`reset`](Self::reset). Regions handed out under an
    /// earlier generation are no longer reserved.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forgets every allocation.
    pub fn reset(&mut self) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::new(self.bounds)
        };
    }

    /// Reserves a region of the given extent.
    pub fn allocate(&mut self, extent: VolumeExtent) -> Result<AtlasRegion> {
        let size = extent.as_uvec3();
        if size.cmpgt(self.bounds).any() {
            return Err(FluidSimError::VolumeTooLarge {
                size,
                atlas: self.bounds,
            });
        }

        let mut cursor = self.cursor;
        let mut row_height = self.row_height;
        let mut layer_depth = self.layer_depth;

        let fits = |start: u32, len: u32, bound: u32| {
            start.checked_add(len).is_some_and(|end| end <= bound)
        };

        if !fits(cursor.x, size.x, self.bounds.x) {
            cursor.x = 0;
            cursor.y = cursor.y.saturating_add(row_height);
            row_height = 0;
        }
        if !fits(cursor.y, size.y, self.bounds.y) {
            cursor.x = 0;
            cursor.y = 0;
            cursor.z = cursor.z.saturating_add(layer_depth);
            row_height = 0;
            layer_depth = 0;
        }
        if !fits(cursor.z, size.z, self.bounds.z) {
            return Err(FluidSimError::AtlasFull { size });
        }

        let region = AtlasRegion {
            offset: cursor,
            size,
        };

        self.cursor = UVec3::new(cursor.x + size.x, cursor.y, cursor.z);
        self.row_height = row_height.max(size.y);
        self.layer_depth = layer_depth.max(size.z);
        self.allocations += 1;
        Ok(region)
    }
}

/// The single 3D texture every registered volume is packed into.
pub struct VolumeAtlas<T> {
    texture: T,
    layout: AtlasLayout,
    needs_refresh: bool,
}

impl<T: VolumeTexture> VolumeAtlas<T> {
    /// Wraps an atlas texture. Its extent bounds the layout.
    pub fn new(texture: T) -> Self {
        let layout = AtlasLayout::new(texture.extent().as_uvec3());
        Self {
            texture,
            layout,
            needs_refresh: false,
        }
    }
}

impl<T> VolumeAtlas<T> {
    pub fn texture(&self) -> &T {
        &self.texture
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub(crate) fn layout_mut(&mut self) -> &mut AtlasLayout {
        &mut self.layout
    }

    /// Whether a repack and copy are pending.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    pub fn trigger_refresh(&mut self) {
        self.needs_refresh = true;
    }

    pub(crate) fn clear_refresh(&mut self) {
        self.needs_refresh = false;
    }
}
