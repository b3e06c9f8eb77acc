//! Configuration options for the fluid simulation volume manager.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FluidSimError, Result};

/// Default edge length of the cubic volume atlas.
pub const DEFAULT_ATLAS_RESOLUTION: u32 = 512;

/// Default edge length used when allocating simulation buffers for a volume.
pub const DEFAULT_VOLUME_RESOLUTION: u32 = 256;

/// Configuration for a [`crate::FluidSimVolumeManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidSimOptions {
    /// Edge length of the cubic atlas texture, in texels.
    pub atlas_resolution: u32,

    /// Edge length of the simulation buffers a backend allocates for a volume.
    pub default_volume_resolution: u32,

    /// Thread-group edge length of every compute kernel.
    ///
    /// Must equal the `@workgroup_size` declared by the shaders.
    pub tile_size: u32,

    /// When the atlas compositor records copy work.
    pub atlas_refresh_policy: AtlasRefreshPolicy,
}

impl Default for FluidSimOptions {
    fn default() -> Self {
        Self {
            atlas_resolution: DEFAULT_ATLAS_RESOLUTION,
            default_volume_resolution: DEFAULT_VOLUME_RESOLUTION,
            tile_size: crate::compute::TILE_SIZE,
            atlas_refresh_policy: AtlasRefreshPolicy::EveryFrame,
        }
    }
}

impl FluidSimOptions {
    /// Parses options from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serializes the options as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(FluidSimError::InvalidOption {
                name: "tile_size",
                reason: "must be > 0".into(),
            });
        }
        if self.atlas_resolution == 0 {
            return Err(FluidSimError::InvalidOption {
                name: "atlas_resolution",
                reason: "must be > 0".into(),
            });
        }
        if self.default_volume_resolution == 0 {
            return Err(FluidSimError::InvalidOption {
                name: "default_volume_resolution",
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }
}

/// Controls whether [`crate::FluidSimVolumeManager::copy_texture_to_atlas`]
/// records work on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AtlasRefreshPolicy {
    /// Copy every volume into the atlas on every call.
    #[default]
    EveryFrame,
    /// Copy only after [`crate::FluidSimVolumeManager::trigger_atlas_refresh`]
    /// (or a deregistration) marked the atlas stale.
    OnDemand,
}
