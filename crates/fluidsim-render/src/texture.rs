//! 3D volume textures.

use fluidsim_core::{FluidSimOptions, VolumeExtent, VolumeTexture};

use crate::error::{RenderError, RenderResult};

/// Texel format shared by volumes, simulation buffers, and the atlas.
pub const VOLUME_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Bytes per texel of [`VOLUME_TEXTURE_FORMAT`].
pub const VOLUME_TEXEL_SIZE: u32 = 4;

/// A 3D RGBA8 texture with a full view.
pub struct GpuVolumeTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: VolumeExtent,
}

impl GpuVolumeTexture {
    /// Creates a 3D texture with the given usages.
    pub fn new(
        device: &wgpu::Device,
        extent: VolumeExtent,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: extent.depth,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: VOLUME_TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });
        Self {
            texture,
            view,
            extent,
        }
    }

    /// An initial-state volume, filled with [`upload`](Self::upload).
    pub fn create_initial_state(device: &wgpu::Device, extent: VolumeExtent, label: &str) -> Self {
        Self::new(
            device,
            extent,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label,
        )
    }

    /// A ping-pong buffer, readable by one kernel and writable by the next.
    pub fn create_simulation_buffer(
        device: &wgpu::Device,
        extent: VolumeExtent,
        label: &str,
    ) -> Self {
        Self::new(
            device,
            extent,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            label,
        )
    }

    /// The cubic atlas every volume is packed into.
    pub fn create_atlas(device: &wgpu::Device, resolution: u32) -> RenderResult<Self> {
        let extent = VolumeExtent::cube(resolution)?;
        Ok(Self::new(
            device,
            extent,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            "FluidSimVolumeAtlas",
        ))
    }

    /// Writes one RGBA8 value per texel, X fastest then Y then Z.
    pub fn upload(&self, queue: &wgpu::Queue, texels: &[[u8; 4]]) -> RenderResult<()> {
        let expected = self.extent.texel_count();
        let actual = texels.len() as u64;
        if expected != actual {
            return Err(RenderError::TextureSizeMismatch { expected, actual });
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(VOLUME_TEXEL_SIZE * self.extent.width),
                rows_per_image: Some(self.extent.height),
            },
            self.size(),
        );
        Ok(())
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub(crate) fn size(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.extent.width,
            height: self.extent.height,
            depth_or_array_layers: self.extent.depth,
        }
    }
}

impl VolumeTexture for GpuVolumeTexture {
    fn extent(&self) -> VolumeExtent {
        self.extent
    }
}

/// Front and back simulation buffers allocated by a volume's owner.
pub struct SimulationBuffers {
    pub front: GpuVolumeTexture,
    pub back: GpuVolumeTexture,
}

impl SimulationBuffers {
    pub fn allocate(device: &wgpu::Device, extent: VolumeExtent) -> Self {
        Self {
            front: GpuVolumeTexture::create_simulation_buffer(device, extent, "fluid sim front"),
            back: GpuVolumeTexture::create_simulation_buffer(device, extent, "fluid sim back"),
        }
    }

    /// Buffers with the configured default volume resolution.
    pub fn allocate_default(device: &wgpu::Device, options: &FluidSimOptions) -> RenderResult<Self> {
        let extent = VolumeExtent::cube(options.default_volume_resolution)?;
        Ok(Self::allocate(device, extent))
    }
}
