//! Copying volume textures back to the CPU.

use crate::error::{RenderError, RenderResult};
use crate::texture::{GpuVolumeTexture, VOLUME_TEXEL_SIZE};

/// Calculates bytes per row with proper alignment for wgpu buffer copies.
fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * VOLUME_TEXEL_SIZE;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

/// Reads every texel of a volume, X fastest then Y then Z.
///
/// The texture needs `COPY_SRC` usage. Blocks until the GPU has finished
/// all submitted work.
pub fn read_volume(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    volume: &GpuVolumeTexture,
) -> RenderResult<Vec<[u8; 4]>> {
    let size = volume.size();
    let bytes_per_row = aligned_bytes_per_row(size.width);
    let rows = size.height * size.depth_or_array_layers;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("volume readback buffer"),
        size: u64::from(bytes_per_row) * u64::from(rows),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("volume readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: volume.texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(size.height),
            },
        },
        size,
    );
    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::wait_indefinitely());
    rx.recv()
        .map_err(|_| RenderError::BufferMapFailed)?
        .map_err(|_| RenderError::BufferMapFailed)?;

    // Copy data, removing row padding
    let data = buffer_slice.get_mapped_range();
    let row_bytes = (size.width * VOLUME_TEXEL_SIZE) as usize;
    let mut texels = Vec::with_capacity((size.width * rows) as usize);
    for row in 0..rows {
        let start = (row * bytes_per_row) as usize;
        texels.extend(
            data[start..start + row_bytes]
                .chunks_exact(4)
                .map(|px| [px[0], px[1], px[2], px[3]]),
        );
    }

    drop(data);
    buffer.unmap();
    Ok(texels)
}
