//! Runs a few frames of fluid simulation on a headless device.
//!
//! Usage: `cargo run -p fluidsim-render --example headless_step [options.json]`

use fluidsim_core::{FluidSimOptions, SimulationVolume, VolumeExtent, VolumeHandle};
use fluidsim_render::{
    create_manager, read_volume, GpuContext, GpuVolumeTexture, SimulationBuffers,
    WgpuCommandRecorder,
};

const FRAMES: usize = 8;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let options = match std::env::args().nth(1) {
        Some(path) => FluidSimOptions::load(path)?,
        None => FluidSimOptions {
            atlas_resolution: 64,
            default_volume_resolution: 32,
            ..Default::default()
        },
    };

    let ctx = GpuContext::new_headless_blocking()?;
    let mut manager = create_manager(&ctx.device, options.clone())?;

    // A dense blob in the lower half of the volume.
    let edge = options.default_volume_resolution;
    let extent = VolumeExtent::cube(edge)?;
    let texels: Vec<[u8; 4]> = (0..extent.texel_count())
        .map(|i| {
            let y = (i / u64::from(edge)) % u64::from(edge);
            if y < u64::from(edge / 2) {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 0]
            }
        })
        .collect();
    let initial = GpuVolumeTexture::create_initial_state(&ctx.device, extent, "smoke");
    initial.upload(&ctx.queue, &texels)?;

    let buffers = SimulationBuffers::allocate_default(&ctx.device, &options)?;
    let volume = VolumeHandle::new(
        SimulationVolume::new()
            .with_initial_state(initial)
            .with_buffers(buffers.front, buffers.back),
    );
    manager.register_volume(&volume);

    for frame in 0..FRAMES {
        let mut encoder = ctx.create_encoder("fluid sim frame");
        let (step, copy) = {
            let mut recorder = WgpuCommandRecorder::new(&ctx.device, &mut encoder);
            let step = manager.simulate_volume(&mut recorder)?;
            let copy = manager.copy_texture_to_atlas(&mut recorder)?;
            (step, copy)
        };
        ctx.submit(encoder);
        log::info!(
            "frame {frame}: {} initialized, {} stepped, {} copied",
            step.initialized(),
            step.stepped(),
            copy.copied()
        );
    }

    let current = {
        let volume = volume.borrow();
        let front = volume.front_buffer().ok_or("volume lost its front buffer")?;
        read_volume(&ctx.device, &ctx.queue, front)?
    };
    let density: u64 = current.iter().map(|px| u64::from(px[3])).sum();
    println!(
        "after {FRAMES} frames: mean density {:.3}",
        density as f64 / (current.len() as f64 * 255.0)
    );
    Ok(())
}
