//! Headless compute integration tests.
//!
//! These tests need a GPU adapter (real or software fallback). Without one
//! they print a message and return early.

use fluidsim_core::*;
use fluidsim_render::*;

fn context() -> Option<GpuContext> {
    match GpuContext::new_headless_blocking() {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("Skipping headless compute test: no GPU adapter available ({e})");
            None
        }
    }
}

fn options() -> FluidSimOptions {
    FluidSimOptions {
        atlas_resolution: 16,
        default_volume_resolution: 8,
        ..Default::default()
    }
}

fn volume_with(
    ctx: &GpuContext,
    options: &FluidSimOptions,
    texels: &[[u8; 4]],
) -> VolumeHandle<GpuVolumeTexture> {
    let extent = VolumeExtent::cube(options.default_volume_resolution).unwrap();
    let initial = GpuVolumeTexture::create_initial_state(&ctx.device, extent, "initial state");
    initial.upload(&ctx.queue, texels).unwrap();
    let buffers = SimulationBuffers::allocate_default(&ctx.device, options).unwrap();
    VolumeHandle::new(
        SimulationVolume::new()
            .with_initial_state(initial)
            .with_buffers(buffers.front, buffers.back),
    )
}

#[test]
fn test_initialize_and_copy_to_atlas() {
    let Some(ctx) = context() else { return };
    let options = options();
    let mut manager = create_manager(&ctx.device, options.clone()).unwrap();

    let texels: Vec<[u8; 4]> = (0..512u32).map(|i| [(i % 256) as u8, 7, 0, 255]).collect();
    let volume = volume_with(&ctx, &options, &texels);
    manager.register_volume(&volume);

    let mut encoder = ctx.create_encoder("fluid sim frame");
    {
        let mut recorder = WgpuCommandRecorder::new(&ctx.device, &mut encoder);
        let report = manager.simulate_volume(&mut recorder).unwrap();
        assert_eq!(report.initialized(), 1);
        let copy = manager.copy_texture_to_atlas(&mut recorder).unwrap();
        assert_eq!(copy.copied(), 1);
        assert_eq!(recorder.dispatch_count(), 2);
    }
    ctx.submit(encoder);

    let front = read_volume(&ctx.device, &ctx.queue, volume.borrow().front_buffer().unwrap())
        .unwrap();
    assert_eq!(front, texels);

    let atlas = read_volume(&ctx.device, &ctx.queue, manager.atlas().texture()).unwrap();
    assert_eq!(atlas.len(), 16 * 16 * 16);
    for z in 0..8usize {
        for y in 0..8usize {
            for x in 0..8usize {
                let src = x + 8 * (y + 8 * z);
                let dst = x + 16 * (y + 16 * z);
                assert_eq!(atlas[dst], texels[src], "texel ({x}, {y}, {z})");
            }
        }
    }
}

#[test]
fn test_step_reads_previous_output() {
    let Some(ctx) = context() else { return };
    let options = options();
    let mut manager = create_manager(&ctx.device, options.clone()).unwrap();

    let texels = vec![[200u8, 100, 50, 255]; 512];
    let volume = volume_with(&ctx, &options, &texels);
    manager.register_volume(&volume);

    let mut encoder = ctx.create_encoder("fluid sim frames");
    {
        let mut recorder = WgpuCommandRecorder::new(&ctx.device, &mut encoder);
        let first = manager.simulate_volume(&mut recorder).unwrap();
        let second = manager.simulate_volume(&mut recorder).unwrap();
        assert_eq!(first.outcomes, vec![StepOutcome::Initialized]);
        assert_eq!(second.outcomes, vec![StepOutcome::Stepped]);
    }
    ctx.submit(encoder);

    let v = volume.borrow();
    let previous = read_volume(&ctx.device, &ctx.queue, v.back_buffer().unwrap()).unwrap();
    let current = read_volume(&ctx.device, &ctx.queue, v.front_buffer().unwrap()).unwrap();

    assert_eq!(previous, texels);
    // A uniform field only dissipates.
    let first = current[0];
    assert!(current.iter().all(|px| *px == first));
    assert!((198..200).contains(&first[0]), "red channel {}", first[0]);
}

#[test]
fn test_upload_size_mismatch() {
    let Some(ctx) = context() else { return };
    let extent = VolumeExtent::cube(4).unwrap();
    let texture = GpuVolumeTexture::create_initial_state(&ctx.device, extent, "mismatch");
    let err = texture.upload(&ctx.queue, &[[0; 4]; 10]).unwrap_err();
    assert!(matches!(
        err,
        RenderError::TextureSizeMismatch {
            expected: 64,
            actual: 10
        }
    ));
}

#[test]
fn test_programs_expose_kernels() {
    let Some(ctx) = context() else { return };
    let resources = create_fluid_sim_resources(&ctx.device).unwrap();
    assert!(resources
        .fluid_sim_program
        .find_kernel(KERNEL_INITIAL_STATE)
        .is_some());
    assert!(resources.fluid_sim_program.find_kernel(KERNEL_SIMULATE).is_some());
    assert!(resources
        .fluid_sim_program
        .find_kernel(KERNEL_COPY_TEXTURE)
        .is_none());
    assert_eq!(
        resources
            .atlas_copy_program
            .find_kernel(KERNEL_COPY_TEXTURE),
        Some(KernelId(0))
    );
}

#[test]
fn test_invalid_shader_is_reported() {
    let Some(ctx) = context() else { return };
    let result = ComputeProgramBuilder::new()
        .with_label("broken")
        .with_source("@compute @workgroup_size(4, 4, 4) fn main() { let x: u32 = ; }")
        .with_kernel("main")
        .build(&ctx.device);
    assert!(result.is_err());
}
