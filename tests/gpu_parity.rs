//! The wgpu backend against the host backend.
//!
//! Both run the same update over the same state image and uniforms; the
//! texture the compute pass wrote is copied back and compared texel by
//! texel. Skipped on machines without a GPU adapter.

use std::sync::Arc;

use meshdust::geometry::SampledGeometry;
use meshdust::prelude::*;
use meshdust::state::{encode_with_rng, StateImage, Texel};
use meshdust::uniforms::SimulationUniforms;
use rand::rngs::StdRng;
use rand::SeedableRng;

const TOLERANCE: f32 = 1e-3;

fn headless() -> Option<Arc<GpuContext>> {
    match pollster::block_on(GpuContext::headless()) {
        Ok(context) => Some(Arc::new(context)),
        Err(GpuError::NoAdapter) => {
            eprintln!("no GPU adapter available, skipping");
            None
        }
        Err(err) => panic!("GPU setup failed: {}", err),
    }
}

/// Seven points: a 3x3 image with two padding texels.
fn seven_points() -> StateImage {
    let positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.5, -0.5),
        Vec3::new(-0.8, 0.3, 0.2),
        Vec3::new(0.25, -1.5, 0.75),
        Vec3::new(2.0, 2.0, 2.0),
        Vec3::new(-1.2, -0.4, 1.1),
        Vec3::new(0.6, 0.9, -1.7),
    ];
    let geometry = SampledGeometry::new(positions, vec![Vec4::ONE; 7]);
    encode_with_rng(&geometry, &mut StdRng::seed_from_u64(11))
}

fn uniforms(image: &StateImage, time: f32) -> SimulationUniforms {
    // A phase drop of 0.3 per step respawns some particles and moves the rest.
    let mut uniforms = SimulationUniforms::new(image.particle_count(), image.size(), 3.0);
    let params = FlowFieldParams::default()
        .with_influence(0.5)
        .with_strength(2.0)
        .with_frequency(0.5);
    uniforms.set_frame(time, 0.1, &params);
    uniforms
}

fn assert_texels_match(gpu: &StateImage, cpu: &StateImage) {
    assert_eq!(gpu.size(), cpu.size());
    assert_eq!(gpu.particle_count(), cpu.particle_count());
    for (i, (g, c)) in gpu.particles().iter().zip(cpu.particles()).enumerate() {
        let moved = g.position().distance(c.position());
        assert!(moved < TOLERANCE, "texel {} position {:?} vs {:?}", i, g.position(), c.position());
        assert!((g.phase - c.phase).abs() < TOLERANCE, "texel {} phase {} vs {}", i, g.phase, c.phase);
    }
}

fn assert_padding_untouched(image: &StateImage) {
    let padding = &image.texels()[image.particle_count() as usize..];
    assert_eq!(padding.len(), 2);
    for texel in padding {
        assert_eq!(*texel, Texel::default());
    }
}

#[test]
fn test_readback_before_compute_is_initial_state() {
    let Some(context) = headless() else {
        return;
    };
    let initial = seven_points();
    let mut gpu = GpuBackend::new(context, RenderTarget::new(wgpu::TextureFormat::Rgba8Unorm));

    assert!(gpu.read_state(StateSlot::FRONT).is_none());
    let slot = gpu.allocate_state(&initial);

    assert_eq!(gpu.read_state(slot).unwrap(), initial);
    assert_eq!(gpu.read_state(slot.other()).unwrap(), initial);
}

#[test]
fn test_compute_matches_host_backend() {
    let Some(context) = headless() else {
        return;
    };
    let initial = seven_points();
    assert_eq!(initial.size(), 3);
    assert_eq!(initial.padding(), 2);

    let mut gpu = GpuBackend::new(context, RenderTarget::new(wgpu::TextureFormat::Rgba8Unorm));
    let mut cpu = CpuBackend::new();
    gpu.allocate_state(&initial);
    cpu.allocate_state(&initial);

    // Two steps so both update bind groups run.
    for (step, time) in [0.1f32, 0.2].into_iter().enumerate() {
        let uniforms = uniforms(&initial, time);
        let gpu_slot = gpu.compute(&uniforms).unwrap();
        let cpu_slot = cpu.compute(&uniforms).unwrap();
        assert_eq!(gpu_slot, cpu_slot, "step {}", step);

        let gpu_image = gpu.read_state(gpu_slot).unwrap();
        let cpu_image = cpu.image(cpu_slot).unwrap();
        assert_texels_match(&gpu_image, cpu_image);
        assert_padding_untouched(&gpu_image);
    }
}

#[test]
fn test_device_reports_state_limit() {
    let Some(context) = headless() else {
        return;
    };
    let limit = context.device.limits().max_texture_dimension_2d;
    let gpu = GpuBackend::new(context, RenderTarget::new(wgpu::TextureFormat::Rgba8Unorm));
    assert_eq!(gpu.max_state_size(), limit);
    assert!(gpu.max_state_size() >= meshdust::state::MAX_STATE_SIZE);
}
