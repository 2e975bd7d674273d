//! Benchmarks for the CPU side of initialization and the host update.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use meshdust::compute::ParticleBackend;
use meshdust::flow_field::{FlowField, SimplexFlowField};
use meshdust::geometry::GeometrySampler;
use meshdust::gpu::shaders::compute_shader;
use meshdust::mesh::{primitives, ModelAsset};
use meshdust::reference::CpuBackend;
use meshdust::state::{encode, gpu_size};
use meshdust::uniforms::SimulationUniforms;
use meshdust::uv_map::UvMap;
use meshdust::Vec3;

fn sphere(rings: u32) -> ModelAsset {
    ModelAsset::new("ball").with_mesh(primitives::uv_sphere("ball", 1.0, rings * 2, rings))
}

fn bench_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample");
    let sampler = GeometrySampler::new();

    for rings in [16, 64, 256] {
        let asset = sphere(rings);
        let count = asset.meshes[0].vertex_count();
        group.bench_with_input(BenchmarkId::new("uv_sphere", count), &asset, |b, asset| {
            b.iter(|| black_box(sampler.sample(asset)))
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let sampler = GeometrySampler::new();

    for rings in [16, 64, 256] {
        let Ok(geometry) = sampler.sample(&sphere(rings)) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("state", geometry.len()), &geometry, |b, g| {
            b.iter(|| black_box(encode(g)))
        });
        let count = geometry.len() as u32;
        group.bench_with_input(BenchmarkId::new("uv_map", count), &count, |b, &count| {
            b.iter(|| black_box(UvMap::new(count, gpu_size(count))))
        });
    }

    group.finish();
}

fn bench_host_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_update");
    let sampler = GeometrySampler::new();

    for rings in [16, 64] {
        let Ok(geometry) = sampler.sample(&sphere(rings)) else {
            continue;
        };
        let initial = encode(&geometry);
        let mut backend = CpuBackend::new();
        backend.allocate_state(&initial);

        let mut uniforms = SimulationUniforms::new(initial.particle_count(), initial.size(), 0.3);
        uniforms.delta_time = 1.0 / 60.0;
        uniforms.flow_field_influence = 0.5;
        uniforms.flow_field_strength = 2.0;
        uniforms.flow_field_frequency = 0.5;

        group.bench_function(BenchmarkId::new("step", geometry.len()), |b| {
            b.iter(|| black_box(backend.compute(&uniforms)))
        });
    }

    group.finish();
}

fn bench_flow_field(c: &mut Criterion) {
    let field = SimplexFlowField::default();

    c.bench_function("flow_field_sample", |b| {
        let p = Vec3::new(0.3, -1.2, 2.5);
        b.iter(|| black_box(field.sample(black_box(p), 1.5, 0.5)))
    });

    c.bench_function("compute_shader", |b| {
        b.iter(|| black_box(compute_shader(&field)))
    });
}

criterion_group!(
    benches,
    bench_sample,
    bench_encode,
    bench_host_update,
    bench_flow_field
);
criterion_main!(benches);
