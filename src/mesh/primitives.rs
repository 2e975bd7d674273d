//! Procedural meshes.
//!
//! Stand-ins for decoded models in the demo and in tests. Every mesh comes
//! with UVs and an index buffer like a loaded one would.

use std::f32::consts::TAU;

use glam::{Vec2, Vec3, Vec4};

use super::SourceMesh;

/// A UV sphere with `segments` columns and `rings` rows.
///
/// Vertices are laid out ring by ring, `(rings + 1) * (segments + 1)` in
/// total; the seam column is duplicated so UVs stay continuous.
pub fn uv_sphere(name: &str, radius: f32, segments: u32, rings: u32) -> SourceMesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut positions = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    let mut uvs = Vec::with_capacity(positions.capacity());
    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let theta = v * std::f32::consts::PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let phi = u * TAU;
            positions.push(Vec3::new(
                -radius * phi.cos() * theta.sin(),
                radius * theta.cos(),
                radius * phi.sin() * theta.sin(),
            ));
            uvs.push(Vec2::new(u, 1.0 - v));
        }
    }

    let stride = segments + 1;
    let indices = grid_indices(rings, segments, |ring, segment| ring * stride + segment);

    SourceMesh::new(name, positions)
        .with_uvs(uvs)
        .with_indices(indices)
}

/// A torus in the XZ plane, `major_segments * minor_segments` vertices.
pub fn torus(
    name: &str,
    major_radius: f32,
    minor_radius: f32,
    major_segments: u32,
    minor_segments: u32,
) -> SourceMesh {
    let major_segments = major_segments.max(3);
    let minor_segments = minor_segments.max(3);

    let count = (major_segments * minor_segments) as usize;
    let mut positions = Vec::with_capacity(count);
    let mut uvs = Vec::with_capacity(count);
    for i in 0..major_segments {
        let u = i as f32 / major_segments as f32;
        let (sin_a, cos_a) = (u * TAU).sin_cos();
        for j in 0..minor_segments {
            let v = j as f32 / minor_segments as f32;
            let (sin_b, cos_b) = (v * TAU).sin_cos();
            let ring = major_radius + minor_radius * cos_b;
            positions.push(Vec3::new(ring * cos_a, minor_radius * sin_b, ring * sin_a));
            uvs.push(Vec2::new(u, v));
        }
    }

    let indices = grid_indices(major_segments, minor_segments, |i, j| {
        (i % major_segments) * minor_segments + (j % minor_segments)
    });

    SourceMesh::new(name, positions)
        .with_uvs(uvs)
        .with_indices(indices)
}

/// Two triangles per grid cell, vertex ids from `id(row, column)`.
fn grid_indices(rows: u32, columns: u32, id: impl Fn(u32, u32) -> u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity((rows * columns * 6) as usize);
    for r in 0..rows {
        for c in 0..columns {
            let a = id(r, c);
            let b = id(r + 1, c);
            let d = id(r, c + 1);
            let e = id(r + 1, c + 1);
            indices.extend_from_slice(&[a, b, d, d, b, e]);
        }
    }
    indices
}

/// One color per vertex, sweeping the hue wheel in vertex order.
pub fn rainbow_colors(count: usize, saturation: f32, value: f32) -> Vec<Vec4> {
    (0..count)
        .map(|i| hsv_to_rgb(i as f32 / count.max(1) as f32, saturation, value).extend(1.0))
        .collect()
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let c = v * s;
    let x = c * (1.0 - ((h * 6.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match (h * 6.0) as u32 % 6 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Vec3::new(r + m, g + m, b + m)
}
