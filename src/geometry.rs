//! Geometry sampling: flattening a model into one point population.
//!
//! The [`GeometrySampler`] turns the sub-meshes of a [`ModelAsset`] into a
//! [`SampledGeometry`]: one position and one baked RGBA color per vertex.
//! Vertex order in the output is the particle index order used everywhere
//! downstream (state image, UV map, color attribute).
//!
//! Two paths exist:
//!
//! - **Dedicated mesh**: when the sampler is configured with a mesh name and
//!   the model has a mesh of that name with geometry, that mesh is used
//!   alone, untransformed, with its index buffer dropped.
//! - **Merge**: otherwise every mesh with geometry is concatenated in model
//!   order, each position moved into world space by its mesh's transform.
//!
//! Color priority per vertex: surface texture sampled at the vertex UV,
//! per-vertex color, material base color, material emissive, white.

use glam::{Vec2, Vec3, Vec4};

use crate::error::SamplerError;
use crate::mesh::{ModelAsset, SourceMesh};
use crate::textures::SourceTexture;

/// Immutable snapshot of the flattened model.
///
/// Created once per particle system and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledGeometry {
    positions: Vec<Vec3>,
    colors: Vec<Vec4>,
}

impl SampledGeometry {
    /// Build a snapshot from matching position and color arrays.
    ///
    /// # Panics
    ///
    /// Panics if the arrays differ in length.
    pub fn new(positions: Vec<Vec3>, colors: Vec<Vec4>) -> Self {
        assert_eq!(positions.len(), colors.len(), "position/color count mismatch");
        Self { positions, colors }
    }

    /// Number of points (the particle count).
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Baked RGBA colors, one per point.
    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }
}

/// Flattens models into point populations.
#[derive(Debug, Clone, Default)]
pub struct GeometrySampler {
    dedicated_mesh: Option<String>,
}

impl GeometrySampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer the mesh with this name, used on its own, when present.
    pub fn with_dedicated_mesh(mut self, name: impl Into<String>) -> Self {
        self.dedicated_mesh = Some(name.into());
        self
    }

    /// Flatten `asset` into positions and baked colors.
    ///
    /// Fails with [`SamplerError::NoGeometry`] when no mesh has positions.
    pub fn sample(&self, asset: &ModelAsset) -> Result<SampledGeometry, SamplerError> {
        if let Some(mesh) = self
            .dedicated_mesh
            .as_deref()
            .and_then(|name| asset.mesh(name))
            .filter(|mesh| mesh.has_geometry())
        {
            log::info!(
                "using dedicated mesh '{}' of '{}' ({} vertices)",
                mesh.name,
                asset.handle,
                mesh.vertex_count()
            );
            return Ok(sample_dedicated(mesh));
        }

        let meshes: Vec<&SourceMesh> = asset.meshes.iter().filter(|m| m.has_geometry()).collect();
        if meshes.is_empty() {
            log::error!("no geometry found in model '{}'", asset.handle);
            return Err(SamplerError::NoGeometry {
                asset: asset.handle.to_string(),
            });
        }

        let total: usize = meshes.iter().map(|m| m.vertex_count()).sum();
        log::info!(
            "merging {} meshes of '{}' with {} vertices in total",
            meshes.len(),
            asset.handle,
            total
        );

        let mut positions = Vec::with_capacity(total);
        let mut colors = Vec::with_capacity(total);
        for (mesh_index, mesh) in meshes.iter().enumerate() {
            let mesh_colors = MeshColors::resolve(mesh, true);
            log::debug!(
                "mesh {} ({}): texture = {}, material color = {:?}",
                mesh_index,
                mesh.name,
                if mesh_colors.is_textured() { "yes" } else { "no" },
                mesh.material.as_ref().and_then(|m| m.fallback_color())
            );

            positions.extend(
                mesh.positions
                    .iter()
                    .map(|&p| mesh.world_transform.transform_point3(p)),
            );
            colors.extend((0..mesh.vertex_count()).map(|i| mesh_colors.color(i)));
        }

        log::info!("merged {} meshes into {} points", meshes.len(), positions.len());
        Ok(SampledGeometry { positions, colors })
    }
}

fn sample_dedicated(mesh: &SourceMesh) -> SampledGeometry {
    let colors = MeshColors::resolve(mesh, false);
    SampledGeometry {
        positions: mesh.positions.clone(),
        colors: (0..mesh.vertex_count()).map(|i| colors.color(i)).collect(),
    }
}

/// Color sources of one mesh, resolved once before its vertices are visited.
struct MeshColors<'a> {
    texture: Option<(&'a SourceTexture, &'a [Vec2])>,
    vertex: Option<&'a [Vec4]>,
    flat: Vec4,
}

impl<'a> MeshColors<'a> {
    fn resolve(mesh: &'a SourceMesh, allow_texture: bool) -> Self {
        Self {
            texture: if allow_texture { mesh_texture(mesh) } else { None },
            vertex: vertex_colors(mesh),
            flat: flat_color(mesh),
        }
    }

    fn is_textured(&self) -> bool {
        self.texture.is_some()
    }

    /// Baked color of `vertex`. Alpha is always 1.
    fn color(&self, vertex: usize) -> Vec4 {
        let sampled = self
            .texture
            .and_then(|(map, uvs)| map.sample_nearest(uvs[vertex]));
        if let Some(rgb) = sampled {
            return rgb.extend(1.0);
        }
        if let Some(colors) = self.vertex {
            return colors[vertex].truncate().extend(1.0);
        }
        self.flat
    }
}

/// The mesh's texture and UVs, if the texture is readable and every vertex
/// has a UV.
fn mesh_texture(mesh: &SourceMesh) -> Option<(&SourceTexture, &[Vec2])> {
    let map = mesh.material.as_ref().and_then(|m| m.map.as_deref())?;
    match &mesh.uvs {
        Some(uvs) if uvs.len() == mesh.vertex_count() => {
            map.pixels()?;
            Some((map, uvs.as_slice()))
        }
        _ => {
            log::warn!(
                "mesh '{}' has texture '{}' but no usable UVs, falling back to material color",
                mesh.name,
                map.name()
            );
            None
        }
    }
}

fn vertex_colors(mesh: &SourceMesh) -> Option<&[Vec4]> {
    match &mesh.colors {
        Some(colors) if colors.len() == mesh.vertex_count() => Some(colors),
        Some(colors) => {
            log::warn!(
                "mesh '{}' has {} colors for {} vertices, ignoring them",
                mesh.name,
                colors.len(),
                mesh.vertex_count()
            );
            None
        }
        None => None,
    }
}

fn flat_color(mesh: &SourceMesh) -> Vec4 {
    mesh.material
        .as_ref()
        .and_then(|m| m.fallback_color())
        .unwrap_or(Vec3::ONE)
        .extend(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::SourceMaterial;
    use glam::Mat4;
    use std::cell::Cell;
    use std::sync::{Arc, Once};

    thread_local! {
        static WARNINGS: Cell<usize> = const { Cell::new(0) };
    }

    /// Counts warnings logged on the current thread.
    struct WarningCounter;

    impl log::Log for WarningCounter {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                WARNINGS.with(|w| w.set(w.get() + 1));
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: WarningCounter = WarningCounter;
    static INIT: Once = Once::new();

    fn count_warnings<T>(f: impl FnOnce() -> T) -> (T, usize) {
        INIT.call_once(|| {
            if log::set_logger(&LOGGER).is_ok() {
                log::set_max_level(log::LevelFilter::Warn);
            }
        });
        WARNINGS.with(|w| w.set(0));
        let out = f();
        (out, WARNINGS.with(|w| w.get()))
    }

    fn line(name: &str, count: usize) -> SourceMesh {
        SourceMesh::new(name, (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect())
    }

    #[test]
    fn test_no_geometry_is_an_error() {
        let asset = ModelAsset::new("empty.glb").with_mesh(SourceMesh::new("hull", Vec::new()));
        let err = GeometrySampler::new().sample(&asset).unwrap_err();
        assert_eq!(
            err,
            SamplerError::NoGeometry {
                asset: "empty.glb".into()
            }
        );
    }

    #[test]
    fn test_merge_keeps_concatenation_order() {
        let asset = ModelAsset::new("pair")
            .with_mesh(line("a", 3))
            .with_mesh(SourceMesh::new("skipped", Vec::new()))
            .with_mesh(line("b", 2).with_transform(Mat4::from_translation(Vec3::Y)));
        let geo = GeometrySampler::new().sample(&asset).unwrap();

        assert_eq!(geo.len(), 5);
        assert_eq!(geo.positions()[2], Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(geo.positions()[3], Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(geo.positions()[4], Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_merge_applies_full_world_transform() {
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, 0.0, 5.0),
        );
        let asset = ModelAsset::new("m").with_mesh(line("a", 2).with_transform(transform));
        let geo = GeometrySampler::new().sample(&asset).unwrap();

        let p = geo.positions()[1];
        assert!((p - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_merge_color_priority() {
        let texture = Arc::new(SourceTexture::from_rgba("red", vec![255, 0, 0, 255], 1, 1));
        let broken = Arc::new(SourceTexture::from_file("missing/texture.png"));
        let asset = ModelAsset::new("colors")
            .with_mesh(
                line("textured", 1)
                    .with_uvs(vec![Vec2::splat(0.5)])
                    .with_material(SourceMaterial::textured(texture)),
            )
            .with_mesh(
                line("broken", 1)
                    .with_uvs(vec![Vec2::splat(0.5)])
                    .with_material(SourceMaterial {
                        color: Some(Vec3::new(0.0, 0.5, 0.0)),
                        emissive: None,
                        map: Some(broken),
                    }),
            )
            .with_mesh(line("vertex", 1).with_colors(vec![Vec4::new(0.2, 0.3, 0.4, 0.5)]))
            .with_mesh(line("emissive", 1).with_material(SourceMaterial::default().with_emissive(Vec3::Z)))
            .with_mesh(line("plain", 1));
        let geo = GeometrySampler::new().sample(&asset).unwrap();

        assert_eq!(geo.colors()[0], Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(geo.colors()[1], Vec4::new(0.0, 0.5, 0.0, 1.0));
        assert_eq!(geo.colors()[2], Vec4::new(0.2, 0.3, 0.4, 1.0));
        assert_eq!(geo.colors()[3], Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(geo.colors()[4], Vec4::ONE);
    }

    #[test]
    fn test_texture_without_uvs_falls_back() {
        let texture = Arc::new(SourceTexture::from_rgba("red", vec![255, 0, 0, 255], 1, 1));
        let asset = ModelAsset::new("m").with_mesh(
            line("a", 2).with_material(SourceMaterial::textured(texture).with_emissive(Vec3::Y)),
        );
        let geo = GeometrySampler::new().sample(&asset).unwrap();
        assert_eq!(geo.colors()[0], Vec4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn test_dedicated_mesh_used_alone_and_untransformed() {
        let asset = ModelAsset::new("boat.glb")
            .with_mesh(line("sail", 4))
            .with_mesh(
                line("boat", 3)
                    .with_indices(vec![0, 1, 2, 2, 1, 0])
                    .with_transform(Mat4::from_translation(Vec3::splat(10.0)))
                    .with_colors(vec![Vec4::X, Vec4::Y, Vec4::Z]),
            );
        let geo = GeometrySampler::new()
            .with_dedicated_mesh("boat")
            .sample(&asset)
            .unwrap();

        assert_eq!(geo.len(), 3);
        assert_eq!(geo.positions()[1], Vec3::new(1.0, 0.0, 0.0));
        // Alpha is forced to 1 on both paths.
        assert_eq!(geo.colors()[2], Vec4::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_mismatched_vertex_colors_warn_once_per_mesh() {
        let asset = ModelAsset::new("m")
            .with_mesh(line("short", 5000).with_colors(vec![Vec4::X, Vec4::Y, Vec4::Z]))
            .with_mesh(line("fine", 10));
        let (geo, warnings) = count_warnings(|| GeometrySampler::new().sample(&asset).unwrap());

        assert_eq!(geo.len(), 5010);
        assert_eq!(geo.colors()[4999], Vec4::ONE);
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_dedicated_vertex_alpha_is_opaque() {
        let asset = ModelAsset::new("m").with_mesh(
            line("glass", 2).with_colors(vec![Vec4::new(0.1, 0.2, 0.3, 0.25), Vec4::splat(0.0)]),
        );
        let geo = GeometrySampler::new()
            .with_dedicated_mesh("glass")
            .sample(&asset)
            .unwrap();
        assert_eq!(geo.colors()[0], Vec4::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(geo.colors()[1], Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_missing_dedicated_mesh_merges() {
        let asset = ModelAsset::new("m").with_mesh(line("a", 2)).with_mesh(line("b", 2));
        let geo = GeometrySampler::new()
            .with_dedicated_mesh("boat")
            .sample(&asset)
            .unwrap();
        assert_eq!(geo.len(), 4);
    }
}
