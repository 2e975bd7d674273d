//! Model assets handed to a particle system by the asset loader.
//!
//! Decoding model files is the loader's job. meshdust only needs what a
//! decoded model exposes: named sub-meshes with their vertex buffers,
//! material and world transform. [`primitives`] builds a few procedural
//! ones.

pub mod primitives;

use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::textures::SourceTexture;

/// Identity of a model resource, e.g. its path.
///
/// A particle system is built for one handle and only initializes from an
/// asset carrying that handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetHandle(String);

impl AssetHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AssetHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Surface description of a source mesh.
#[derive(Debug, Clone, Default)]
pub struct SourceMaterial {
    /// Flat base color (linear RGB).
    pub color: Option<Vec3>,
    /// Emissive color, used when there is no base color.
    pub emissive: Option<Vec3>,
    /// Base color texture, sampled through the mesh UVs.
    pub map: Option<Arc<SourceTexture>>,
}

impl SourceMaterial {
    /// A material with only a flat color.
    pub fn flat(color: Vec3) -> Self {
        Self {
            color: Some(color),
            ..Default::default()
        }
    }

    /// A material with a base color texture.
    pub fn textured(map: Arc<SourceTexture>) -> Self {
        Self {
            map: Some(map),
            ..Default::default()
        }
    }

    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive = Some(emissive);
        self
    }

    /// The flat fallback color: base color, then emissive.
    pub fn fallback_color(&self) -> Option<Vec3> {
        self.color.or(self.emissive)
    }
}

/// One sub-mesh of a model.
#[derive(Debug, Clone)]
pub struct SourceMesh {
    pub name: String,
    /// Vertex positions in mesh-local space.
    pub positions: Vec<Vec3>,
    /// Index buffer. Ignored: every vertex becomes one particle.
    pub indices: Option<Vec<u32>>,
    /// Per-vertex RGBA colors.
    pub colors: Option<Vec<Vec4>>,
    /// Per-vertex texture coordinates.
    pub uvs: Option<Vec<Vec2>>,
    pub material: Option<SourceMaterial>,
    /// Full world transform, parents included.
    pub world_transform: Mat4,
}

impl SourceMesh {
    /// Create a mesh with positions only and an identity transform.
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            positions,
            indices: None,
            colors: None,
            uvs: None,
            material: None,
            world_transform: Mat4::IDENTITY,
        }
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_colors(mut self, colors: Vec<Vec4>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn with_material(mut self, material: SourceMaterial) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_transform(mut self, world_transform: Mat4) -> Self {
        self.world_transform = world_transform;
        self
    }

    /// Whether this mesh contributes any points.
    pub fn has_geometry(&self) -> bool {
        !self.positions.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// A decoded model: a handle plus its sub-meshes in scene order.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub handle: AssetHandle,
    pub meshes: Vec<SourceMesh>,
}

impl ModelAsset {
    pub fn new(handle: impl Into<AssetHandle>) -> Self {
        Self {
            handle: handle.into(),
            meshes: Vec::new(),
        }
    }

    pub fn with_mesh(mut self, mesh: SourceMesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// Find a sub-mesh by name.
    pub fn mesh(&self, name: &str) -> Option<&SourceMesh> {
        self.meshes.iter().find(|m| m.name == name)
    }
}
