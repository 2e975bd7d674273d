//! # meshdust - mesh-driven GPGPU particles
//!
//! Turns any mesh into a cloud of points that drift through a 3D simplex
//! flow field, fade out, and respawn on the surface they came from.
//!
//! ## Quick Start
//!
//! ```
//! use meshdust::prelude::*;
//!
//! let asset = ModelAsset::new("ball").with_mesh(primitives::uv_sphere("ball", 1.0, 16, 8));
//!
//! let mut system = ParticleSystem::new(ParticleConfig::new("ball"), CpuBackend::new())
//!     .with_params(FlowFieldParams::default().with_influence(0.8));
//!
//! system.on_asset(&asset).unwrap();
//! system.resize(Viewport::new(1280.0, 720.0, 1.0));
//!
//! let mut time = Time::new();
//! for _ in 0..10 {
//!     time.advance(1.0 / 60.0);
//!     system.frame(&time, Mat4::IDENTITY);
//!     let mut points = Vec::new();
//!     system.draw(&mut points);
//! }
//! ```
//!
//! ## How it works
//!
//! ### Sampling
//!
//! Every mesh of the delivered [`ModelAsset`](mesh::ModelAsset) that carries
//! positions is flattened into one point list, in mesh order, together with
//! a color per point taken from the mesh's texture, vertex colors or
//! material. See [`geometry`].
//!
//! ### State
//!
//! Points are packed into a square RGBA float image, one texel each:
//! position in `rgb`, a random lifecycle phase in `a`. The image is the
//! smallest square that fits them all; the tail of the image is
//! padding. See [`state`].
//!
//! ### Update
//!
//! Each frame reads one state image and writes the other. A point moves
//! along the normalized flow field direction until its phase runs out, then
//! returns to its base position with a fresh phase. See [`flow_field`] and
//! [`compute`].
//!
//! ### Drawing
//!
//! One sprite per point, placed by looking up its texel in the image just
//! written, sized by perspective and faded in and out over its lifetime.
//! See [`render`].
//!
//! ## Backends
//!
//! [`ParticleBackend`](compute::ParticleBackend) owns the images and does
//! the work. [`gpu::GpuBackend`] runs both passes in wgpu;
//! [`reference::CpuBackend`] runs the same update on the host and draws
//! into a list of points, which is what the tests use.

pub mod compute;
pub mod config;
pub mod error;
pub mod flow_field;
pub mod geometry;
pub mod gpu;
pub mod mesh;
pub mod noise;
pub mod reference;
pub mod render;
pub mod state;
pub mod system;
pub mod textures;
pub mod time;
pub mod uniforms;
pub mod uv_map;

pub use bytemuck;
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// Prelude module for convenient imports.
///
/// ```
/// use meshdust::prelude::*;
/// ```
pub mod prelude {
    pub use crate::compute::{InitOutcome, ParticleBackend, StateSlot};
    pub use crate::config::{FlowFieldParams, ParticleConfig};
    pub use crate::error::{ConfigError, GpuError, InitError, SamplerError};
    pub use crate::flow_field::{FlowField, SimplexFlowField};
    pub use crate::gpu::{Camera, GpuBackend, GpuContext, RenderTarget};
    pub use crate::mesh::{primitives, AssetHandle, ModelAsset, SourceMaterial, SourceMesh};
    pub use crate::reference::CpuBackend;
    pub use crate::render::RenderedPoint;
    pub use crate::system::{ParticleSystem, SystemState};
    pub use crate::textures::SourceTexture;
    pub use crate::time::Time;
    pub use crate::uniforms::Viewport;
    pub use crate::{Mat4, Quat, Vec2, Vec3, Vec4};
}
