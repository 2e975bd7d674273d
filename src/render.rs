//! The drawable point set and the render stage.
//!
//! A [`RenderGeometry`] is built once per system: N points, each with a UV
//! into the state image, a baked color and a random size. Positions are not
//! stored; the vertex shader reads them from whatever state image the
//! [`RenderStage`] was bound to this frame.

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use rand::Rng;

use crate::compute::StateSlot;
use crate::geometry::SampledGeometry;
use crate::uniforms::{RenderUniforms, Viewport};
use crate::uv_map::UvMap;

/// Static per-point attributes of a particle system.
#[derive(Debug, Clone)]
pub struct RenderGeometry {
    geometry: Arc<SampledGeometry>,
    uv_map: Arc<UvMap>,
    sizes: Arc<[f32]>,
}

impl RenderGeometry {
    /// Build the drawable for `geometry` on a `state_size` grid.
    pub fn new(geometry: Arc<SampledGeometry>, state_size: u32) -> Self {
        Self::with_rng(geometry, state_size, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng>(geometry: Arc<SampledGeometry>, state_size: u32, rng: &mut R) -> Self {
        let count = geometry.len() as u32;
        let uv_map = Arc::new(UvMap::new(count, state_size));
        let sizes = (0..count).map(|_| rng.gen::<f32>()).collect();
        Self {
            geometry,
            uv_map,
            sizes,
        }
    }

    /// Number of points drawn. Padding texels are not part of it.
    pub fn point_count(&self) -> u32 {
        self.uv_map.len() as u32
    }

    pub fn uv_map(&self) -> &Arc<UvMap> {
        &self.uv_map
    }

    /// Baked RGBA color per point.
    pub fn colors(&self) -> &[Vec4] {
        self.geometry.colors()
    }

    /// Size multiplier per point, in `[0, 1)`.
    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    /// The point set must never be frustum culled: its bounds live on the GPU.
    pub fn frustum_culled(&self) -> bool {
        false
    }

    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.colors())
    }

    pub fn size_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.sizes[..])
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Sprite scale from the decay phase: grows in right after a respawn and
/// shrinks away before the next one.
pub fn lifecycle_fade(phase: f32) -> f32 {
    let life = 1.0 - phase;
    let grow = smoothstep(0.0, 0.1, life);
    let shrink = 1.0 - smoothstep(0.7, 1.0, life);
    grow.min(shrink)
}

/// Sprite diameter in pixels: `size * particle_size * resolution.y / depth`,
/// faded by the lifecycle. Points at or behind the eye get 0.
pub fn sprite_pixels(size: f32, particle_size: f32, resolution_y: f32, phase: f32, depth: f32) -> f32 {
    if depth <= 0.0 {
        return 0.0;
    }
    size * particle_size * resolution_y * lifecycle_fade(phase) / depth
}

/// One point as produced by a draw of the reference backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedPoint {
    pub index: u32,
    /// World-space position.
    pub position: Vec3,
    pub color: Vec4,
    /// Sprite diameter in pixels.
    pub size: f32,
    pub phase: f32,
}

/// Render-side half of a particle system.
///
/// Holds the drawable, the render uniforms and, between the bind and the
/// draw of one frame, the state image to draw from.
#[derive(Debug)]
pub struct RenderStage {
    geometry: RenderGeometry,
    uniforms: RenderUniforms,
    source: Option<StateSlot>,
}

impl RenderStage {
    pub fn new(geometry: RenderGeometry, state_size: u32, transform: Mat4) -> Self {
        Self {
            geometry,
            uniforms: RenderUniforms::new(transform, state_size),
            source: None,
        }
    }

    pub fn geometry(&self) -> &RenderGeometry {
        &self.geometry
    }

    pub fn uniforms(&self) -> &RenderUniforms {
        &self.uniforms
    }

    /// Update the resolution uniform. Nothing else changes.
    pub fn resize(&mut self, viewport: &Viewport) {
        self.uniforms.resolution = viewport.resolution().to_array();
    }

    /// Refresh the camera and sprite size for this frame.
    pub fn set_frame(&mut self, view_proj: Mat4, particle_size: f32) {
        self.uniforms.view_proj = view_proj.to_cols_array_2d();
        self.uniforms.particle_size = particle_size;
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.uniforms.model = transform.to_cols_array_2d();
    }

    /// Use `slot` as this frame's state source.
    pub fn bind(&mut self, slot: StateSlot) {
        self.source = Some(slot);
    }

    pub fn source(&self) -> Option<StateSlot> {
        self.source
    }

    /// Drop the frame's state source; it is not valid past the frame.
    pub fn end_frame(&mut self) -> Option<StateSlot> {
        self.source.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::gpu_size;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn geometry(count: usize) -> Arc<SampledGeometry> {
        Arc::new(SampledGeometry::new(
            vec![Vec3::ZERO; count],
            (0..count).map(|i| Vec4::new(i as f32, 0.0, 0.0, 1.0)).collect(),
        ))
    }

    #[test]
    fn test_render_geometry_attributes() {
        let drawable = RenderGeometry::with_rng(geometry(1683), gpu_size(1683), &mut StdRng::seed_from_u64(1));
        assert_eq!(drawable.point_count(), 1683);
        assert_eq!(drawable.sizes().len(), 1683);
        assert_eq!(drawable.colors()[10], Vec4::new(10.0, 0.0, 0.0, 1.0));
        assert!(drawable.sizes().iter().all(|s| (0.0..1.0).contains(s)));
        assert!(!drawable.frustum_culled());
        assert_eq!(drawable.color_bytes().len(), 1683 * 16);
        assert_eq!(drawable.size_bytes().len(), 1683 * 4);
    }

    #[test]
    fn test_lifecycle_fade() {
        assert_eq!(lifecycle_fade(1.0), 0.0);
        assert_eq!(lifecycle_fade(0.5), 1.0);
        assert!(lifecycle_fade(0.0) < 1e-5);
        assert!(lifecycle_fade(0.95) > 0.0 && lifecycle_fade(0.95) < 1.0);
    }

    #[test]
    fn test_sprite_pixels() {
        let near = sprite_pixels(0.5, 0.9, 1000.0, 0.5, 5.0);
        let far = sprite_pixels(0.5, 0.9, 1000.0, 0.5, 10.0);
        assert!((near - 90.0).abs() < 1e-3);
        assert!((far - 45.0).abs() < 1e-3);
        assert_eq!(sprite_pixels(0.5, 0.9, 1000.0, 0.5, -1.0), 0.0);
    }

    #[test]
    fn test_resize_changes_only_resolution() {
        let drawable = RenderGeometry::new(geometry(4), 2);
        let mut stage = RenderStage::new(drawable, 2, Mat4::from_translation(Vec3::X));
        stage.set_frame(Mat4::from_scale(Vec3::splat(2.0)), 0.9);
        let before = *stage.uniforms();

        stage.resize(&Viewport::new(640.0, 480.0, 3.0));

        let after = *stage.uniforms();
        assert_eq!(after.resolution, [1280.0, 960.0]);
        assert_eq!(after.view_proj, before.view_proj);
        assert_eq!(after.model, before.model);
        assert_eq!(after.particle_size, before.particle_size);
        assert_eq!(after.state_size, before.state_size);
    }

    #[test]
    fn test_source_is_dropped_at_frame_end() {
        let mut stage = RenderStage::new(RenderGeometry::new(geometry(1), 1), 1, Mat4::IDENTITY);
        assert_eq!(stage.source(), None);
        stage.bind(StateSlot::FRONT);
        assert_eq!(stage.end_frame(), Some(StateSlot::FRONT));
        assert_eq!(stage.source(), None);
    }
}
