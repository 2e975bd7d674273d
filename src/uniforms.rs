//! Uniform blocks shared by the host and the shaders.
//!
//! Both structs are `#[repr(C)]` and padded to 16 bytes so they can be
//! uploaded with `bytemuck::bytes_of`. Field order must match the WGSL
//! structs in [`crate::gpu::shaders`].

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

use crate::config::FlowFieldParams;

/// Per-step parameters of the particle update.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct SimulationUniforms {
    pub time: f32,
    pub delta_time: f32,
    pub flow_field_influence: f32,
    pub flow_field_strength: f32,
    pub flow_field_frequency: f32,
    pub decay_rate: f32,
    /// Live particles; texels at or past this index are never updated.
    pub particle_count: u32,
    /// State image side.
    pub size: u32,
}

impl SimulationUniforms {
    pub fn new(particle_count: u32, size: u32, decay_rate: f32) -> Self {
        Self {
            decay_rate,
            particle_count,
            size,
            ..Default::default()
        }
    }

    /// Refresh the per-frame values.
    pub fn set_frame(&mut self, time: f32, delta_time: f32, params: &FlowFieldParams) {
        self.time = time;
        self.delta_time = delta_time;
        self.flow_field_influence = params.influence;
        self.flow_field_strength = params.strength;
        self.flow_field_frequency = params.frequency;
    }

    /// Largest distance a particle can move in one step.
    pub fn max_step(&self) -> f32 {
        self.delta_time * self.flow_field_influence * self.flow_field_strength
    }
}

/// Per-frame parameters of the sprite pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct RenderUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// Placement of the point set.
    pub model: [[f32; 4]; 4],
    /// Drawing buffer size in physical pixels.
    pub resolution: [f32; 2],
    pub particle_size: f32,
    /// State image side, for turning UVs back into texel coordinates.
    pub state_size: u32,
}

impl RenderUniforms {
    pub fn new(model: Mat4, state_size: u32) -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            resolution: [1.0, 1.0],
            particle_size: FlowFieldParams::default().particle_size,
            state_size,
        }
    }

    pub fn resolution(&self) -> Vec2 {
        Vec2::from_array(self.resolution)
    }

    pub fn model(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }

    pub fn view_proj(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_proj)
    }
}

/// Device pixel ratios above this are clamped.
pub const MAX_PIXEL_RATIO: f32 = 2.0;

/// Window size and pixel density, as pushed on resize.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    /// Logical width.
    pub width: f32,
    /// Logical height.
    pub height: f32,
    pub pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
        }
    }

    /// Build from a physical size and its scale factor.
    pub fn from_physical(width: u32, height: u32, scale_factor: f64) -> Self {
        let ratio = scale_factor.max(f64::MIN_POSITIVE);
        Self::new(
            (width as f64 / ratio) as f32,
            (height as f64 / ratio) as f32,
            scale_factor as f32,
        )
    }

    /// The resolution uniform: size times the clamped pixel ratio.
    pub fn resolution(&self) -> Vec2 {
        Vec2::new(self.width, self.height) * self.pixel_ratio.min(MAX_PIXEL_RATIO)
    }
}
