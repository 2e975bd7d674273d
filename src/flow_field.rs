//! Flow fields and the particle update rule.
//!
//! A [`FlowField`] is a pure function `(position, time, frequency) -> vector`
//! written twice: once in Rust and once as WGSL. The WGSL half is spliced
//! into the compute shader; the Rust half drives the reference backend.
//! [`advance`] is the host copy of the per-texel update the compute shader
//! runs.

use glam::Vec3;

use crate::noise::{noise3, NOISE_WGSL};
use crate::state::Texel;
use crate::uniforms::SimulationUniforms;

/// A deterministic vector field that steers particles.
///
/// Implementations must keep [`sample`](FlowField::sample) and
/// [`wgsl`](FlowField::wgsl) in agreement.
pub trait FlowField: Send + Sync {
    /// Raw field vector at `position`. Only its direction is used.
    fn sample(&self, position: Vec3, time: f32, frequency: f32) -> Vec3;

    /// WGSL defining
    /// `fn flow_field(position: vec3<f32>, time: f32, frequency: f32) -> vec3<f32>`
    /// and any helpers it needs.
    fn wgsl(&self) -> String;
}

/// Three decorrelated simplex noise channels, slowly drifting over time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexFlowField {
    /// How fast the field drifts.
    pub time_scale: f32,
}

impl Default for SimplexFlowField {
    fn default() -> Self {
        Self { time_scale: 0.2 }
    }
}

impl FlowField for SimplexFlowField {
    fn sample(&self, position: Vec3, time: f32, frequency: f32) -> Vec3 {
        let t = time * self.time_scale;
        let p = position * frequency;
        let drift = Vec3::new(t, -t, t * 0.5);
        Vec3::new(
            noise3(p + drift),
            noise3(p + drift + Vec3::splat(1.0)),
            noise3(p + drift + Vec3::splat(2.0)),
        )
    }

    fn wgsl(&self) -> String {
        format!(
            r#"{noise}
fn flow_field(position: vec3<f32>, time: f32, frequency: f32) -> vec3<f32> {{
    let t = time * {time_scale:.6};
    let p = position * frequency;
    let drift = vec3<f32>(t, -t, t * 0.5);
    return vec3<f32>(
        noise3(p + drift),
        noise3(p + drift + vec3<f32>(1.0)),
        noise3(p + drift + vec3<f32>(2.0)),
    );
}}
"#,
            noise = NOISE_WGSL,
            time_scale = self.time_scale
        )
    }
}

/// Unit direction of `v`, or zero where the field vanishes.
pub fn direction(v: Vec3) -> Vec3 {
    let len = v.length();
    if len > 1e-6 {
        v / len
    } else {
        Vec3::ZERO
    }
}

/// One update step for one live particle.
///
/// The phase drops by `delta_time * decay_rate`. Once it goes negative the
/// particle wraps back into `[0, 1)` and returns to its base position;
/// otherwise it moves `delta_time * influence * strength` along the field.
pub fn advance(
    field: &dyn FlowField,
    particle: Texel,
    base: Texel,
    uniforms: &SimulationUniforms,
) -> Texel {
    let phase = particle.phase - uniforms.delta_time * uniforms.decay_rate;
    if phase < 0.0 {
        return Texel::new(base.position(), wrap_phase(phase));
    }

    let position = particle.position();
    let flow = field.sample(position, uniforms.time, uniforms.flow_field_frequency);
    let step = uniforms.delta_time * uniforms.flow_field_influence * uniforms.flow_field_strength;
    Texel::new(position + direction(flow) * step, phase)
}

/// `fract`, kept strictly below 1 for tiny negative inputs.
fn wrap_phase(phase: f32) -> f32 {
    let wrapped = phase - phase.floor();
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}
