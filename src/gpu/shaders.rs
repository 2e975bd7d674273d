//! WGSL programs for the compute and render passes.
//!
//! The uniform structs mirror [`crate::uniforms`] field for field.

use crate::flow_field::FlowField;

/// Compute workgroup side; the pass is dispatched over the state image in
/// 8x8 tiles.
pub const WORKGROUP_SIZE: u32 = 8;

const COMPUTE_HEADER: &str = r#"
struct SimParams {
    time: f32,
    delta_time: f32,
    flow_field_influence: f32,
    flow_field_strength: f32,
    flow_field_frequency: f32,
    decay_rate: f32,
    particle_count: u32,
    size: u32,
};

@group(0) @binding(0) var<uniform> params: SimParams;
@group(0) @binding(1) var previous_state: texture_2d<f32>;
@group(0) @binding(2) var base_state: texture_2d<f32>;
@group(0) @binding(3) var next_state: texture_storage_2d<rgba32float, write>;
"#;

const COMPUTE_MAIN: &str = r#"
@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if id.x >= params.size || id.y >= params.size {
        return;
    }
    // Padding texels past the particle count are never touched.
    if id.y * params.size + id.x >= params.particle_count {
        return;
    }

    let coord = vec2<i32>(id.xy);
    let particle = textureLoad(previous_state, coord, 0);

    var phase = particle.a - params.delta_time * params.decay_rate;
    if phase < 0.0 {
        phase = fract(phase);
        if phase >= 1.0 {
            phase = 0.0;
        }
        let origin = textureLoad(base_state, coord, 0);
        textureStore(next_state, coord, vec4<f32>(origin.xyz, phase));
        return;
    }

    let flow = flow_field(particle.xyz, params.time, params.flow_field_frequency);
    let len = length(flow);
    var direction = vec3<f32>(0.0);
    if len > 1e-6 {
        direction = flow / len;
    }
    let travel = params.delta_time * params.flow_field_influence * params.flow_field_strength;
    textureStore(next_state, coord, vec4<f32>(particle.xyz + direction * travel, phase));
}
"#;

/// The state update program, with `field` spliced in.
pub fn compute_shader(field: &dyn FlowField) -> String {
    format!("{}\n{}\n{}", COMPUTE_HEADER, field.wgsl(), COMPUTE_MAIN)
}

/// The sprite program. One instance per point, six vertices per sprite.
pub const RENDER_SHADER: &str = r#"
struct RenderParams {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    resolution: vec2<f32>,
    particle_size: f32,
    state_size: u32,
};

@group(0) @binding(0) var<uniform> view: RenderParams;
@group(0) @binding(1) var particle_state: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) corner: vec2<f32>,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) particle_uv: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) size: f32,
) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
    );
    let corner = corners[vertex_index];

    let last = i32(view.state_size) - 1;
    let texel = min(vec2<i32>(floor(particle_uv * f32(view.state_size))), vec2<i32>(last));
    let particle = textureLoad(particle_state, texel, 0);

    var clip = view.view_proj * view.model * vec4<f32>(particle.xyz, 1.0);

    // Grow in after a respawn, shrink away before the next.
    let life = 1.0 - particle.a;
    let grow = smoothstep(0.0, 0.1, life);
    let shrink = 1.0 - smoothstep(0.7, 1.0, life);

    // Diameter in pixels is size * particle_size * resolution.y / depth;
    // the clip-space half extent below divides by w on its own.
    let extent = size * view.particle_size * min(grow, shrink);
    let aspect = view.resolution.y / max(view.resolution.x, 1.0);
    clip.x += corner.x * extent * aspect;
    clip.y += corner.y * extent;

    var out: VertexOutput;
    out.clip_position = clip;
    out.color = color;
    out.corner = corner;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    if dot(in.corner, in.corner) > 1.0 {
        discard;
    }
    return in.color;
}
"#;
