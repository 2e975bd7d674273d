//! Host-side reference backend.
//!
//! [`CpuBackend`] runs the same update rule as the compute shader, with the
//! Rust half of the flow field, over state images in host memory. Its draws
//! produce a list of [`RenderedPoint`]s instead of pixels. It exists for
//! tests and for checking a scene without a GPU.

use std::sync::Arc;

use crate::compute::{ParticleBackend, PingPong, StateSlot};
use crate::flow_field::{advance, FlowField, SimplexFlowField};
use crate::render::{sprite_pixels, RenderGeometry, RenderedPoint};
use crate::state::{StateImage, MAX_STATE_SIZE};
use crate::uniforms::{RenderUniforms, SimulationUniforms};

struct HostState {
    images: PingPong<StateImage>,
    base: StateImage,
}

/// A [`ParticleBackend`] that keeps everything in host memory.
pub struct CpuBackend {
    field: Arc<dyn FlowField>,
    state: Option<HostState>,
    drawable: Option<RenderGeometry>,
    max_state_size: u32,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    /// A backend using the default simplex flow field.
    pub fn new() -> Self {
        Self::with_flow_field(Arc::new(SimplexFlowField::default()))
    }

    pub fn with_flow_field(field: Arc<dyn FlowField>) -> Self {
        Self {
            field,
            state: None,
            drawable: None,
            max_state_size: MAX_STATE_SIZE,
        }
    }

    /// Cap the state image side, as a device with a smaller texture limit
    /// would.
    pub fn with_max_state_size(mut self, size: u32) -> Self {
        self.max_state_size = size;
        self
    }

    pub fn flow_field(&self) -> &Arc<dyn FlowField> {
        &self.field
    }

    /// Both state images, indexed by slot.
    pub fn images(&self) -> Option<&[StateImage; 2]> {
        self.state.as_ref().map(|s| s.images.buffers())
    }

    pub fn image(&self, slot: StateSlot) -> Option<&StateImage> {
        self.state.as_ref().map(|s| s.images.get(slot))
    }

    /// The image written last.
    pub fn current_image(&self) -> Option<&StateImage> {
        self.state.as_ref().map(|s| s.images.current())
    }

    /// The initial state that respawning particles return to.
    pub fn base_image(&self) -> Option<&StateImage> {
        self.state.as_ref().map(|s| &s.base)
    }

    pub fn drawable(&self) -> Option<&RenderGeometry> {
        self.drawable.as_ref()
    }
}

impl ParticleBackend for CpuBackend {
    type DrawTarget<'a> = Vec<RenderedPoint>;

    fn allocate_state(&mut self, initial: &StateImage) -> StateSlot {
        let images = PingPong::new(initial.clone(), initial.clone());
        let slot = images.current_slot();
        self.state = Some(HostState {
            images,
            base: initial.clone(),
        });
        slot
    }

    fn compute(&mut self, uniforms: &SimulationUniforms) -> Option<StateSlot> {
        let field = self.field.as_ref();
        let state = self.state.as_mut()?;
        let count = uniforms.particle_count as usize;

        let (read, write) = state.images.split();
        let live = read
            .texels()
            .iter()
            .zip(state.base.texels())
            .take(count);
        for (out, (&particle, &base)) in write.texels_mut().iter_mut().zip(live) {
            *out = advance(field, particle, base, uniforms);
        }

        state.images.swap();
        Some(state.images.current_slot())
    }

    fn allocate_drawable(&mut self, drawable: &RenderGeometry) {
        self.drawable = Some(drawable.clone());
    }

    fn draw(&self, source: StateSlot, uniforms: &RenderUniforms, target: &mut Vec<RenderedPoint>) {
        let (Some(state), Some(drawable)) = (&self.state, &self.drawable) else {
            log::warn!("draw on a reference backend with nothing allocated");
            return;
        };

        let image = state.images.get(source);
        let model = uniforms.model();
        let view_proj = uniforms.view_proj();
        let resolution_y = uniforms.resolution[1];

        let points = drawable.uv_map().uvs().iter().enumerate();
        target.extend(points.map(|(index, &uv)| {
            let coord = drawable.uv_map().texel_of(uv);
            let texel = image.texel(coord.x, coord.y);
            let position = model.transform_point3(texel.position());
            let clip = view_proj * position.extend(1.0);
            RenderedPoint {
                index: index as u32,
                position,
                color: drawable.colors()[index],
                size: sprite_pixels(
                    drawable.sizes()[index],
                    uniforms.particle_size,
                    resolution_y,
                    texel.phase,
                    clip.w,
                ),
                phase: texel.phase,
            }
        }));
    }

    fn max_state_size(&self) -> u32 {
        self.max_state_size
    }
}
