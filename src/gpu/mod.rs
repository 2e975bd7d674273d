//! wgpu backend.
//!
//! Particle state lives in three `rgba32float` textures per system: two that
//! ping-pong through the update pass and one holding the base positions
//! respawned particles return to. The sprite pass reads whichever texture
//! the last update wrote, as an instanced quad per point.
//!
//! A [`GpuContext`] is shared by every system on the same device; each
//! system owns one [`GpuBackend`].

mod compute;
mod render;

pub mod camera;
pub mod shaders;

use std::sync::Arc;

pub use camera::Camera;

use crate::compute::{ParticleBackend, StateSlot};
use crate::error::GpuError;
use crate::flow_field::{FlowField, SimplexFlowField};
use crate::render::RenderGeometry;
use crate::state::StateImage;
use crate::uniforms::{RenderUniforms, SimulationUniforms};

use compute::{StateTextures, UpdatePipeline};
use render::{SpriteBuffers, SpritePipeline};

/// Texel format of the state textures. Matches [`crate::state::Texel`].
pub const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Depth format the demo renders with.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn load_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn bgl_uniform(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bgl_texture(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn bg_texture(binding: u32, view: &wgpu::TextureView) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}

/// Adapter, device and queue.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// A device with no surface, for offscreen use.
    pub async fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        Self::request(&instance, None).await
    }

    /// A device able to present to `surface`.
    pub async fn for_surface(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<Self, GpuError> {
        Self::request(instance, Some(surface)).await
    }

    async fn request(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("meshdust_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

/// Formats of the pass the sprites are drawn into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

impl RenderTarget {
    pub fn new(color_format: wgpu::TextureFormat) -> Self {
        Self {
            color_format,
            depth_format: None,
            sample_count: 1,
        }
    }

    pub fn with_depth(mut self, format: wgpu::TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }
}

/// Particle state and sprites of one system on a wgpu device.
///
/// Updates are submitted as soon as they are encoded, so a frame's compute
/// lands on the queue before the render pass the host records its draw into.
pub struct GpuBackend {
    context: Arc<GpuContext>,
    update: UpdatePipeline,
    sprites: SpritePipeline,
    state: Option<StateTextures>,
    render_bind_groups: Option<[wgpu::BindGroup; 2]>,
    drawable: Option<SpriteBuffers>,
}

impl GpuBackend {
    /// A backend driven by the default simplex flow field.
    pub fn new(context: Arc<GpuContext>, target: RenderTarget) -> Self {
        Self::with_flow_field(context, target, &SimplexFlowField::default())
    }

    /// A backend whose update pass samples `field`.
    pub fn with_flow_field(
        context: Arc<GpuContext>,
        target: RenderTarget,
        field: &dyn FlowField,
    ) -> Self {
        let update = UpdatePipeline::new(&context.device, field);
        let sprites = SpritePipeline::new(&context.device, &target);
        Self {
            context,
            update,
            sprites,
            state: None,
            render_bind_groups: None,
            drawable: None,
        }
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    /// Read the state texture in `slot` back to the host. Blocks on the
    /// device. Returns `None` before allocation or if the copy fails.
    pub fn read_state(&self, slot: StateSlot) -> Option<StateImage> {
        let state = self.state.as_ref()?;
        state.read(&self.context.device, &self.context.queue, slot)
    }
}

impl ParticleBackend for GpuBackend {
    type DrawTarget<'a> = wgpu::RenderPass<'a>;

    fn allocate_state(&mut self, initial: &StateImage) -> StateSlot {
        let GpuContext { device, queue, .. } = self.context.as_ref();
        let state = StateTextures::new(device, queue, &self.update, initial);
        self.render_bind_groups = Some(self.sprites.bind_groups(device, &state.textures));
        let slot = state.textures.current_slot();
        self.state = Some(state);
        log::debug!(
            "allocated {0}x{0} state textures for {1} particles",
            initial.size(),
            initial.particle_count()
        );
        slot
    }

    fn compute(&mut self, uniforms: &SimulationUniforms) -> Option<StateSlot> {
        let state = self.state.as_mut()?;
        let GpuContext { device, queue, .. } = self.context.as_ref();
        Some(state.step(device, queue, &self.update, uniforms))
    }

    fn allocate_drawable(&mut self, drawable: &RenderGeometry) {
        self.drawable = Some(SpriteBuffers::new(&self.context.device, drawable));
    }

    fn draw(&self, source: StateSlot, uniforms: &RenderUniforms, pass: &mut wgpu::RenderPass<'_>) {
        let (Some(bind_groups), Some(drawable)) = (&self.render_bind_groups, &self.drawable) else {
            log::warn!("draw on a GPU backend with nothing allocated");
            return;
        };

        self.context.queue.write_buffer(
            &self.sprites.uniform_buffer,
            0,
            bytemuck::bytes_of(uniforms),
        );

        pass.set_pipeline(&self.sprites.pipeline);
        pass.set_bind_group(0, &bind_groups[source.index()], &[]);
        pass.set_vertex_buffer(0, drawable.uvs.slice(..));
        pass.set_vertex_buffer(1, drawable.colors.slice(..));
        pass.set_vertex_buffer(2, drawable.sizes.slice(..));
        pass.draw(0..6, 0..drawable.count);
    }

    fn max_state_size(&self) -> u32 {
        self.context.device.limits().max_texture_dimension_2d
    }
}

/// A depth attachment matching a surface of `width` by `height`.
pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("meshdust_depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
