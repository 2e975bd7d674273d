//! The sprite pass.

use wgpu::util::DeviceExt;

use super::compute::StateTexture;
use super::shaders::RENDER_SHADER;
use super::{bg_texture, bgl_texture, bgl_uniform, load_shader, RenderTarget};
use crate::compute::PingPong;
use crate::render::RenderGeometry;
use crate::uniforms::RenderUniforms;

/// Sprite pipeline and the uniform buffer of one system.
pub(crate) struct SpritePipeline {
    pub(crate) pipeline: wgpu::RenderPipeline,
    bgl: wgpu::BindGroupLayout,
    pub(crate) uniform_buffer: wgpu::Buffer,
}

impl SpritePipeline {
    pub(crate) fn new(device: &wgpu::Device, target: &RenderTarget) -> Self {
        let module = load_shader(device, "meshdust_sprites", RENDER_SHADER);

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("meshdust_sprite_bgl"),
            entries: &[
                bgl_uniform(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                bgl_texture(1, wgpu::ShaderStages::VERTEX),
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("meshdust_sprite_pipeline_layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let uv_layout = wgpu::VertexBufferLayout {
            array_stride: 8,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &wgpu::vertex_attr_array![0 => Float32x2],
        };
        let color_layout = wgpu::VertexBufferLayout {
            array_stride: 16,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &wgpu::vertex_attr_array![1 => Float32x4],
        };
        let size_layout = wgpu::VertexBufferLayout {
            array_stride: 4,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &wgpu::vertex_attr_array![2 => Float32],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("meshdust_sprite_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[uv_layout, color_layout, size_layout],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target.color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: target.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: target.sample_count,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("meshdust_sprite_uniforms"),
            contents: bytemuck::bytes_of(&RenderUniforms::new(glam::Mat4::IDENTITY, 1)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        log::debug!(
            "sprite pipeline for {:?}, depth {:?}",
            target.color_format,
            target.depth_format
        );

        Self {
            pipeline,
            bgl,
            uniform_buffer,
        }
    }

    /// One bind group per state texture, indexed by slot.
    pub(crate) fn bind_groups(
        &self,
        device: &wgpu::Device,
        textures: &PingPong<StateTexture>,
    ) -> [wgpu::BindGroup; 2] {
        let [front, back] = textures.buffers();
        let bind_group = |label: &str, source: &StateTexture| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                    bg_texture(1, &source.view),
                ],
            })
        };
        [
            bind_group("meshdust_sprite_bg_0", front),
            bind_group("meshdust_sprite_bg_1", back),
        ]
    }
}

/// Per-instance vertex buffers of the drawable.
pub(crate) struct SpriteBuffers {
    pub(crate) uvs: wgpu::Buffer,
    pub(crate) colors: wgpu::Buffer,
    pub(crate) sizes: wgpu::Buffer,
    pub(crate) count: u32,
}

impl SpriteBuffers {
    pub(crate) fn new(device: &wgpu::Device, drawable: &RenderGeometry) -> Self {
        let buffer = |label: &str, contents: &[u8]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            })
        };
        Self {
            uvs: buffer("meshdust_uvs", drawable.uv_map().as_bytes()),
            colors: buffer("meshdust_colors", drawable.color_bytes()),
            sizes: buffer("meshdust_sizes", drawable.size_bytes()),
            count: drawable.point_count(),
        }
    }
}
