//! State textures and the update pass.

use wgpu::util::DeviceExt;

use super::shaders::{compute_shader, WORKGROUP_SIZE};
use super::{bg_texture, bgl_texture, bgl_uniform, load_shader, STATE_FORMAT};
use crate::compute::{PingPong, StateSlot};
use crate::flow_field::FlowField;
use crate::state::{StateImage, Texel};
use crate::uniforms::SimulationUniforms;

/// The update pipeline. Shared layout for every state allocation.
pub(crate) struct UpdatePipeline {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
}

impl UpdatePipeline {
    pub(crate) fn new(device: &wgpu::Device, field: &dyn FlowField) -> Self {
        let module = load_shader(device, "meshdust_update", &compute_shader(field));

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("meshdust_update_bgl"),
            entries: &[
                bgl_uniform(0, wgpu::ShaderStages::COMPUTE),
                bgl_texture(1, wgpu::ShaderStages::COMPUTE),
                bgl_texture(2, wgpu::ShaderStages::COMPUTE),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: STATE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("meshdust_update_pipeline_layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("meshdust_update_pipeline"),
            layout: Some(&layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self { pipeline, bgl }
    }
}

/// A state image on the GPU.
pub(crate) struct StateTexture {
    texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

impl StateTexture {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue, image: &StateImage, label: &str) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: image.size(),
                    height: image.size(),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: STATE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            image.as_bytes(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Front, back and base textures of one system, plus the two update bind
/// groups: group `i` reads texture `i` and writes the other.
pub(crate) struct StateTextures {
    pub(crate) textures: PingPong<StateTexture>,
    bind_groups: [wgpu::BindGroup; 2],
    uniform_buffer: wgpu::Buffer,
    size: u32,
    count: u32,
}

impl StateTextures {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &UpdatePipeline,
        initial: &StateImage,
    ) -> Self {
        let textures = PingPong::new(
            StateTexture::new(device, queue, initial, "meshdust_state_0"),
            StateTexture::new(device, queue, initial, "meshdust_state_1"),
        );
        let base = StateTexture::new(device, queue, initial, "meshdust_state_base");

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("meshdust_update_uniforms"),
            contents: bytemuck::bytes_of(&SimulationUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let [front, back] = textures.buffers();
        let bind_group = |label: &str, read: &StateTexture, write: &StateTexture| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipeline.bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    bg_texture(1, &read.view),
                    bg_texture(2, &base.view),
                    bg_texture(3, &write.view),
                ],
            })
        };
        // slot 0: read [0], write [1]
        let bind_groups = [
            bind_group("meshdust_update_bg_0", front, back),
            bind_group("meshdust_update_bg_1", back, front),
        ];

        Self {
            textures,
            bind_groups,
            uniform_buffer,
            size: initial.size(),
            count: initial.particle_count(),
        }
    }

    /// Encode and submit one update, then swap.
    pub(crate) fn step(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &UpdatePipeline,
        uniforms: &SimulationUniforms,
    ) -> StateSlot {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("meshdust_update_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("meshdust_update_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &self.bind_groups[self.textures.current_slot().index()], &[]);
            let groups = self.size.div_ceil(WORKGROUP_SIZE);
            pass.dispatch_workgroups(groups, groups, 1);
        }
        queue.submit(Some(encoder.finish()));

        self.textures.swap();
        self.textures.current_slot()
    }

    /// Copy the texture in `slot` back to host memory, blocking until the
    /// copy lands. Returns `None` if the staging buffer could not be mapped.
    pub(crate) fn read(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: StateSlot,
    ) -> Option<StateImage> {
        let texel_bytes = std::mem::size_of::<Texel>() as u32;
        let row_bytes = self.size * texel_bytes;
        // Rows in a texture copy must start on a 256 byte boundary.
        let padded_row_bytes = row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("meshdust_state_readback"),
            size: padded_row_bytes as u64 * self.size as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("meshdust_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.textures.get(slot).texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(self.size),
                },
            },
            wgpu::Extent3d {
                width: self.size,
                height: self.size,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        if let Err(err) = rx.recv().ok()? {
            log::warn!("state readback failed: {}", err);
            return None;
        }

        let texels: Vec<Texel> = {
            let data = slice.get_mapped_range();
            data.chunks_exact(padded_row_bytes as usize)
                .flat_map(|row| row[..row_bytes as usize].chunks_exact(texel_bytes as usize))
                .map(bytemuck::pod_read_unaligned::<Texel>)
                .collect()
        };
        staging.unmap();

        StateImage::from_texels(self.count, texels)
    }
}
