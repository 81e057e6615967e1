use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBindingType,
    ColorTargetState, Device, FragmentState, PipelineCompilationOptions, PipelineLayoutDescriptor,
    PrimitiveState, PrimitiveTopology, Queue, RenderPass, RenderPipeline, Sampler,
    SamplerBindingType, ShaderStages, Texture, TextureFormat, TextureSampleType, TextureView,
    TextureViewDimension, VertexBufferLayout, VertexState, VertexStepMode,
};

use super::context::checked;
use super::uniforms::MaskUniforms;
use crate::error::GpuError;
use crate::media::types::DecodedFrame;
use crate::view::{FrameState, QuadVertex};

const MASKED_WGSL: &str = include_str!("../../../../assets/shaders/masked.wgsl");

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x2];

struct VideoTexture {
    texture: Texture,
    view: TextureView,
    width: u32,
    height: u32,
}

impl VideoTexture {
    fn new(device: &Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("video-frame"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            // sRGB for auto-conversion on sample
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    fn write(&self, queue: &Queue, data: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 4),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Draws the video as one textured triangle strip with a shader-computed
/// circular mask.
pub struct MaskedRenderer {
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    bind_group: BindGroup,
    sampler: Sampler,
    uniform_buffer: Buffer,
    vertex_buffer: Buffer,
    video: VideoTexture,
    has_frame: bool,
    uploaded_generation: Option<u64>,
}

impl MaskedRenderer {
    /// Shader compile or pipeline validation failures are fatal.
    pub fn new(device: &Device, queue: &Queue, format: TextureFormat) -> Result<Self, GpuError> {
        let renderer = checked(device, "masked pipeline", || {
            Self::build(device, queue, format)
        })?;
        log::info!("Masked video pipeline created ({format:?})");
        Ok(renderer)
    }

    fn build(device: &Device, queue: &Queue, format: TextureFormat) -> Self {
        // Transparent 1x1 until the first decoded frame arrives.
        let video = VideoTexture::new(device, 1, 1);
        video.write(queue, &[0u8; 4]);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("video-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mask-uniforms"),
            size: std::mem::size_of::<MaskUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("video-quad"),
            size: std::mem::size_of::<[QuadVertex; 4]>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Bind group layout: texture(0), sampler(1), uniform(2)
        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("masked-bgl"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: std::num::NonZeroU64::new(
                            std::mem::size_of::<MaskUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("masked"),
            source: wgpu::ShaderSource::Wgsl(MASKED_WGSL.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("masked-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("masked-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader_module,
                entry_point: Some("vs_main"),
                buffers: &[VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as u64,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &QUAD_ATTRIBUTES,
                }],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleStrip,
                ..PrimitiveState::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let bind_group =
            create_bind_group(device, &bind_group_layout, &video, &sampler, &uniform_buffer);

        Self {
            pipeline,
            bind_group_layout,
            bind_group,
            sampler,
            uniform_buffer,
            vertex_buffer,
            video,
            has_frame: false,
            uploaded_generation: None,
        }
    }

    /// Upload a newly decoded frame, recreating the texture on size change.
    pub fn upload_frame(&mut self, device: &Device, queue: &Queue, frame: &DecodedFrame) {
        if !frame.is_complete() || frame.width == 0 || frame.height == 0 {
            log::warn!("Dropping malformed frame {frame:?}");
            return;
        }
        if self.video.width != frame.width || self.video.height != frame.height {
            log::debug!(
                "Video texture {}x{} -> {}x{}",
                self.video.width,
                self.video.height,
                frame.width,
                frame.height
            );
            self.video = VideoTexture::new(device, frame.width, frame.height);
            self.bind_group = create_bind_group(
                device,
                &self.bind_group_layout,
                &self.video,
                &self.sampler,
                &self.uniform_buffer,
            );
        }
        self.video.write(queue, &frame.data);
        self.has_frame = true;
    }

    /// Write this frame's uniforms; vertices only when the geometry changed.
    pub fn prepare(&mut self, queue: &Queue, frame: &FrameState) {
        let uniforms = MaskUniforms::from_frame(frame);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        if self.uploaded_generation != Some(frame.geometry_generation) {
            queue.write_buffer(
                &self.vertex_buffer,
                0,
                bytemuck::cast_slice(&frame.geometry.quad),
            );
            self.uploaded_generation = Some(frame.geometry_generation);
        }
    }

    pub fn has_frame(&self) -> bool {
        self.has_frame
    }

    pub fn draw(&self, pass: &mut RenderPass<'_>) {
        if !self.has_frame {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..4, 0..1);
    }
}

fn create_bind_group(
    device: &Device,
    layout: &BindGroupLayout,
    video: &VideoTexture,
    sampler: &Sampler,
    uniforms: &Buffer,
) -> BindGroup {
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("masked-bg"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&video.view),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(sampler),
            },
            BindGroupEntry {
                binding: 2,
                resource: uniforms.as_entire_binding(),
            },
        ],
    })
}
