use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBindingType,
    ColorTargetState, Device, FragmentState, PipelineCompilationOptions, PipelineLayoutDescriptor,
    PrimitiveState, PrimitiveTopology, Queue, RenderPass, RenderPipeline, Sampler,
    SamplerBindingType, ShaderStages, Texture, TextureFormat, TextureSampleType,
    TextureViewDimension, VertexBufferLayout, VertexState, VertexStepMode,
};

use super::context::checked;
use super::uniforms::OverlayUniforms;
use crate::error::GpuError;
use crate::subtitle::CaptionBitmap;
use crate::subtitle::overlay::{CaptionFrame, caption_mvp};

const CAPTION_WGSL: &str = include_str!("../../../../assets/shaders/caption.wgsl");

const CAPTION_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

/// Caption quad corner in pixels around the caption's center.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CaptionVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

/// Triangle strip sized to the bitmap. Texture v runs bottom-up here; the
/// model's X-axis flip turns it back upright.
pub fn caption_vertices(width: f32, height: f32) -> [CaptionVertex; 4] {
    let (hw, hh) = (width / 2.0, height / 2.0);
    [
        CaptionVertex {
            position: [-hw, -hh],
            tex_coord: [0.0, 0.0],
        },
        CaptionVertex {
            position: [hw, -hh],
            tex_coord: [1.0, 0.0],
        },
        CaptionVertex {
            position: [-hw, hh],
            tex_coord: [0.0, 1.0],
        },
        CaptionVertex {
            position: [hw, hh],
            tex_coord: [1.0, 1.0],
        },
    ]
}

/// Non-empty and within the device's 2D texture limit. Oversized captions are
/// dropped with a warning instead of failing texture validation.
fn fits_texture(width: u32, height: u32, max_dimension: u32) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    if width > max_dimension || height > max_dimension {
        log::warn!("Dropping {width}x{height} caption: exceeds texture limit {max_dimension}");
        return false;
    }
    true
}

struct CaptionTexture {
    bind_group: BindGroup,
    texture: Texture,
    width: u32,
    height: u32,
}

/// Draws the current caption bitmap, unmasked, over the video.
pub struct SubtitleOverlayRenderer {
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    uniform_buffer: Buffer,
    vertex_buffer: Buffer,
    caption: Option<CaptionTexture>,
    generation: Option<u64>,
}

impl SubtitleOverlayRenderer {
    pub fn new(device: &Device, format: TextureFormat) -> Result<Self, GpuError> {
        let renderer = checked(device, "caption pipeline", || Self::build(device, format))?;
        log::info!("Caption overlay pipeline created");
        Ok(renderer)
    }

    fn build(device: &Device, format: TextureFormat) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("caption-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("caption-uniforms"),
            size: std::mem::size_of::<OverlayUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("caption-quad"),
            size: std::mem::size_of::<[CaptionVertex; 4]>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("caption-bgl"),
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
                    visibility: ShaderStages::VERTEX,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: std::num::NonZeroU64::new(
                            std::mem::size_of::<OverlayUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("caption"),
            source: wgpu::ShaderSource::Wgsl(CAPTION_WGSL.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("caption-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("caption-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader_module,
                entry_point: Some("vs_main"),
                buffers: &[VertexBufferLayout {
                    array_stride: std::mem::size_of::<CaptionVertex>() as u64,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &CAPTION_ATTRIBUTES,
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

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            vertex_buffer,
            caption: None,
            generation: None,
        }
    }

    /// Sync GPU state with `frame`: re-upload on a new caption, drop on clear,
    /// and refresh the transform for the current target size.
    pub fn prepare(
        &mut self,
        device: &Device,
        queue: &Queue,
        frame: &CaptionFrame,
        target_width: u32,
        target_height: u32,
        bottom_margin_px: f32,
    ) {
        if self.generation != Some(frame.generation) {
            self.generation = Some(frame.generation);
            let max_dimension = device.limits().max_texture_dimension_2d;
            let caption = frame
                .bitmap
                .as_deref()
                .filter(|b| fits_texture(b.width, b.height, max_dimension))
                .map(|bitmap| self.upload(device, queue, bitmap));
            self.caption = caption;
        }

        if let Some(bitmap) = frame.bitmap.as_deref().filter(|_| self.caption.is_some()) {
            let mvp = caption_mvp(
                bitmap,
                target_width as f32,
                target_height as f32,
                bottom_margin_px,
            );
            queue.write_buffer(
                &self.uniform_buffer,
                0,
                bytemuck::bytes_of(&OverlayUniforms::new(mvp)),
            );
        }
    }

    fn upload(&mut self, device: &Device, queue: &Queue, bitmap: &CaptionBitmap) -> CaptionTexture {
        let reusable = self
            .caption
            .take()
            .filter(|c| c.width == bitmap.width && c.height == bitmap.height);
        let caption = reusable.unwrap_or_else(|| self.create_texture(device, bitmap));

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &caption.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bitmap.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bitmap.width * 4),
                rows_per_image: Some(bitmap.height),
            },
            wgpu::Extent3d {
                width: bitmap.width,
                height: bitmap.height,
                depth_or_array_layers: 1,
            },
        );
        queue.write_buffer(
            &self.vertex_buffer,
            0,
            bytemuck::cast_slice(&caption_vertices(bitmap.width as f32, bitmap.height as f32)),
        );
        caption
    }

    fn create_texture(&self, device: &Device, bitmap: &CaptionBitmap) -> CaptionTexture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("caption"),
            size: wgpu::Extent3d {
                width: bitmap.width,
                height: bitmap.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("caption-bg"),
            layout: &self.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&self.sampler),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });
        CaptionTexture {
            bind_group,
            texture,
            width: bitmap.width,
            height: bitmap.height,
        }
    }

    pub fn has_caption(&self) -> bool {
        self.caption.is_some()
    }

    pub fn draw(&self, pass: &mut RenderPass<'_>) {
        let Some(caption) = &self.caption else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &caption.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..4, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;

    #[test]
    fn quad_is_centered_and_sized_to_bitmap() {
        let quad = caption_vertices(600.0, 60.0);
        assert_eq!(quad[0].position, [-300.0, -30.0]);
        assert_eq!(quad[3].position, [300.0, 30.0]);
        assert_eq!(std::mem::size_of::<CaptionVertex>(), 16);
    }

    #[test]
    fn oversized_or_empty_captions_are_not_uploaded() {
        assert!(fits_texture(600, 60, 8192));
        assert!(fits_texture(8192, 8192, 8192));
        assert!(!fits_texture(8193, 60, 8192));
        assert!(!fits_texture(600, 9000, 8192));
        assert!(!fits_texture(0, 60, 8192));
    }

    #[test]
    fn first_bitmap_row_lands_on_top_after_transform() {
        let bitmap = CaptionBitmap::new(600, 60);
        let mvp = caption_mvp(&bitmap, 1280.0, 720.0, 30.0);
        let quad = caption_vertices(600.0, 60.0);
        let clip = |v: &CaptionVertex| mvp * Vec4::new(v.position[0], v.position[1], 0.0, 1.0);

        // v = 0 is the bitmap's first (top) row in wgpu's texture space.
        let top_row = clip(&quad[0]);
        let bottom_row = clip(&quad[2]);
        assert!(top_row.y > bottom_row.y);
        // Bottom edge sits 30 px above the target's bottom.
        assert!((bottom_row.y - (-1.0 + 60.0 / 720.0)).abs() < 1e-5);
    }
}
