use anyhow::{anyhow, Result};
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::bridge::{HostContext, OutputSurface};
use crate::engine::{frame_byte_len, BYTES_PER_PIXEL};

use super::transfer::TransferBufferPool;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct QuadVertex {
    pos: [f32; 2], // NDC
    uv: [f32; 2],
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

// Triangle strip covering the whole viewport. UVs are authored top-down; the
// vertex stage flips V to match the relay's bottom-up row order.
const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { pos: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { pos: [ 1.0, -1.0], uv: [1.0, 1.0] },
    QuadVertex { pos: [-1.0,  1.0], uv: [0.0, 0.0] },
    QuadVertex { pos: [ 1.0,  1.0], uv: [1.0, 0.0] },
];

const DISPLAY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// The texture the host actually samples, plus the identity of the surface it
/// was sized for.
struct DisplayTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    generation: u64,
}

/// Owns the blit pipeline, the static full-screen quad, and the display
/// texture; uploads completed frames and draws them into the host target.
pub struct PresentationCompositor {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    quad_vbo: wgpu::Buffer,
    display: DisplayTexture,
    warned_stale_upload: bool,
}

impl PresentationCompositor {
    /// Builds the pipeline and the initial display texture.
    ///
    /// Shader and pipeline creation run under a validation error scope so a
    /// bad shader surfaces as a constructor error carrying the compiler
    /// diagnostic, not as a deferred device error.
    pub fn new(
        ctx: &HostContext<'_>,
        width: u32,
        height: u32,
        generation: u64,
    ) -> Result<Self> {
        let scope = ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viaduct blit shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("viaduct blit bgl"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let pipeline_layout =
            ctx.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("viaduct blit pipeline layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    immediate_size: 0,
                });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("viaduct blit pipeline"),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[QuadVertex::layout()],
                },

                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: ctx.target_format,
                        // The quad fully covers the viewport; no blending.
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(anyhow!("blit shader/pipeline validation failed: {err}"));
        }

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("viaduct display sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let quad_vbo = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("viaduct blit quad vbo"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let display =
            Self::create_display(ctx, &bind_group_layout, &sampler, width, height, generation);

        Ok(Self {
            pipeline,
            bind_group_layout,
            sampler,
            quad_vbo,
            display,
            warned_stale_upload: false,
        })
    }

    fn create_display(
        ctx: &HostContext<'_>,
        bind_group_layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        width: u32,
        height: u32,
        generation: u64,
    ) -> DisplayTexture {
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viaduct display texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DISPLAY_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("viaduct display bind group"),
            layout: bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        DisplayTexture {
            texture,
            bind_group,
            width,
            height,
            generation,
        }
    }

    /// Recreates the display texture when it has fallen behind the output
    /// surface, by generation or by size. Returns `true` on recreation, in
    /// which case any frame staged for the old texture must be discarded by
    /// the caller.
    pub fn sync_display(&mut self, ctx: &HostContext<'_>, surface: &OutputSurface) -> bool {
        if self.display.generation == surface.generation
            && self.display.width == surface.width
            && self.display.height == surface.height
        {
            return false;
        }

        self.display = Self::create_display(
            ctx,
            &self.bind_group_layout,
            &self.sampler,
            surface.width,
            surface.height,
            surface.generation,
        );
        log::debug!(
            "display texture recreated at {}x{} (generation {})",
            surface.width,
            surface.height,
            surface.generation
        );
        true
    }

    /// Uploads a completed frame into the display texture, through the
    /// transfer pool when one is active. Returns `false` when `bytes` does not
    /// match the texture size — a stale frame is dropped, never stretched.
    pub fn upload(
        &mut self,
        ctx: &HostContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        transfer: Option<&mut TransferBufferPool>,
        bytes: &[u8],
    ) -> bool {
        let expected = frame_byte_len(self.display.width, self.display.height);
        if bytes.len() != expected {
            if !self.warned_stale_upload {
                log::warn!(
                    "frame of {} bytes does not fit {}x{} display texture; dropped",
                    bytes.len(),
                    self.display.width,
                    self.display.height
                );
                self.warned_stale_upload = true;
            }
            return false;
        }

        match transfer {
            Some(pool) => pool.stage(
                ctx.queue,
                encoder,
                bytes,
                &self.display.texture,
                self.display.width,
                self.display.height,
            ),
            None => ctx.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.display.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytes,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.display.width * BYTES_PER_PIXEL as u32),
                    rows_per_image: Some(self.display.height),
                },
                wgpu::Extent3d {
                    width: self.display.width,
                    height: self.display.height,
                    depth_or_array_layers: 1,
                },
            ),
        }
        true
    }

    /// Draws the display texture as a full-screen quad into `target`.
    ///
    /// The viewport is the host's physical pixel size, which may differ from
    /// the display texture's dimensions when DPI scale ≠ 1; the sampler
    /// stretches accordingly.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        pixel_width: u32,
        pixel_height: u32,
    ) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("viaduct present pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_viewport(
            0.0,
            0.0,
            pixel_width.max(1) as f32,
            pixel_height.max(1) as f32,
            0.0,
            1.0,
        );
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.display.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
        rpass.draw(0..4, 0..1);
    }

    /// Current display texture dimensions.
    pub fn display_size(&self) -> (u32, u32) {
        (self.display.width, self.display.height)
    }

    /// Generation of the surface the display texture was last synced to.
    pub fn display_generation(&self) -> u64 {
        self.display.generation
    }
}
