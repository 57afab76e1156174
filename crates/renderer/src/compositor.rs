use std::sync::Arc;

use render_protocol::{PaintElementType, Rect, Size};
use view::{PopupOverlay, SpinTransform};
use wgpu::util::DeviceExt;

use crate::geometry::{
    BACKGROUND_GRADIENT_VERTICES, ColoredVertex, IDENTITY_MATRIX, OUTLINE_VERTEX_COUNT,
    TexturedVertex, TransformMatrix4x4, VIEW_QUAD_VERTICES, pixel_clip_matrix_from_size,
    update_rect_outline,
};
use crate::texture_sync::{TextureSync, TextureUploadTarget, source_byte_offset};
use crate::upload_plan::{BYTES_PER_PIXEL, RegionWrite};
use crate::{CompositorConfig, FrameCompositor, PixelUpdate, PresentError};

/// Engine buffers are BGRA with premultiplied alpha.
pub const VIEW_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;

const TEXTURED_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];
const COLORED_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];

struct CompositorPipelines {
    sampler: wgpu::Sampler,
    scene_uniform_buffer: wgpu::Buffer,
    overlay_uniform_buffer: wgpu::Buffer,
    view_bind_group_layout: wgpu::BindGroupLayout,
    overlay_bind_group: wgpu::BindGroup,
    quad_pipeline: wgpu::RenderPipeline,
    gradient_pipeline: wgpu::RenderPipeline,
    outline_pipeline: wgpu::RenderPipeline,
    quad_vertex_buffer: wgpu::Buffer,
    gradient_vertex_buffer: wgpu::Buffer,
    outline_vertex_buffer: wgpu::Buffer,
}

struct ViewTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// Offscreen-rendered view composited onto a window surface.
pub struct OsrCompositor {
    config: CompositorConfig,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    texture_sync: TextureSync,
    spin: SpinTransform,
    pipelines: Option<CompositorPipelines>,
    view_texture: Option<ViewTexture>,
}

impl OsrCompositor {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: wgpu::Surface<'static>,
        surface_config: wgpu::SurfaceConfiguration,
        config: CompositorConfig,
    ) -> Self {
        device.on_uncaptured_error(Arc::new(|error| {
            panic!("wgpu uncaptured error: {error}");
        }));
        surface.configure(&device, &surface_config);
        log::info!(
            target: "renderer",
            "compositor surface configured: {}x{} {:?} transparent={}",
            surface_config.width,
            surface_config.height,
            surface_config.format,
            config.is_transparent()
        );

        Self {
            config,
            device,
            queue,
            surface,
            surface_config,
            texture_sync: TextureSync::new(config.show_update_rect),
            spin: SpinTransform::default(),
            pipelines: None,
            view_texture: None,
        }
    }

    pub fn config(&self) -> CompositorConfig {
        self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.pipelines.is_some()
    }

    fn upload_target(&mut self) -> GpuUploadTarget<'_> {
        let pipelines = self
            .pipelines
            .as_ref()
            .expect("compositor pipelines exist before uploads");
        GpuUploadTarget {
            device: &self.device,
            queue: &self.queue,
            pipelines,
            view_texture: &mut self.view_texture,
        }
    }

    fn write_uniforms(&self, pipelines: &CompositorPipelines, view_size: Size) {
        let scene: TransformMatrix4x4 = self.spin.to_matrix4x4();
        self.queue.write_buffer(
            &pipelines.scene_uniform_buffer,
            0,
            bytemuck::bytes_of(&scene),
        );
        self.queue.write_buffer(
            &pipelines.overlay_uniform_buffer,
            0,
            bytemuck::bytes_of(&pixel_clip_matrix_from_size(view_size)),
        );
    }

    fn viewport_extent(&self, view_size: Size) -> (f32, f32) {
        let width = (view_size.width as u32).min(self.surface_config.width);
        let height = (view_size.height as u32).min(self.surface_config.height);
        (width as f32, height as f32)
    }
}

impl FrameCompositor for OsrCompositor {
    fn initialize(&mut self) {
        if self.pipelines.is_some() {
            return;
        }
        self.pipelines = Some(create_pipelines(
            &self.device,
            self.surface_config.format,
            self.config.is_transparent(),
        ));
        log::debug!(target: "renderer", "compositor pipelines created");
    }

    fn on_pixel_update(&mut self, update: PixelUpdate<'_>, popup: &PopupOverlay) {
        self.initialize();
        let mut texture_sync = std::mem::take(&mut self.texture_sync);
        let result = {
            let mut target = self.upload_target();
            match update.element {
                PaintElementType::View => texture_sync.apply_view(
                    &mut target,
                    update.dirty,
                    update.buffer,
                    update.width,
                    update.height,
                ),
                PaintElementType::Popup => texture_sync.apply_popup(
                    &mut target,
                    popup.effective_rect(),
                    update.buffer,
                    update.width,
                    update.height,
                ),
            }
        };
        self.texture_sync = texture_sync;

        match result {
            Ok(kind) => log::trace!(
                target: "renderer",
                "{:?} pixel update applied as {kind:?}",
                update.element
            ),
            Err(error) => panic!("{:?} pixel update rejected: {error}", update.element),
        }
    }

    fn render(&mut self) -> Result<(), PresentError> {
        let view_size = self.texture_sync.view_size();
        if view_size.is_empty() {
            return Ok(());
        }
        let pipelines = self
            .pipelines
            .as_ref()
            .expect("compositor rendered before initialize");
        self.write_uniforms(pipelines, view_size);
        let (viewport_width, viewport_height) = self.viewport_extent(view_size);

        let frame = self.surface.get_current_texture()?;
        let frame_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let [r, g, b, a] = self.config.clear_color();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer.frame"),
            });
        {
            let mut scene_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("renderer.scene"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            scene_pass.set_viewport(0.0, 0.0, viewport_width, viewport_height, 0.0, 1.0);

            scene_pass.set_pipeline(&pipelines.gradient_pipeline);
            scene_pass.set_vertex_buffer(0, pipelines.gradient_vertex_buffer.slice(..));
            scene_pass.draw(0..BACKGROUND_GRADIENT_VERTICES.len() as u32, 0..1);

            if let Some(view_texture) = self.view_texture.as_ref() {
                scene_pass.set_pipeline(&pipelines.quad_pipeline);
                scene_pass.set_bind_group(0, &view_texture.bind_group, &[]);
                scene_pass.set_vertex_buffer(0, pipelines.quad_vertex_buffer.slice(..));
                scene_pass.draw(0..VIEW_QUAD_VERTICES.len() as u32, 0..1);
            }
        }

        let outline_rect = self
            .texture_sync
            .update_rect()
            .filter(|rect| self.config.show_update_rect && !rect.is_empty());
        if let Some(rect) = outline_rect {
            self.queue.write_buffer(
                &pipelines.outline_vertex_buffer,
                0,
                bytemuck::cast_slice(&update_rect_outline(rect)),
            );
            let mut overlay_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("renderer.update_rect"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            overlay_pass.set_viewport(0.0, 0.0, viewport_width, viewport_height, 0.0, 1.0);
            overlay_pass.set_pipeline(&pipelines.outline_pipeline);
            overlay_pass.set_bind_group(0, &pipelines.overlay_bind_group, &[]);
            overlay_pass.set_vertex_buffer(0, pipelines.outline_vertex_buffer.slice(..));
            overlay_pass.draw(0..OUTLINE_VERTEX_COUNT as u32, 0..1);
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    fn reconfigure_surface(&mut self) {
        self.surface.configure(&self.device, &self.surface_config);
    }

    fn set_spin(&mut self, spin_x: f32, spin_y: f32) {
        if let Err(error) = self.spin.set_spin(spin_x, spin_y) {
            log::warn!(target: "renderer", "spin ({spin_x}, {spin_y}) ignored: {error:?}");
        }
    }

    fn increment_spin(&mut self, delta_x: f32, delta_y: f32) {
        if let Err(error) = self.spin.increment_spin(delta_x, delta_y) {
            log::warn!(target: "renderer", "spin delta ({delta_x}, {delta_y}) ignored: {error:?}");
        }
    }

    fn spin(&self) -> SpinTransform {
        self.spin
    }

    fn view_size(&self) -> Size {
        self.texture_sync.view_size()
    }

    fn update_rect(&self) -> Option<Rect> {
        self.texture_sync.update_rect()
    }
}

struct GpuUploadTarget<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    pipelines: &'a CompositorPipelines,
    view_texture: &'a mut Option<ViewTexture>,
}

impl TextureUploadTarget for GpuUploadTarget<'_> {
    fn respecify(&mut self, size: Size) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("renderer.view_texture"),
            size: wgpu::Extent3d {
                width: size.width as u32,
                height: size.height as u32,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: VIEW_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("renderer.view_bind_group"),
            layout: &self.pipelines.view_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.pipelines.scene_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.pipelines.sampler),
                },
            ],
        });
        log::debug!(target: "renderer", "view texture respecified at {size:?}");
        *self.view_texture = Some(ViewTexture {
            texture,
            bind_group,
        });
    }

    fn write_region(&mut self, write: &RegionWrite, buffer: &[u8]) {
        let view_texture = self
            .view_texture
            .as_ref()
            .expect("view texture exists before region writes");
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &view_texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: write.dest.x as u32,
                    y: write.dest.y as u32,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            buffer,
            wgpu::TexelCopyBufferLayout {
                offset: source_byte_offset(write) as u64,
                bytes_per_row: Some(write.source_stride as u32 * BYTES_PER_PIXEL as u32),
                rows_per_image: Some(write.dest.height as u32),
            },
            wgpu::Extent3d {
                width: write.dest.width as u32,
                height: write.dest.height as u32,
                depth_or_array_layers: 1,
            },
        );
    }
}

fn create_pipelines(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    transparent: bool,
) -> CompositorPipelines {
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("renderer.view_sampler.nearest"),
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    let scene_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("renderer.scene_uniform"),
        contents: bytemuck::bytes_of(&IDENTITY_MATRIX),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let overlay_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("renderer.overlay_uniform"),
        contents: bytemuck::bytes_of(&IDENTITY_MATRIX),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let view_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("renderer.view_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });
    let overlay_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("renderer.overlay_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
    let overlay_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("renderer.overlay_bind_group"),
        layout: &overlay_bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: overlay_uniform_buffer.as_entire_binding(),
        }],
    });

    let quad_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("renderer.compositor"),
        source: wgpu::ShaderSource::Wgsl(include_str!("compositor.wgsl").into()),
    });
    let gradient_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("renderer.gradient"),
        source: wgpu::ShaderSource::Wgsl(include_str!("gradient.wgsl").into()),
    });
    let outline_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("renderer.outline"),
        source: wgpu::ShaderSource::Wgsl(include_str!("outline.wgsl").into()),
    });

    let quad_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("renderer.quad_layout"),
        bind_group_layouts: &[&view_bind_group_layout],
        immediate_size: 0,
    });
    let gradient_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("renderer.gradient_layout"),
        bind_group_layouts: &[],
        immediate_size: 0,
    });
    let outline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("renderer.outline_layout"),
        bind_group_layouts: &[&overlay_bind_group_layout],
        immediate_size: 0,
    });

    let textured_vertex_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<TexturedVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &TEXTURED_VERTEX_ATTRIBUTES,
    };
    let colored_vertex_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<ColoredVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &COLORED_VERTEX_ATTRIBUTES,
    };

    // Page pixels carry premultiplied alpha; blend them only over a transparent background.
    let quad_blend = transparent.then_some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING);
    let quad_pipeline = create_pipeline(
        device,
        PipelineSpec {
            label: "renderer.quad_pipeline",
            layout: &quad_layout,
            shader: &quad_shader,
            vertex_layout: textured_vertex_layout,
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            format: surface_format,
            blend: quad_blend,
        },
    );
    let gradient_pipeline = create_pipeline(
        device,
        PipelineSpec {
            label: "renderer.gradient_pipeline",
            layout: &gradient_layout,
            shader: &gradient_shader,
            vertex_layout: colored_vertex_layout.clone(),
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            format: surface_format,
            blend: None,
        },
    );
    let outline_pipeline = create_pipeline(
        device,
        PipelineSpec {
            label: "renderer.outline_pipeline",
            layout: &outline_layout,
            shader: &outline_shader,
            vertex_layout: colored_vertex_layout,
            topology: wgpu::PrimitiveTopology::LineStrip,
            format: surface_format,
            blend: None,
        },
    );

    let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("renderer.quad_vertices"),
        contents: bytemuck::cast_slice(&VIEW_QUAD_VERTICES),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let gradient_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("renderer.gradient_vertices"),
        contents: bytemuck::cast_slice(&BACKGROUND_GRADIENT_VERTICES),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let outline_vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("renderer.outline_vertices"),
        size: (OUTLINE_VERTEX_COUNT * std::mem::size_of::<ColoredVertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    CompositorPipelines {
        sampler,
        scene_uniform_buffer,
        overlay_uniform_buffer,
        view_bind_group_layout,
        overlay_bind_group,
        quad_pipeline,
        gradient_pipeline,
        outline_pipeline,
        quad_vertex_buffer,
        gradient_vertex_buffer,
        outline_vertex_buffer,
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    vertex_layout: wgpu::VertexBufferLayout<'a>,
    topology: wgpu::PrimitiveTopology,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
}

fn create_pipeline(device: &wgpu::Device, spec: PipelineSpec<'_>) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(spec.layout),
        vertex: wgpu::VertexState {
            module: spec.shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[spec.vertex_layout],
        },
        fragment: Some(wgpu::FragmentState {
            module: spec.shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: spec.format,
                blend: spec.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
