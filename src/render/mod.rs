pub mod camera;
pub mod pick;

pub use camera::OrbitCamera;

use crate::assets::{AssetManager, TextureState};
use crate::scene::resources::ResourceLedger;
use crate::scene::{Backdrop, SurfacePart, WallScene, BACKDROP_Z, NEUTRAL_GRAY};
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.08,
    g: 0.08,
    b: 0.10,
    a: 1.0,
};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create rendering surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter available")]
    AdapterUnavailable,
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    mvp: [[f32; 4]; 4],
    tint: [f32; 4],
}

/// GPU mirror of one ledger geometry: buffers plus a per-mesh uniform slot.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl GpuMesh {
    fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.uniform_buffer.destroy();
    }
}

/// GPU mirror of one ledger texture.
struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl GpuTexture {
    fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Owns the GPU context and the mirrors of every live scene resource. The
/// scene's ledger is the source of truth: whatever it reports released gets
/// destroyed here before the next frame.
pub struct RenderContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    depth_view: wgpu::TextureView,
    white_texture: GpuTexture,
    meshes: HashMap<u64, GpuMesh>,
    textures: HashMap<u64, GpuTexture>,
}

impl RenderContext {
    pub fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        pollster::block_on(Self::new_async(window))
    }

    async fn new_async(window: Arc<Window>) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterUnavailable)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("wallviz device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(capabilities.formats[0]);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("surface shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/surface.wgsl").into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture layout"),
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("surface pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("surface pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Quads are viewed from both sides (back panel, picture lift).
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("surface sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let depth_view = create_depth_view(&device, size.width.max(1), size.height.max(1));
        let white_texture = upload_texture(
            &device,
            &queue,
            &texture_layout,
            &sampler,
            1,
            1,
            &[255, 255, 255, 255],
        );

        log::info!(
            "render context ready ({}x{}, {:?}, adapter {})",
            size.width,
            size.height,
            format,
            adapter.get_info().name
        );

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            pipeline,
            uniform_layout,
            texture_layout,
            sampler,
            depth_view,
            white_texture,
            meshes: HashMap::new(),
            textures: HashMap::new(),
        })
    }

    /// Reconfigure for a new window size. Zero-sized events are ignored; the
    /// previous configuration stays valid until a usable size arrives.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.surface_config.width = new_size.width;
        self.surface_config.height = new_size.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, new_size.width, new_size.height);
    }

    /// Mirror the scene into GPU resources: destroy whatever the ledger has
    /// released, create buffers for new geometry, upload any textures whose
    /// decode finished.
    pub fn sync_scene(
        &mut self,
        scene: &WallScene,
        ledger: &mut ResourceLedger,
        assets: &AssetManager,
    ) {
        let (released_geometries, released_textures) = ledger.drain_released();
        for id in released_geometries {
            if let Some(mesh) = self.meshes.remove(&id) {
                mesh.destroy();
            }
        }
        for id in released_textures {
            if let Some(texture) = self.textures.remove(&id) {
                texture.destroy();
            }
        }

        if let Some(backdrop) = scene.backdrop() {
            self.ensure_backdrop_mesh(backdrop);
            if let (Some(handle), Some(url)) = (backdrop.texture, &backdrop.material.texture_url) {
                self.ensure_texture(handle.id(), url, assets);
            }
        }
        for object in scene.objects() {
            for part in &object.parts {
                self.ensure_part_mesh(part);
                if let (Some(handle), Some(url)) = (part.texture, &part.material.texture_url) {
                    self.ensure_texture(handle.id(), url, assets);
                }
            }
        }
    }

    fn ensure_backdrop_mesh(&mut self, backdrop: &Backdrop) {
        if self.meshes.contains_key(&backdrop.geometry.id()) {
            return;
        }
        let (vertices, indices) = quad_mesh(backdrop.size.x, backdrop.size.y);
        let mesh = self.create_mesh(&vertices, &indices);
        self.meshes.insert(backdrop.geometry.id(), mesh);
    }

    fn ensure_part_mesh(&mut self, part: &SurfacePart) {
        if self.meshes.contains_key(&part.geometry.id()) {
            return;
        }
        let (vertices, indices) = if part.extent.z > 0.0 {
            box_mesh(part.extent.x, part.extent.y, part.extent.z)
        } else {
            quad_mesh(part.extent.x, part.extent.y)
        };
        let mesh = self.create_mesh(&vertices, &indices);
        self.meshes.insert(part.geometry.id(), mesh);
    }

    fn ensure_texture(&mut self, id: u64, url: &str, assets: &AssetManager) {
        if self.textures.contains_key(&id) {
            return;
        }
        if let Some(TextureState::Ready(image)) = assets.get(url) {
            let texture = upload_texture(
                &self.device,
                &self.queue,
                &self.texture_layout,
                &self.sampler,
                image.width,
                image.height,
                &image.pixels,
            );
            self.textures.insert(id, texture);
        }
    }

    fn create_mesh(&self, vertices: &[Vertex], indices: &[u16]) -> GpuMesh {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("surface vertices"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("surface indices"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("surface uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("surface uniform bind group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            uniform_buffer,
            uniform_bind_group,
        }
    }

    /// Render one frame: backdrop, then every frame object part.
    pub fn render(
        &mut self,
        scene: &WallScene,
        camera: &OrbitCamera,
    ) -> Result<(), wgpu::SurfaceError> {
        let view_projection = camera.view_projection();
        let frame = self.surface.get_current_texture()?;
        let color_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut draws: Vec<(u64, Uniforms, Option<u64>, bool)> = Vec::new();
        if let Some(backdrop) = scene.backdrop() {
            let model = Mat4::from_translation(Vec3::new(0.0, 0.0, BACKDROP_Z));
            draws.push((
                backdrop.geometry.id(),
                Uniforms {
                    mvp: (view_projection * model).to_cols_array_2d(),
                    tint: backdrop.material.color,
                },
                backdrop.texture.map(|t| t.id()),
                backdrop.material.texture_url.is_some(),
            ));
        }
        for object in scene.objects() {
            let object_transform = Mat4::from_translation(object.position)
                * Mat4::from_rotation_z(object.rotation_z);
            for part in &object.parts {
                let model = object_transform * Mat4::from_translation(part.offset);
                draws.push((
                    part.geometry.id(),
                    Uniforms {
                        mvp: (view_projection * model).to_cols_array_2d(),
                        tint: part.material.color,
                    },
                    part.texture.map(|t| t.id()),
                    part.material.texture_url.is_some(),
                ));
            }
        }

        // Stage uniforms before the pass; a surface whose texture has not
        // decoded (or failed) renders with the neutral fill instead.
        for (geometry_id, uniforms, texture_id, wants_texture) in &mut draws {
            let texture_missing =
                *wants_texture && texture_id.map_or(true, |id| !self.textures.contains_key(&id));
            if texture_missing {
                uniforms.tint = NEUTRAL_GRAY;
            }
            if let Some(mesh) = self.meshes.get(geometry_id) {
                self.queue
                    .write_buffer(&mesh.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
            }
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);

            for (geometry_id, _, texture_id, _) in &draws {
                let Some(mesh) = self.meshes.get(geometry_id) else {
                    continue;
                };
                let texture_group = texture_id
                    .and_then(|id| self.textures.get(&id))
                    .map(|t| &t.bind_group)
                    .unwrap_or(&self.white_texture.bind_group);
                pass.set_bind_group(0, &mesh.uniform_bind_group, &[]);
                pass.set_bind_group(1, texture_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Release every GPU mirror. Called during teardown after the scene's
    /// own resources have been disposed; safe to call more than once.
    pub fn destroy(&mut self) {
        for mesh in self.meshes.values() {
            mesh.destroy();
        }
        self.meshes.clear();
        for texture in self.textures.values() {
            texture.destroy();
        }
        self.textures.clear();
        self.white_texture.destroy();
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    depth_texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("surface texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("surface texture bind group"),
        layout,
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
    GpuTexture {
        texture,
        bind_group,
    }
}

/// Viewer-facing quad centered at the origin, uv origin at top-left.
fn quad_mesh(width: f32, height: f32) -> (Vec<Vertex>, Vec<u16>) {
    let w = width * 0.5;
    let h = height * 0.5;
    let vertices = vec![
        Vertex {
            position: [-w, -h, 0.0],
            uv: [0.0, 1.0],
        },
        Vertex {
            position: [w, -h, 0.0],
            uv: [1.0, 1.0],
        },
        Vertex {
            position: [w, h, 0.0],
            uv: [1.0, 0.0],
        },
        Vertex {
            position: [-w, h, 0.0],
            uv: [0.0, 0.0],
        },
    ];
    let indices = vec![0, 1, 2, 2, 3, 0];
    (vertices, indices)
}

/// Axis-aligned box centered at the origin; border segments and similar
/// solid parts use this. Uvs wrap each face with the full texture.
fn box_mesh(width: f32, height: f32, depth: f32) -> (Vec<Vertex>, Vec<u16>) {
    let w = width * 0.5;
    let h = height * 0.5;
    let d = depth * 0.5;
    #[rustfmt::skip]
    let faces: [[[f32; 3]; 4]; 6] = [
        // +z
        [[-w, -h, d], [w, -h, d], [w, h, d], [-w, h, d]],
        // -z
        [[w, -h, -d], [-w, -h, -d], [-w, h, -d], [w, h, -d]],
        // -x
        [[-w, -h, -d], [-w, -h, d], [-w, h, d], [-w, h, -d]],
        // +x
        [[w, -h, d], [w, -h, -d], [w, h, -d], [w, h, d]],
        // +y
        [[-w, h, d], [w, h, d], [w, h, -d], [-w, h, -d]],
        // -y
        [[-w, -h, -d], [w, -h, -d], [w, -h, d], [-w, -h, d]],
    ];
    let face_uvs: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for face in faces {
        let base = vertices.len() as u16;
        for (corner, uv) in face.iter().zip(face_uvs.iter()) {
            vertices.push(Vertex {
                position: *corner,
                uv: *uv,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::{box_mesh, quad_mesh};

    #[test]
    fn quad_mesh_spans_requested_extent() {
        let (vertices, indices) = quad_mesh(3.0, 2.5);
        assert_eq!(vertices.len(), 4);
        assert_eq!(indices.len(), 6);
        let xs: Vec<f32> = vertices.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = vertices.iter().map(|v| v.position[1]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 1.5);
        assert_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), -1.25);
        assert!(vertices.iter().all(|v| v.position[2] == 0.0));
    }

    #[test]
    fn quad_uvs_cover_unit_square() {
        let (vertices, _) = quad_mesh(1.0, 1.0);
        for v in &vertices {
            assert!((0.0..=1.0).contains(&v.uv[0]));
            assert!((0.0..=1.0).contains(&v.uv[1]));
        }
        // Bottom-left vertex samples the bottom of the image.
        assert_eq!(vertices[0].uv, [0.0, 1.0]);
    }

    #[test]
    fn box_mesh_has_six_faces() {
        let (vertices, indices) = box_mesh(0.4, 0.5, 0.02);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        let zs: Vec<f32> = vertices.iter().map(|v| v.position[2]).collect();
        assert!((zs.iter().cloned().fold(f32::MIN, f32::max) - 0.01).abs() < 1e-7);
    }
}
