//! Minimal avatar draw pass
//!
//! Uploads the skin and back-overlay textures and draws them on flat quads
//! with the orbit camera's view-projection. Deliberately small: the viewer's
//! complexity lives in lifecycle and scheduling, not in model construction.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use wgpu::util::DeviceExt;

use super::camera::OrbitCamera;
use super::surface::{RenderSurface, SurfaceError};
use crate::networking::profile::SkinModelHint;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to decode texture image: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

const SHADER: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> camera: Camera;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

struct VsOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    out.clip_position = camera.view_proj * vec4<f32>(in.position, 1.0);
    out.uv = in.uv;
    return out;
}

@group(1) @binding(0)
var t_diffuse: texture_2d<f32>;
@group(1) @binding(1)
var s_diffuse: sampler;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let color = textureSample(t_diffuse, s_diffuse, in.uv);
    if (color.a < 0.1) {
        discard;
    }
    return color;
}
"#;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

fn quad(cx: f32, cy: f32, z: f32, w: f32, h: f32) -> [Vertex; 6] {
    let (l, r) = (cx - w / 2.0, cx + w / 2.0);
    let (b, t) = (cy - h / 2.0, cy + h / 2.0);
    let v = |x: f32, y: f32, u: f32, vv: f32| Vertex {
        position: [x, y, z],
        uv: [u, vv],
    };
    [
        v(l, b, 0.0, 1.0),
        v(r, b, 1.0, 1.0),
        v(r, t, 1.0, 0.0),
        v(l, b, 0.0, 1.0),
        v(r, t, 1.0, 0.0),
        v(l, t, 0.0, 0.0),
    ]
}

struct BoundTexture {
    bind_group: wgpu::BindGroup,
}

/// Which texture fills the back-overlay quad. The wing overlay is compiled in
/// so the slot always has something to show; the cape arrives later, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackSlot {
    #[default]
    None,
    Cape,
    Wings,
}

pub struct AvatarRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    skin: BoundTexture,
    wings: BoundTexture,
    cape: Option<BoundTexture>,
    pub back_slot: BackSlot,
    pub model_hint: SkinModelHint,
}

impl AvatarRenderer {
    pub fn new(
        surface: &RenderSurface,
        initial_skin: &[u8],
        wing_overlay: &[u8],
    ) -> Result<Self, RenderError> {
        let device = surface.device.clone();
        let queue = surface.queue.clone();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("avatar shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera layout"),
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

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
            label: Some("avatar pipeline layout"),
            bind_group_layouts: &[&camera_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("avatar pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface.format(),
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera buffer"),
            contents: bytemuck::cast_slice(&[[[0.0f32; 4]; 4]]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera bind group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // avatar billboard around the camera target, back overlay behind it
        let mut vertices = Vec::with_capacity(12);
        vertices.extend_from_slice(&quad(0.0, 12.0, 0.0, 16.0, 32.0));
        vertices.extend_from_slice(&quad(0.0, 16.0, -2.0, 10.0, 16.0));
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("avatar vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let skin = upload_texture(&device, &queue, &texture_layout, initial_skin, "skin")?;
        let wings = upload_texture(&device, &queue, &texture_layout, wing_overlay, "wings")?;

        Ok(Self {
            device,
            queue,
            pipeline,
            texture_layout,
            camera_buffer,
            camera_bind_group,
            vertex_buffer,
            skin,
            wings,
            cape: None,
            back_slot: BackSlot::None,
            model_hint: SkinModelHint::Unknown,
        })
    }

    /// Swap in a new skin texture.
    pub fn load_skin(&mut self, bytes: &[u8], hint: SkinModelHint) -> Result<(), RenderError> {
        self.skin = upload_texture(&self.device, &self.queue, &self.texture_layout, bytes, "skin")?;
        self.model_hint = hint;
        Ok(())
    }

    /// Store the downloaded cape texture. Which slot is drawn stays with the
    /// animation state, not with loading.
    pub fn load_cape(&mut self, bytes: &[u8]) -> Result<(), RenderError> {
        self.cape = Some(upload_texture(
            &self.device,
            &self.queue,
            &self.texture_layout,
            bytes,
            "cape",
        )?);
        Ok(())
    }

    /// Draw one frame. A skipped frame is not an error for the caller; only
    /// context loss propagates.
    pub fn draw(
        &mut self,
        surface: &mut RenderSurface,
        camera: &OrbitCamera,
    ) -> Result<(), RenderError> {
        let frame = match surface.acquire() {
            Ok(frame) => frame,
            Err(SurfaceError::FrameSkipped { reason }) => {
                debug!("Frame skipped: {}", reason);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let matrix: [[f32; 4]; 4] = camera.view_proj().into();
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[matrix]));

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("avatar encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("avatar pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.07,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));

            let back = match self.back_slot {
                BackSlot::None => None,
                BackSlot::Cape => self.cape.as_ref(),
                BackSlot::Wings => Some(&self.wings),
            };
            if let Some(back) = back {
                pass.set_bind_group(1, &back.bind_group, &[]);
                pass.draw(6..12, 0..1);
            }
            pass.set_bind_group(1, &self.skin.bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    bytes: &[u8],
    label: &str,
) -> Result<BoundTexture, RenderError> {
    let img = image::load_from_memory(bytes)?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
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
        &rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    // skin pixels want hard edges
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });
    debug!("Uploaded {} texture ({}x{})", label, width, height);
    Ok(BoundTexture { bind_group })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_vertices_span_requested_extent() {
        let verts = quad(0.0, 12.0, 0.0, 16.0, 32.0);
        let xs: Vec<f32> = verts.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = verts.iter().map(|v| v.position[1]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), -8.0);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 8.0);
        assert_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), -4.0);
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 28.0);
    }

    #[test]
    fn bundled_textures_decode() {
        use crate::networking::skin::{BUNDLED_SKIN, BUNDLED_WINGS};
        assert!(image::load_from_memory(BUNDLED_SKIN).is_ok());
        assert!(image::load_from_memory(BUNDLED_WINGS).is_ok());
    }
}
