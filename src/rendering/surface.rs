//! Render surface lifecycle
//!
//! Owns the wgpu instance/adapter/device/queue and the drawing surface for one
//! open cycle of the viewer. Sizing goes through `SurfaceSpec`, which applies
//! the density multiplier and the per-axis pixel budget. Context loss is
//! detected here and is recoverable only by a fresh open.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use winit::window::Window;

#[derive(Debug, Clone, Error)]
pub enum SurfaceError {
    #[error("failed to create drawing surface: {reason}")]
    CreateFailed { reason: String },

    #[error("no suitable graphics adapter found")]
    NoAdapter,

    #[error("failed to acquire graphics device: {reason}")]
    DeviceFailed { reason: String },

    #[error("graphics context lost")]
    ContextLost,

    #[error("frame skipped: {reason}")]
    FrameSkipped { reason: String },
}

/// Requested surface dimensions: logical size scaled by the density
/// multiplier, clamped to the pixel budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSpec {
    pub logical_width: u32,
    pub logical_height: u32,
    pub density: f32,
    pub max_dim: u32,
}

impl SurfaceSpec {
    /// Pixel dimensions, never zero and never over budget. A collapsed layout
    /// box falls back to a square default so surface creation cannot fail on
    /// a zero extent.
    pub fn pixel_size(&self) -> (u32, u32) {
        let mut w = (self.logical_width as f32 * self.density).floor() as u32;
        let mut h = (self.logical_height as f32 * self.density).floor() as u32;
        if w == 0 || h == 0 {
            w = (600.0 * self.density) as u32;
            h = (600.0 * self.density) as u32;
        }
        (
            w.clamp(2, self.max_dim.max(2)),
            h.clamp(2, self.max_dim.max(2)),
        )
    }
}

/// The GPU-backed drawing surface for one open cycle.
pub struct RenderSurface {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    lost: bool,
}

impl RenderSurface {
    /// Allocate a fresh surface for the window. Failure is terminal for the
    /// session and must be shown as a status message, not a panic.
    pub async fn new(window: Arc<Window>, spec: &SurfaceSpec) -> Result<Self, SurfaceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| SurfaceError::CreateFailed {
                reason: e.to_string(),
            })?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SurfaceError::NoAdapter)?;
        info!("Graphics adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| SurfaceError::DeviceFailed {
                reason: e.to_string(),
            })?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let (width, height) = spec.pixel_size();
        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or_else(|| {
                capabilities
                    .formats
                    .first()
                    .copied()
                    .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb)
            });
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!("Drawing surface configured at {}x{} ({:?})", width, height, format);

        Ok(Self {
            device,
            queue,
            surface,
            config,
            lost: false,
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Reconfigure to the spec's pixel size. No-op when nothing changed or
    /// the context is gone.
    pub fn resize(&mut self, spec: &SurfaceSpec) {
        if self.lost {
            return;
        }
        let (width, height) = spec.pixel_size();
        if width == self.config.width && height == self.config.height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Acquire the next frame. `ContextLost` means the session can only be
    /// recovered by closing and reopening; other errors skip the frame.
    pub fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, SurfaceError> {
        if self.lost {
            return Err(SurfaceError::ContextLost);
        }
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::OutOfMemory) => {
                warn!("Graphics context lost");
                self.lost = true;
                Err(SurfaceError::ContextLost)
            }
            Err(wgpu::SurfaceError::Outdated) => {
                // stale swapchain after a resize; reconfigure and skip once
                self.surface.configure(&self.device, &self.config);
                Err(SurfaceError::FrameSkipped {
                    reason: "surface outdated".to_string(),
                })
            }
            Err(e) => Err(SurfaceError::FrameSkipped {
                reason: e.to_string(),
            }),
        }
    }

    /// Explicit teardown: drops the swapchain and releases the device.
    pub fn destroy(self) {
        info!("Releasing drawing surface and graphics device");
        drop(self.surface);
        self.device.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_size_honors_density_and_budget() {
        let spec = SurfaceSpec {
            logical_width: 800,
            logical_height: 600,
            density: 1.5,
            max_dim: 4096,
        };
        assert_eq!(spec.pixel_size(), (1200, 900));

        let capped = SurfaceSpec {
            logical_width: 1600,
            logical_height: 1600,
            density: 1.0,
            max_dim: 1400,
        };
        assert_eq!(capped.pixel_size(), (1400, 1400));
    }

    #[test]
    fn collapsed_layout_falls_back_to_default_square() {
        let spec = SurfaceSpec {
            logical_width: 0,
            logical_height: 0,
            density: 1.0,
            max_dim: 4096,
        };
        assert_eq!(spec.pixel_size(), (600, 600));
    }

    #[test]
    fn pixel_size_never_reaches_zero() {
        let spec = SurfaceSpec {
            logical_width: 1,
            logical_height: 1,
            density: 0.9,
            max_dim: 4096,
        };
        let (w, h) = spec.pixel_size();
        assert!(w >= 2 && h >= 2);
    }
}
