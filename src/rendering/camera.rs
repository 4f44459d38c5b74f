//! Orbit camera and pointer controls
//!
//! Pointer drag changes azimuth/elevation, the wheel changes distance, and an
//! exponential damping step smooths the response while an animated preset
//! runs. `reset` restores the fixed default pose.

use cgmath::{perspective, Deg, Matrix4, Point3, Vector3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

const DEFAULT_TARGET: Point3<f32> = Point3::new(0.0, 12.0, 0.0);
const DEFAULT_DISTANCE: f32 = 60.0;
const DEFAULT_FOV_DEG: f32 = 55.0;
const DEFAULT_ZOOM: f32 = 0.9;
const DAMPING_FACTOR: f32 = 0.08;

const MIN_DISTANCE: f32 = 20.0;
const MAX_DISTANCE: f32 = 150.0;
const MIN_ELEVATION: f32 = -1.4;
const MAX_ELEVATION: f32 = 1.4;
const DRAG_SENSITIVITY: f32 = 0.008;
const WHEEL_SENSITIVITY: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    pub target: Point3<f32>,
    pub fov_deg: f32,
    pub zoom: f32,
    pub aspect: f32,
}

impl OrbitCamera {
    pub fn default_pose(aspect: f32) -> Self {
        Self {
            azimuth: 0.0,
            elevation: 0.0,
            distance: DEFAULT_DISTANCE,
            target: DEFAULT_TARGET,
            fov_deg: DEFAULT_FOV_DEG,
            zoom: DEFAULT_ZOOM,
            aspect,
        }
    }

    pub fn eye(&self) -> Point3<f32> {
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        let (sin_el, cos_el) = self.elevation.sin_cos();
        Point3::new(
            self.target.x + self.distance * cos_el * sin_az,
            self.target.y + self.distance * sin_el,
            self.target.z + self.distance * cos_el * cos_az,
        )
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        let view = Matrix4::look_at_rh(self.eye(), self.target, Vector3::unit_y());
        let fov = (self.fov_deg / self.zoom.max(0.01)).clamp(1.0, 170.0);
        let proj = perspective(Deg(fov), self.aspect.max(0.01), 0.1, 500.0);
        proj * view
    }
}

/// What a processed input event means for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    None,
    DragStart,
    Changed,
    DragEnd,
}

#[derive(Debug)]
pub struct OrbitControls {
    pub camera: OrbitCamera,
    /// Locked while an animated preset owns the motion; direct pointer input
    /// still overrides and resumes interactive redraw.
    pub enabled: bool,
    pub damping_enabled: bool,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
    goal_azimuth: f32,
    goal_elevation: f32,
    goal_distance: f32,
}

impl OrbitControls {
    pub fn new(aspect: f32) -> Self {
        let camera = OrbitCamera::default_pose(aspect);
        Self {
            goal_azimuth: camera.azimuth,
            goal_elevation: camera.elevation,
            goal_distance: camera.distance,
            camera,
            enabled: true,
            damping_enabled: false,
            dragging: false,
            last_cursor: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.camera.aspect = aspect;
    }

    /// Feed a window event through the controls.
    pub fn process_event(&mut self, event: &WindowEvent) -> ControlEvent {
        match event {
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = true;
                self.last_cursor = None;
                ControlEvent::DragStart
            }
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => {
                if self.dragging {
                    self.dragging = false;
                    self.last_cursor = None;
                    ControlEvent::DragEnd
                } else {
                    ControlEvent::None
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if !self.dragging {
                    return ControlEvent::None;
                }
                let current = (position.x, position.y);
                if let Some((lx, ly)) = self.last_cursor {
                    let dx = (current.0 - lx) as f32;
                    let dy = (current.1 - ly) as f32;
                    self.goal_azimuth -= dx * DRAG_SENSITIVITY;
                    self.goal_elevation = (self.goal_elevation + dy * DRAG_SENSITIVITY)
                        .clamp(MIN_ELEVATION, MAX_ELEVATION);
                }
                self.last_cursor = Some(current);
                ControlEvent::Changed
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
                };
                self.goal_distance = (self.goal_distance * (1.0 - lines * WHEEL_SENSITIVITY))
                    .clamp(MIN_DISTANCE, MAX_DISTANCE);
                ControlEvent::Changed
            }
            _ => ControlEvent::None,
        }
    }

    /// Advance the damped motion one step. Returns true while the camera is
    /// still converging toward its goal pose (another redraw is warranted).
    pub fn update(&mut self) -> bool {
        let factor = if self.damping_enabled {
            DAMPING_FACTOR
        } else {
            1.0
        };
        let da = self.goal_azimuth - self.camera.azimuth;
        let de = self.goal_elevation - self.camera.elevation;
        let dd = self.goal_distance - self.camera.distance;
        self.camera.azimuth += da * factor;
        self.camera.elevation += de * factor;
        self.camera.distance += dd * factor;
        da.abs() > 1e-4 || de.abs() > 1e-4 || dd.abs() > 1e-3
    }

    /// Restore position, target, zoom and field of view to the defaults.
    pub fn reset(&mut self) {
        let aspect = self.camera.aspect;
        self.camera = OrbitCamera::default_pose(aspect);
        self.goal_azimuth = self.camera.azimuth;
        self.goal_elevation = self.camera.elevation;
        self.goal_distance = self.camera.distance;
        self.last_cursor = None;
    }

    /// Nudge the azimuth goal; drives the rotate preset.
    pub fn orbit_by(&mut self, delta_azimuth: f32) {
        self.goal_azimuth += delta_azimuth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    fn drag(controls: &mut OrbitControls, from: (f64, f64), to: (f64, f64)) {
        controls.process_event(&WindowEvent::MouseInput {
            device_id: winit::event::DeviceId::dummy(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        });
        for p in [from, to] {
            controls.process_event(&WindowEvent::CursorMoved {
                device_id: winit::event::DeviceId::dummy(),
                position: PhysicalPosition::new(p.0, p.1),
            });
        }
        controls.process_event(&WindowEvent::MouseInput {
            device_id: winit::event::DeviceId::dummy(),
            state: ElementState::Released,
            button: MouseButton::Left,
        });
    }

    #[test]
    fn drag_emits_start_and_end() {
        let mut controls = OrbitControls::new(1.0);
        let start = controls.process_event(&WindowEvent::MouseInput {
            device_id: winit::event::DeviceId::dummy(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        });
        assert_eq!(start, ControlEvent::DragStart);
        let end = controls.process_event(&WindowEvent::MouseInput {
            device_id: winit::event::DeviceId::dummy(),
            state: ElementState::Released,
            button: MouseButton::Left,
        });
        assert_eq!(end, ControlEvent::DragEnd);
    }

    #[test]
    fn reset_restores_default_pose_after_drag() {
        let mut controls = OrbitControls::new(1.6);
        drag(&mut controls, (10.0, 10.0), (200.0, 80.0));
        while controls.update() {}
        assert!(controls.camera.azimuth.abs() > 1e-3);

        controls.reset();
        assert_eq!(controls.camera.azimuth, 0.0);
        assert_eq!(controls.camera.elevation, 0.0);
        assert_eq!(controls.camera.distance, DEFAULT_DISTANCE);
        assert_eq!(controls.camera.zoom, DEFAULT_ZOOM);
        assert_eq!(controls.camera.fov_deg, DEFAULT_FOV_DEG);
        assert_eq!(controls.camera.aspect, 1.6);
        assert!(!controls.update());
    }

    #[test]
    fn damping_converges_gradually() {
        let mut controls = OrbitControls::new(1.0);
        controls.damping_enabled = true;
        controls.orbit_by(1.0);
        assert!(controls.update());
        let after_one = controls.camera.azimuth;
        assert!(after_one > 0.0 && after_one < 0.2);
        for _ in 0..300 {
            controls.update();
        }
        assert!((controls.camera.azimuth - 1.0).abs() < 1e-3);
    }

    #[test]
    fn wheel_zoom_is_clamped() {
        let mut controls = OrbitControls::new(1.0);
        for _ in 0..100 {
            controls.process_event(&WindowEvent::MouseWheel {
                device_id: winit::event::DeviceId::dummy(),
                delta: MouseScrollDelta::LineDelta(0.0, 10.0),
                phase: winit::event::TouchPhase::Moved,
            });
        }
        controls.update();
        while controls.update() {}
        assert!(controls.camera.distance >= MIN_DISTANCE - 1e-3);
    }
}
