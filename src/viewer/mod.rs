//! Viewer modal lifecycle
//!
//! One `ViewerModal` outlives many open/close cycles. Each cycle gets a fresh
//! epoch; results of asynchronous work started in an earlier cycle carry the
//! epoch they were started under and are dropped when it no longer matches.
//! Closing follows a fixed order: stop scheduling, release GPU resources,
//! detach input hooks, hide, restore focus. Every step is idempotent so a
//! second close is harmless.

pub mod animation;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{DeviceClass, ViewerSettings};
use crate::identity::{PageContext, PlayerIdentity};
use crate::networking::profile::{ProfileInfo, SkinModelHint};
use crate::networking::skin::{SkinResolution, SkinSource};
use crate::rendering::scheduler::{FrameBudget, FrameScheduler, RegimeExit};
use crate::rendering::{AvatarRenderer, BackSlot, OrbitControls, RenderSurface, SurfaceSpec};
use crate::ui::StatusLine;
use animation::{AnimationMode, AnimationState, BackEquipment};

fn back_slot(back: Option<BackEquipment>) -> BackSlot {
    match back {
        None => BackSlot::None,
        Some(BackEquipment::Cape) => BackSlot::Cape,
        Some(BackEquipment::Wings) => BackSlot::Wings,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalPhase {
    Closed,
    Opening,
    Open,
    Closing,
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("viewer is already open")]
    AlreadyOpen,
}

/// Keyboard focus containment while the modal is open. The surrounding page
/// is inert; Tab cycles within the modal's own controls and the previously
/// focused element is restored on close.
#[derive(Debug, Default)]
pub struct FocusTrap {
    opener: Option<String>,
    controls: Vec<String>,
    focused: usize,
}

impl FocusTrap {
    pub fn capture(&mut self, opener: Option<String>, controls: Vec<String>) {
        self.opener = opener;
        self.controls = controls;
        self.focused = 0;
    }

    pub fn focused(&self) -> Option<&str> {
        self.controls.get(self.focused).map(String::as_str)
    }

    /// Advance focus; wraps in both directions.
    pub fn cycle(&mut self, backwards: bool) -> Option<&str> {
        if self.controls.is_empty() {
            return None;
        }
        let len = self.controls.len();
        self.focused = if backwards {
            (self.focused + len - 1) % len
        } else {
            (self.focused + 1) % len
        };
        self.focused()
    }

    /// Release the trap; returns the element to hand focus back to.
    pub fn release(&mut self) -> Option<String> {
        self.controls.clear();
        self.focused = 0;
        self.opener.take()
    }
}

/// Everything owned by one open cycle. Dropped wholesale on close.
pub struct RenderSession {
    pub identity: PlayerIdentity,
    pub scheduler: FrameScheduler,
    pub controls: OrbitControls,
    pub animation: AnimationState,
    pub surface: Option<RenderSurface>,
    pub renderer: Option<AvatarRenderer>,
    logical_size: (u32, u32),
}

impl RenderSession {
    /// Draw one frame with the session's camera. A session without a surface
    /// (GPU init failed or still pending) draws nothing.
    pub fn draw(&mut self) -> Result<(), crate::rendering::renderer::RenderError> {
        if let (Some(surface), Some(renderer)) = (self.surface.as_mut(), self.renderer.as_mut()) {
            renderer.draw(surface, &self.controls.camera)
        } else {
            Ok(())
        }
    }

    /// A pointer drag started; direct input unlocks the controls for its
    /// duration even while a preset owns the camera. Returns whether a redraw
    /// is due.
    pub fn begin_drag(&mut self) -> bool {
        self.controls.enabled = true;
        self.scheduler.begin_drag()
    }

    /// The drag ended; the active preset decides whether the controls go back
    /// to locked. Returns whether a settle draw is due.
    pub fn end_drag(&mut self) -> bool {
        self.controls.enabled = !self.animation.mode().is_animated();
        self.scheduler.end_drag()
    }
}

pub struct ViewerModal {
    phase: ModalPhase,
    epoch: u64,
    device: DeviceClass,
    settings: ViewerSettings,
    pub status: StatusLine,
    pub focus: FocusTrap,
    session: Option<RenderSession>,
    suspended: bool,
}

impl ViewerModal {
    pub fn new(device: DeviceClass) -> Self {
        Self::with_settings(device, ViewerSettings::load())
    }

    /// Build the modal around an explicit settings store. Tests hand in
    /// `ViewerSettings::in_memory()` so selections never touch the real
    /// config file.
    pub fn with_settings(device: DeviceClass, settings: ViewerSettings) -> Self {
        Self {
            phase: ModalPhase::Closed,
            epoch: 0,
            device,
            settings,
            status: StatusLine::new(),
            focus: FocusTrap::default(),
            session: None,
            suspended: false,
        }
    }

    pub fn phase(&self) -> ModalPhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn device(&self) -> DeviceClass {
        self.device
    }

    /// Whether results stamped with `epoch` may still be applied.
    pub fn is_live(&self, epoch: u64) -> bool {
        epoch == self.epoch && matches!(self.phase, ModalPhase::Opening | ModalPhase::Open)
    }

    pub fn session(&self) -> Option<&RenderSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut RenderSession> {
        self.session.as_mut()
    }

    pub fn title(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.identity.title())
            .unwrap_or_else(|| "Player skin".to_string())
    }

    /// Begin a new open cycle. Only legal from `Closed`; the caller resolves
    /// a surface asynchronously and hands it over via `attach_surface`.
    /// Returns the epoch to stamp onto all asynchronous work of this cycle.
    pub fn open(&mut self, ctx: &PageContext) -> Result<u64, OpenError> {
        if self.phase != ModalPhase::Closed {
            warn!("Open rejected, viewer is {:?}", self.phase);
            return Err(OpenError::AlreadyOpen);
        }
        self.epoch += 1;
        self.phase = ModalPhase::Opening;
        self.suspended = false;
        self.status.clear();

        let identity = PlayerIdentity::resolve(ctx);
        info!(epoch = self.epoch, ?identity, "Viewer opening");

        let mode = self
            .settings
            .animation_mode
            .as_deref()
            .and_then(AnimationMode::parse)
            .unwrap_or_else(|| AnimationMode::default_for(&self.device));

        self.focus.capture(
            ctx.dom_name.clone(),
            vec![
                "mode-select".to_string(),
                "back-toggle".to_string(),
                "close-button".to_string(),
            ],
        );

        self.session = Some(RenderSession {
            identity,
            scheduler: FrameScheduler::new(&self.device, FrameBudget::default()),
            controls: OrbitControls::new(1.0),
            animation: AnimationState::new(mode),
            surface: None,
            renderer: None,
            logical_size: (600, 600),
        });
        Ok(self.epoch)
    }

    /// The desired surface dimensions for the current density and budget.
    pub fn surface_spec(&self) -> Option<SurfaceSpec> {
        let session = self.session.as_ref()?;
        Some(SurfaceSpec {
            logical_width: session.logical_size.0,
            logical_height: session.logical_size.1,
            density: session.scheduler.density(),
            max_dim: self.device.max_surface_dim(),
        })
    }

    /// GPU initialization finished; the modal becomes fully open and the
    /// persisted animation preset starts.
    pub fn attach_surface(&mut self, surface: RenderSurface, renderer: AvatarRenderer) {
        if !matches!(self.phase, ModalPhase::Opening) {
            // the cycle was closed while the surface was being created
            surface.destroy();
            return;
        }
        let Some(session) = self.session.as_mut() else {
            surface.destroy();
            return;
        };
        session.controls.set_aspect(surface.aspect());
        session.surface = Some(surface);
        session.renderer = Some(renderer);
        self.phase = ModalPhase::Open;

        let mode = self
            .session
            .as_ref()
            .map(|s| s.animation.mode())
            .unwrap_or(AnimationMode::None);
        self.start_mode(mode);
    }

    /// GPU initialization failed; the modal stays visible and reports the
    /// failure instead of rendering.
    pub fn fail_init(&mut self, message: impl Into<String>) {
        if matches!(self.phase, ModalPhase::Opening) {
            self.phase = ModalPhase::Open;
        }
        if let Some(session) = self.session.as_mut() {
            session.scheduler.stop();
        }
        self.status.error(message);
    }

    fn start_mode(&mut self, mode: AnimationMode) {
        let max_dim = self.device.max_surface_dim();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let change = session.animation.set_mode(mode);
        session.controls.damping_enabled = change.damping;
        // the preset owns the camera while it runs; a drag overrides temporarily
        session.controls.enabled = !change.continuous;
        if let Some(renderer) = session.renderer.as_mut() {
            renderer.back_slot = back_slot(session.animation.back());
        }
        if change.continuous {
            let density = session.scheduler.enter_continuous(change.frame_interval);
            let spec = SurfaceSpec {
                logical_width: session.logical_size.0,
                logical_height: session.logical_size.1,
                density,
                max_dim,
            };
            if let Some(surface) = session.surface.as_mut() {
                surface.resize(&spec);
            }
        } else if session.scheduler.regime() == crate::rendering::Regime::Continuous {
            let RegimeExit { density, .. } = session.scheduler.leave_continuous();
            let spec = SurfaceSpec {
                logical_width: session.logical_size.0,
                logical_height: session.logical_size.1,
                density,
                max_dim,
            };
            if let Some(surface) = session.surface.as_mut() {
                surface.resize(&spec);
            }
        } else {
            session.scheduler.request_draw();
        }
    }

    /// User picked an animation preset. Persisted immediately, applied to the
    /// running session.
    pub fn select_mode(&mut self, mode: AnimationMode) {
        self.settings.animation_mode = Some(mode.as_str().to_string());
        self.settings.save();
        self.start_mode(mode);
    }

    /// Toggle the cape overlay, when one exists.
    pub fn toggle_back(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.animation.toggle_back();
        let slot = back_slot(session.animation.back());
        if let Some(renderer) = session.renderer.as_mut() {
            renderer.back_slot = slot;
        }
        session.scheduler.request_draw();
    }

    /// Apply a resolved skin, unless the cycle it was fetched for is gone.
    pub fn apply_skin(&mut self, epoch: u64, resolution: SkinResolution, had_remote: bool) {
        if !self.is_live(epoch) {
            debug!("Dropping stale skin result (epoch {})", epoch);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match resolution {
            SkinResolution::Loaded { source, data } => {
                let bundled = source == SkinSource::Bundled;
                if let Some(renderer) = session.renderer.as_mut() {
                    let hint = renderer.model_hint;
                    if let Err(e) = renderer.load_skin(&data, hint) {
                        warn!("Skin upload failed: {}", e);
                        self.status.warning("Skin could not be displayed.");
                        return;
                    }
                }
                if bundled && had_remote {
                    self.status.warning("Showing the default skin.");
                } else {
                    self.status.clear();
                }
                session.scheduler.request_draw();
            }
            SkinResolution::Exhausted => {
                self.status.error("Skin could not be loaded.");
            }
        }
    }

    /// Apply a fetched cape texture to a still-live cycle.
    pub fn apply_cape(&mut self, epoch: u64, data: &[u8]) {
        if !self.is_live(epoch) {
            debug!("Dropping stale cape result (epoch {})", epoch);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(renderer) = session.renderer.as_mut() {
            if let Err(e) = renderer.load_cape(data) {
                warn!("Cape upload failed: {}", e);
                return;
            }
        }
        session.animation.cape_loaded();
        let slot = back_slot(session.animation.back());
        if let Some(renderer) = session.renderer.as_mut() {
            renderer.back_slot = slot;
        }
        session.scheduler.request_draw();
    }

    /// Apply profile metadata (model flavor) to a still-live cycle. The cape
    /// itself arrives separately through `apply_cape`.
    pub fn apply_profile(&mut self, epoch: u64, profile: Option<ProfileInfo>) {
        if !self.is_live(epoch) {
            debug!("Dropping stale profile result (epoch {})", epoch);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let model = profile.map(|p| p.model).unwrap_or(SkinModelHint::Unknown);
        if let Some(renderer) = session.renderer.as_mut() {
            renderer.model_hint = model;
        }
    }

    /// The layout box changed. May be deferred by the scheduler while a
    /// continuous animation runs.
    pub fn note_resize(&mut self, logical_width: u32, logical_height: u32) {
        let max_dim = self.device.max_surface_dim();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.logical_size = (logical_width, logical_height);
        if session.scheduler.note_resize() {
            let spec = SurfaceSpec {
                logical_width,
                logical_height,
                density: session.scheduler.density(),
                max_dim,
            };
            if let Some(surface) = session.surface.as_mut() {
                surface.resize(&spec);
                session.controls.set_aspect(surface.aspect());
            }
            session.scheduler.request_draw();
        }
    }

    /// Apply a resize that the scheduler deferred mid-animation.
    pub fn apply_deferred_resize(&mut self) {
        let max_dim = self.device.max_surface_dim();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let spec = SurfaceSpec {
            logical_width: session.logical_size.0,
            logical_height: session.logical_size.1,
            density: session.scheduler.density(),
            max_dim,
        };
        if let Some(surface) = session.surface.as_mut() {
            surface.resize(&spec);
            session.controls.set_aspect(surface.aspect());
        }
    }

    /// The adaptive step picked a new density; resize the surface to it.
    pub fn apply_density(&mut self, density: f32) {
        let max_dim = self.device.max_surface_dim();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let spec = SurfaceSpec {
            logical_width: session.logical_size.0,
            logical_height: session.logical_size.1,
            density,
            max_dim,
        };
        if let Some(surface) = session.surface.as_mut() {
            surface.resize(&spec);
        }
    }

    /// Page visibility changed. Hidden pages stop consuming frames; the
    /// animation resumes exactly where it paused.
    pub fn on_visibility(&mut self, visible: bool) {
        self.suspended = !visible;
        if visible {
            if let Some(session) = self.session.as_mut() {
                session.scheduler.request_draw();
            }
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// The graphics context is gone for good; keep the modal up, stop drawing,
    /// tell the user.
    pub fn on_context_lost(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.scheduler.stop();
        }
        self.status
            .error("Graphics context lost. Close and reopen the viewer.");
    }

    /// Tab focus cycling while the modal is open.
    pub fn on_tab(&mut self, backwards: bool) -> Option<&str> {
        if matches!(self.phase, ModalPhase::Closed) {
            return None;
        }
        self.focus.cycle(backwards)
    }

    /// Tear the cycle down. Safe to call at any time, in any phase, more than
    /// once. Returns the element that should regain focus, if any.
    pub fn close(&mut self) -> Option<String> {
        if matches!(self.phase, ModalPhase::Closed) {
            return None;
        }
        self.phase = ModalPhase::Closing;
        info!(epoch = self.epoch, "Viewer closing");

        if let Some(mut session) = self.session.take() {
            // 1. no further frames get scheduled
            session.scheduler.stop();
            // 2. GPU resources go before the window does
            session.renderer.take();
            if let Some(surface) = session.surface.take() {
                surface.destroy();
            }
            // 3. dropping the session detaches the input hooks with it
        }

        // 4. hide
        self.status.clear();
        self.suspended = false;
        self.phase = ModalPhase::Closed;

        // 5. hand focus back
        self.focus.release()
    }
}
