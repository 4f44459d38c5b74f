//! Desktop shell for the viewer modal
//!
//! Wires the windowing loop to the modal lifecycle: window and GPU surface
//! creation on resume, input routing, the continuous/on-demand redraw split,
//! and the background fetch tasks whose results come back over a channel
//! stamped with the open-cycle epoch.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::Window;

use crate::identity::PageContext;
use crate::networking::profile::{HttpProfileFetcher, ProfileCache, ProfileInfo};
use crate::networking::skin::{
    fetch_cape, resolve_skin, skin_candidates, HttpTextureFetcher, SkinResolution, SkinSource,
    BUNDLED_SKIN, BUNDLED_WINGS,
};
use crate::rendering::renderer::RenderError;
use crate::rendering::{AvatarRenderer, ControlEvent, Regime, RenderSurface, SurfaceError};
use crate::viewer::animation::AnimationMode;
use crate::viewer::{ModalPhase, ViewerModal};

/// Azimuth advance per drawn frame of the ambient rotate preset.
const ROTATE_STEP: f32 = 0.02;

/// Result of one background fetch, stamped with the cycle it belongs to.
pub enum FetchEvent {
    Skin {
        epoch: u64,
        resolution: SkinResolution,
        had_remote: bool,
    },
    Cape {
        epoch: u64,
        data: Bytes,
    },
    Profile {
        epoch: u64,
        info: Option<ProfileInfo>,
    },
}

pub struct ViewerApp {
    modal: ViewerModal,
    page: PageContext,
    window: Option<Arc<Window>>,
    runtime: tokio::runtime::Handle,
    profiles: Arc<ProfileCache>,
    events_tx: mpsc::Sender<FetchEvent>,
    events_rx: mpsc::Receiver<FetchEvent>,
}

impl ViewerApp {
    pub fn new(
        modal: ViewerModal,
        page: PageContext,
        runtime: tokio::runtime::Handle,
        profile_base: impl Into<String>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let profiles = Arc::new(ProfileCache::new(Arc::new(HttpProfileFetcher::new(
            profile_base,
        ))));
        Self {
            modal,
            page,
            window: None,
            runtime,
            profiles,
            events_tx,
            events_rx,
        }
    }

    /// Kick off the skin, profile and cape fetches for the cycle `epoch`.
    fn spawn_fetches(&self, epoch: u64) {
        let Some(session) = self.modal.session() else {
            return;
        };
        let identity = session.identity.clone();

        let tx = self.events_tx.clone();
        let skin_identity = identity.clone();
        self.runtime.spawn(async move {
            let fetcher = HttpTextureFetcher::new();
            let candidates = skin_candidates(&skin_identity);
            let had_remote = candidates
                .iter()
                .any(|c| matches!(c, SkinSource::Remote(_)));
            let resolution = resolve_skin(&fetcher, candidates).await;
            let _ = tx.send(FetchEvent::Skin {
                epoch,
                resolution,
                had_remote,
            });
        });

        let tx = self.events_tx.clone();
        let profiles = self.profiles.clone();
        self.runtime.spawn(async move {
            let info = profiles.get_profile(&identity.uuid).await;
            let cape_url = info.as_ref().and_then(|i| i.cape_url.clone());
            let _ = tx.send(FetchEvent::Profile { epoch, info });
            if let Some(url) = cape_url {
                let fetcher = HttpTextureFetcher::new();
                if let Some(data) = fetch_cape(&fetcher, Some(&url)).await {
                    let _ = tx.send(FetchEvent::Cape { epoch, data });
                }
            }
        });
    }

    /// Apply everything the fetch tasks delivered. Stale epochs are dropped
    /// inside the modal. Returns whether anything was applied.
    fn drain_fetch_events(&mut self) -> bool {
        let mut applied = false;
        while let Ok(event) = self.events_rx.try_recv() {
            applied = true;
            match event {
                FetchEvent::Skin {
                    epoch,
                    resolution,
                    had_remote,
                } => self.modal.apply_skin(epoch, resolution, had_remote),
                FetchEvent::Cape { epoch, data } => self.modal.apply_cape(epoch, &data),
                FetchEvent::Profile { epoch, info } => self.modal.apply_profile(epoch, info),
            }
        }
        applied
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    /// One redraw: either a continuous-regime tick or a coalesced on-demand
    /// draw. Returns whether another redraw should be requested right away.
    fn redraw(&mut self) -> bool {
        if self.modal.is_suspended() {
            return false;
        }
        let regime = match self.modal.session() {
            Some(s) if s.scheduler.is_alive() => s.scheduler.regime(),
            _ => return false,
        };

        if regime == Regime::Continuous {
            let directive = match self.modal.session_mut() {
                Some(session) => session.scheduler.on_frame(Instant::now()),
                None => return false,
            };
            if directive.apply_resize {
                self.modal.apply_deferred_resize();
            }
            if let Some(density) = directive.density {
                self.modal.apply_density(density);
            }
            if directive.draw {
                let result = match self.modal.session_mut() {
                    Some(session) => {
                        if session.animation.mode() == AnimationMode::Rotate
                            && !session.controls.is_dragging()
                        {
                            session.controls.orbit_by(ROTATE_STEP);
                        }
                        session.controls.update();
                        session.draw()
                    }
                    None => Ok(()),
                };
                if let Err(e) = result {
                    self.handle_draw_error(e);
                    return false;
                }
            }
            return self
                .modal
                .session()
                .map_or(false, |s| s.scheduler.is_alive());
        }

        let (drew, converging, result) = match self.modal.session_mut() {
            Some(session) => {
                if session.scheduler.take_draw() {
                    let converging = session.controls.update();
                    (true, converging, session.draw())
                } else {
                    (false, false, Ok(()))
                }
            }
            None => (false, false, Ok(())),
        };
        if let Err(e) = result {
            self.handle_draw_error(e);
            return false;
        }
        if drew && converging {
            if let Some(session) = self.modal.session_mut() {
                session.scheduler.request_draw();
            }
            return true;
        }
        false
    }

    fn handle_draw_error(&mut self, error: RenderError) {
        match error {
            RenderError::Surface(SurfaceError::ContextLost) => self.modal.on_context_lost(),
            other => warn!("Draw failed: {}", other),
        }
    }

    fn handle_key(&mut self, event: &KeyEvent, event_loop: &ActiveEventLoop) {
        if event.state != ElementState::Pressed {
            return;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => {
                self.modal.close();
                event_loop.exit();
            }
            Key::Named(NamedKey::Tab) => {
                self.modal.on_tab(false);
            }
            Key::Character(c) => {
                let mode = match c.as_str() {
                    "1" => Some(AnimationMode::None),
                    "2" => Some(AnimationMode::Rotate),
                    "3" => Some(AnimationMode::Walk),
                    "4" => Some(AnimationMode::Idle),
                    "5" => Some(AnimationMode::Fly),
                    _ => None,
                };
                if let Some(mode) = mode {
                    self.modal.select_mode(mode);
                    self.request_redraw();
                } else if c.as_str() == "c" {
                    self.modal.toggle_back();
                    self.request_redraw();
                } else if c.as_str() == "r" {
                    if let Some(session) = self.modal.session_mut() {
                        session.controls.reset();
                        session.scheduler.request_draw();
                    }
                    self.request_redraw();
                }
            }
            _ => {}
        }
    }

    /// Route pointer input to the orbit controls. Returns true when the event
    /// was consumed.
    fn handle_pointer(&mut self, event: &WindowEvent) -> bool {
        let (consumed, redraw) = match self.modal.session_mut() {
            Some(session)
                if session.controls.enabled
                    || matches!(event, WindowEvent::MouseInput { .. }) =>
            {
                match session.controls.process_event(event) {
                    ControlEvent::DragStart => (true, session.begin_drag()),
                    ControlEvent::Changed => (true, session.scheduler.request_draw()),
                    ControlEvent::DragEnd => (true, session.end_drag()),
                    ControlEvent::None => (false, false),
                }
            }
            _ => (false, false),
        };
        if redraw {
            self.request_redraw();
        }
        consumed
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let epoch = match self.modal.open(&self.page) {
            Ok(epoch) => epoch,
            Err(e) => {
                warn!("Could not open viewer: {}", e);
                return;
            }
        };

        let attributes = Window::default_attributes()
            .with_title(self.modal.title())
            .with_inner_size(winit::dpi::LogicalSize::new(700.0, 800.0));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.modal
                    .fail_init(format!("Window creation failed: {}", e));
                return;
            }
        };
        self.window = Some(window.clone());

        let size = window.inner_size();
        self.modal.note_resize(size.width.max(1), size.height.max(1));

        let Some(spec) = self.modal.surface_spec() else {
            return;
        };
        match pollster::block_on(RenderSurface::new(window.clone(), &spec)) {
            Ok(surface) => match AvatarRenderer::new(&surface, BUNDLED_SKIN, BUNDLED_WINGS) {
                Ok(renderer) => {
                    self.modal.attach_surface(surface, renderer);
                    info!("Viewer ready (epoch {})", epoch);
                }
                Err(e) => {
                    surface.destroy();
                    self.modal
                        .fail_init(format!("Renderer initialization failed: {}", e));
                }
            },
            Err(e) => {
                self.modal
                    .fail_init(format!("3D view could not be initialized: {}", e));
            }
        }

        self.spawn_fetches(epoch);
        window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map_or(true, |w| w.id() != window_id) {
            return;
        }

        if self.handle_pointer(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.modal.close();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(&event, event_loop);
            }
            WindowEvent::Resized(size) => {
                self.modal
                    .note_resize(size.width.max(1), size.height.max(1));
                self.request_redraw();
            }
            WindowEvent::Occluded(occluded) => {
                self.modal.on_visibility(!occluded);
                if !occluded {
                    self.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                self.drain_fetch_events();
                if self.redraw() {
                    self.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let applied = self.drain_fetch_events();
        if self.modal.is_suspended() || !matches!(self.modal.phase(), ModalPhase::Open) {
            return;
        }
        let continuous = self.modal.session().map_or(false, |s| {
            s.scheduler.is_alive() && s.scheduler.regime() == Regime::Continuous
        });
        if continuous || applied {
            self.request_redraw();
        }
    }
}
