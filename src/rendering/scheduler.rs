//! Render loop scheduler
//!
//! Owns the two mutually exclusive redraw regimes of the viewer. On-demand
//! draws are coalesced to at most one per refresh; the continuous regime runs
//! a per-frame tick that throttles expensive draws to the preset's target
//! interval, applies deferred resizes at frame start, and adapts the render
//! density to the measured frame rate. All loop state is explicit here so the
//! regime and liveness are inspectable rather than captured in closures.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::DeviceClass;

/// Native refresh target (~60 FPS).
pub const NATIVE_FRAME: Duration = Duration::from_millis(16);
/// Throttled target for the rotate preset (~30 FPS).
pub const ROTATE_FRAME: Duration = Duration::from_millis(33);

/// Adaptive-resolution tuning. These are calibration parameters carried over
/// from field measurements, not a hard contract.
#[derive(Debug, Clone)]
pub struct FrameBudget {
    pub low_watermark_fps: f32,
    pub high_watermark_fps: f32,
    pub step_down: f32,
    pub step_up: f32,
    pub density_floor: f32,
    pub density_ceiling: f32,
    pub sample_window: Duration,
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self {
            low_watermark_fps: 50.0,
            high_watermark_fps: 58.0,
            step_down: 0.10,
            step_up: 0.05,
            density_floor: 0.9,
            density_ceiling: 1.5,
            sample_window: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    OnDemand,
    Continuous,
}

/// What the host should do for the current continuous tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameDirective {
    /// Run the expensive draw this tick.
    pub draw: bool,
    /// A resize was deferred during animation; apply it now, before drawing.
    pub apply_resize: bool,
    /// The adaptive step changed the density; resize the surface to this value.
    pub density: Option<f32>,
}

/// Result of leaving the continuous regime: the density to restore and the
/// mandatory settle draw, so the final visual state is never one frame stale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeExit {
    pub density: f32,
    pub settle_draw: bool,
}

#[derive(Debug)]
pub struct FrameScheduler {
    regime: Regime,
    alive: bool,
    needs_frame: bool,
    dragging: bool,
    pending_resize: bool,
    frame_interval: Duration,
    density_override: Option<f32>,
    default_density: f32,
    animating_density: f32,
    budget: FrameBudget,
    last_tick: Option<Instant>,
    throttle_acc: Duration,
    sample_elapsed: Duration,
    sample_frames: u32,
}

impl FrameScheduler {
    pub fn new(device: &DeviceClass, budget: FrameBudget) -> Self {
        Self {
            regime: Regime::OnDemand,
            alive: true,
            needs_frame: false,
            dragging: false,
            pending_resize: false,
            frame_interval: NATIVE_FRAME,
            density_override: None,
            default_density: device.density_cap(),
            animating_density: device.animating_density(),
            budget,
            last_tick: None,
            throttle_acc: Duration::ZERO,
            sample_elapsed: Duration::ZERO,
            sample_frames: 0,
        }
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Effective density multiplier for surface sizing.
    pub fn density(&self) -> f32 {
        self.density_override.unwrap_or(self.default_density)
    }

    /// Request a coalesced on-demand draw. Returns true when the caller must
    /// schedule one redraw; repeated requests before that redraw collapse, and
    /// requests while the continuous loop runs are covered by it.
    pub fn request_draw(&mut self) -> bool {
        if !self.alive || self.regime == Regime::Continuous || self.needs_frame {
            return false;
        }
        self.needs_frame = true;
        true
    }

    /// The scheduled on-demand redraw fired; returns whether to actually draw.
    pub fn take_draw(&mut self) -> bool {
        let draw = self.alive && self.needs_frame;
        self.needs_frame = false;
        draw
    }

    pub fn begin_drag(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        self.dragging = true;
        self.request_draw()
    }

    /// Drag released: one final settle draw, then the drag loop stops.
    pub fn end_drag(&mut self) -> bool {
        self.dragging = false;
        self.request_draw()
    }

    /// A container resize arrived. Returns true when it may be applied
    /// immediately; during continuous animation it is flagged instead and
    /// applied exactly once at the start of the next frame.
    pub fn note_resize(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        if self.regime == Regime::Continuous {
            self.pending_resize = true;
            false
        } else {
            true
        }
    }

    /// Enter the continuous regime for an animated preset. Returns the density
    /// override now in effect; the caller resizes the surface to it once.
    pub fn enter_continuous(&mut self, frame_interval: Duration) -> f32 {
        self.regime = Regime::Continuous;
        self.frame_interval = frame_interval;
        self.density_override = Some(self.animating_density);
        self.needs_frame = false;
        self.last_tick = None;
        self.throttle_acc = Duration::ZERO;
        self.sample_elapsed = Duration::ZERO;
        self.sample_frames = 0;
        debug!(
            "Continuous regime entered (interval {:?}, density {})",
            frame_interval, self.animating_density
        );
        self.density()
    }

    /// Leave the continuous regime: restore the default density and demand one
    /// synchronous settle draw.
    pub fn leave_continuous(&mut self) -> RegimeExit {
        self.regime = Regime::OnDemand;
        self.density_override = None;
        self.pending_resize = false;
        self.last_tick = None;
        self.needs_frame = true;
        debug!("Continuous regime left, density restored to {}", self.default_density);
        RegimeExit {
            density: self.default_density,
            settle_draw: true,
        }
    }

    /// One continuous-regime tick. Call once per display refresh with the
    /// current timestamp.
    pub fn on_frame(&mut self, now: Instant) -> FrameDirective {
        let mut directive = FrameDirective::default();
        if !self.alive || self.regime != Regime::Continuous {
            return directive;
        }

        let dt = match self.last_tick {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        self.last_tick = Some(now);

        // Deferred resize is applied once, at frame start, to avoid visible
        // thrashing mid-animation.
        if self.pending_resize {
            self.pending_resize = false;
            directive.apply_resize = true;
        }

        // Frame throttle: skip the expensive draw until the preset's target
        // interval has accumulated.
        self.throttle_acc += dt;
        if self.throttle_acc >= self.frame_interval {
            let interval = self.frame_interval.as_nanos().max(1);
            let rem = self.throttle_acc.as_nanos() % interval;
            self.throttle_acc = Duration::from_nanos(rem as u64);
            directive.draw = true;
        }

        // Adaptive density: every sample window, compare observed FPS against
        // the watermarks. The downward step is larger than the upward one to
        // keep the multiplier from oscillating.
        self.sample_elapsed += dt;
        self.sample_frames += 1;
        if self.sample_elapsed >= self.budget.sample_window {
            let secs = self.sample_elapsed.as_secs_f32();
            let fps = self.sample_frames as f32 / secs.max(f32::EPSILON);
            self.sample_elapsed = Duration::ZERO;
            self.sample_frames = 0;

            let current = self.density();
            let next = if fps < self.budget.low_watermark_fps {
                (current - self.budget.step_down).max(self.budget.density_floor)
            } else if fps > self.budget.high_watermark_fps {
                (current + self.budget.step_up).min(self.budget.density_ceiling)
            } else {
                current
            };
            if (next - current).abs() > 1e-3 {
                debug!("Adaptive density: {:.0} FPS, {} -> {}", fps, current, next);
                self.density_override = Some(next);
                directive.density = Some(next);
            }
        }

        directive
    }

    /// Stop all scheduling. Part of teardown; the scheduler accepts no more
    /// work afterwards.
    pub fn stop(&mut self) {
        self.alive = false;
        self.needs_frame = false;
        self.dragging = false;
        self.pending_resize = false;
        self.regime = Regime::OnDemand;
        self.density_override = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop_scheduler() -> FrameScheduler {
        FrameScheduler::new(&DeviceClass::default(), FrameBudget::default())
    }

    #[test]
    fn on_demand_draws_coalesce() {
        let mut s = desktop_scheduler();
        assert!(s.request_draw());
        assert!(!s.request_draw());
        assert!(!s.request_draw());
        assert!(s.take_draw());
        assert!(!s.take_draw());
        assert!(s.request_draw());
    }

    #[test]
    fn continuous_regime_suppresses_on_demand_requests() {
        let mut s = desktop_scheduler();
        s.enter_continuous(NATIVE_FRAME);
        assert!(!s.request_draw());
    }

    #[test]
    fn leaving_continuous_restores_density_and_settles() {
        let mut s = desktop_scheduler();
        let density = s.enter_continuous(NATIVE_FRAME);
        assert_eq!(density, 1.5);
        let exit = s.leave_continuous();
        assert_eq!(exit.density, 2.0);
        assert!(exit.settle_draw);
        assert_eq!(s.regime(), Regime::OnDemand);
        assert_eq!(s.density(), 2.0);
        // the settle draw is already pending; nothing further to schedule
        assert!(!s.request_draw());
        assert!(s.take_draw());
    }

    #[test]
    fn resize_is_deferred_during_animation_and_applied_once() {
        let mut s = desktop_scheduler();
        s.enter_continuous(NATIVE_FRAME);
        assert!(!s.note_resize());
        assert!(!s.note_resize());

        let t0 = Instant::now();
        let first = s.on_frame(t0);
        assert!(first.apply_resize);
        let second = s.on_frame(t0 + NATIVE_FRAME);
        assert!(!second.apply_resize);
    }

    #[test]
    fn resize_applies_immediately_on_demand() {
        let mut s = desktop_scheduler();
        assert!(s.note_resize());
    }

    #[test]
    fn rotate_preset_is_throttled_to_half_rate() {
        let mut s = desktop_scheduler();
        s.enter_continuous(ROTATE_FRAME);
        let t0 = Instant::now();
        let mut draws = 0;
        for i in 0..120 {
            let tick = t0 + NATIVE_FRAME * i;
            if s.on_frame(tick).draw {
                draws += 1;
            }
        }
        // 120 ticks at 16 ms against a 33 ms target: roughly every other draw
        assert!(draws >= 50 && draws <= 70, "draws = {}", draws);
    }

    #[test]
    fn sustained_low_fps_steps_density_down_once() {
        let mut s = desktop_scheduler();
        s.enter_continuous(NATIVE_FRAME);
        let t0 = Instant::now();
        let step = Duration::from_micros(22_222); // 45 FPS
        let mut changes = Vec::new();
        for i in 0..100 {
            let directive = s.on_frame(t0 + step * i);
            if let Some(d) = directive.density {
                changes.push(d);
            }
        }
        // 100 ticks * 22.2 ms = 2.2 s: exactly one sample window elapsed
        assert_eq!(changes, vec![1.4]);
        assert_eq!(s.density(), 1.4);
    }

    #[test]
    fn density_floor_is_enforced() {
        let mut s = desktop_scheduler();
        s.enter_continuous(NATIVE_FRAME);
        let t0 = Instant::now();
        let step = Duration::from_millis(50); // 20 FPS, far below the watermark
        let mut tick = t0;
        for i in 0..1000 {
            tick = t0 + step * i;
            s.on_frame(tick);
        }
        assert!(s.density() >= 0.9 - 1e-6);
        assert_eq!(s.density(), 0.9);
    }

    #[test]
    fn high_fps_steps_density_up_gently() {
        let mut s = desktop_scheduler();
        s.enter_continuous(NATIVE_FRAME);
        // drop down first
        let t0 = Instant::now();
        let slow = Duration::from_micros(22_222);
        for i in 0..100 {
            s.on_frame(t0 + slow * i);
        }
        assert_eq!(s.density(), 1.4);
        // then recover at 62 FPS; the upward step is smaller
        let t1 = t0 + slow * 100;
        let fast = Duration::from_micros(16_129);
        for i in 0..130 {
            s.on_frame(t1 + fast * i);
        }
        assert!((s.density() - 1.45).abs() < 1e-3);
    }

    #[test]
    fn drag_release_settles_with_one_draw() {
        let mut s = desktop_scheduler();
        assert!(s.begin_drag());
        assert!(s.is_dragging());
        assert!(s.take_draw());
        assert!(s.end_drag());
        assert!(!s.is_dragging());
        assert!(s.take_draw());
    }

    #[test]
    fn stop_halts_everything() {
        let mut s = desktop_scheduler();
        s.enter_continuous(NATIVE_FRAME);
        s.stop();
        assert!(!s.is_alive());
        assert!(!s.request_draw());
        assert!(!s.begin_drag());
        assert!(!s.note_resize());
        assert_eq!(s.on_frame(Instant::now()), FrameDirective::default());
    }
}
