//! Animation presets and back-equipment state
//!
//! The mode enum is the persisted preference; `AnimationState` layers the
//! back-equipment rules on top, most notably the fly preset forcing wings on
//! and restoring whatever was equipped before when the preset ends.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::DeviceClass;
use crate::rendering::scheduler::{NATIVE_FRAME, ROTATE_FRAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationMode {
    None,
    Rotate,
    Walk,
    Idle,
    Fly,
}

impl AnimationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationMode::None => "none",
            AnimationMode::Rotate => "rotate",
            AnimationMode::Walk => "walk",
            AnimationMode::Idle => "idle",
            AnimationMode::Fly => "fly",
        }
    }

    /// Parse the canonical string form; anything unknown is no preference.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(AnimationMode::None),
            "rotate" => Some(AnimationMode::Rotate),
            "walk" => Some(AnimationMode::Walk),
            "idle" => Some(AnimationMode::Idle),
            "fly" => Some(AnimationMode::Fly),
            _ => None,
        }
    }

    /// Whether this mode drives the continuous render regime.
    pub fn is_animated(&self) -> bool {
        !matches!(self, AnimationMode::None)
    }

    /// Target draw interval in the continuous regime. The ambient rotate
    /// preset is visually slow and tolerates half the frame rate.
    pub fn frame_interval(&self) -> Duration {
        match self {
            AnimationMode::Rotate => ROTATE_FRAME,
            _ => NATIVE_FRAME,
        }
    }

    /// Starting mode when no preference was persisted.
    pub fn default_for(device: &DeviceClass) -> Self {
        if device.ambient_rotation() {
            AnimationMode::Rotate
        } else {
            AnimationMode::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackEquipment {
    Cape,
    Wings,
}

/// What a mode switch means for the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub continuous: bool,
    pub damping: bool,
    pub frame_interval: Duration,
}

/// Current preset plus the back-equipment slot it may have commandeered.
#[derive(Debug, Clone)]
pub struct AnimationState {
    mode: AnimationMode,
    back: Option<BackEquipment>,
    /// Slot as it was before the fly preset forced wings; restored on exit.
    prev_back: Option<Option<BackEquipment>>,
    has_cape: bool,
}

impl AnimationState {
    pub fn new(mode: AnimationMode) -> Self {
        let mut state = Self {
            mode: AnimationMode::None,
            back: None,
            prev_back: None,
            has_cape: false,
        };
        state.set_mode(mode);
        state
    }

    pub fn mode(&self) -> AnimationMode {
        self.mode
    }

    pub fn back(&self) -> Option<BackEquipment> {
        self.back
    }

    /// A cape texture became available; equip it unless the fly preset
    /// currently owns the slot.
    pub fn cape_loaded(&mut self) {
        self.has_cape = true;
        if self.mode != AnimationMode::Fly && self.back.is_none() {
            self.back = Some(BackEquipment::Cape);
        }
        if let Some(saved) = self.prev_back.as_mut() {
            if saved.is_none() {
                *saved = Some(BackEquipment::Cape);
            }
        }
    }

    pub fn has_cape(&self) -> bool {
        self.has_cape
    }

    /// Whether the back overlay should be drawn at all.
    pub fn back_visible(&self) -> bool {
        self.back.is_some()
    }

    /// Manual cape toggle, only meaningful when a cape exists and the fly
    /// preset is not forcing wings.
    pub fn toggle_back(&mut self) {
        if self.mode == AnimationMode::Fly || !self.has_cape {
            return;
        }
        self.back = match self.back {
            Some(_) => None,
            None => Some(BackEquipment::Cape),
        };
    }

    /// Switch presets. Entering fly saves the current back slot once and
    /// forces wings; leaving fly restores the saved slot. Re-selecting fly
    /// while already flying must not overwrite the saved slot.
    pub fn set_mode(&mut self, mode: AnimationMode) -> ModeChange {
        if mode == AnimationMode::Fly && self.mode != AnimationMode::Fly {
            self.prev_back = Some(self.back);
            self.back = Some(BackEquipment::Wings);
        } else if mode != AnimationMode::Fly && self.mode == AnimationMode::Fly {
            self.back = self.prev_back.take().unwrap_or(None);
        }
        self.mode = mode;
        ModeChange {
            continuous: mode.is_animated(),
            damping: mode.is_animated(),
            frame_interval: mode.frame_interval(),
        }
    }
}
