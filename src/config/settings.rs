//! Viewer configuration
//!
//! Two concerns live here: the best-effort persisted preference (last selected
//! animation mode) and the device-class heuristics that scale the render
//! resolution caps down on constrained devices.

use std::fs;
use std::path::PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CONFIG_FILE: &str = "viewer.toml";

/// Persisted viewer preferences. Absence or corruption means "no preference".
/// The storage path is bound at load time; settings without one (`in_memory`)
/// keep working but `save` becomes a no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerSettings {
    /// Last animation mode the user selected, as its canonical string form.
    pub animation_mode: Option<String>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "skinview-rust").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

impl ViewerSettings {
    /// Load persisted settings from the platform config dir; any failure
    /// yields the defaults.
    pub fn load() -> Self {
        Self::load_from(config_path())
    }

    /// Load from an explicit file, which also becomes the save target.
    pub fn stored_at(path: PathBuf) -> Self {
        Self::load_from(Some(path))
    }

    /// Settings that never touch the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    fn load_from(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        let mut settings = match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    debug!("Ignoring corrupt settings file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        settings.path = Some(path);
        settings
    }

    /// Best-effort save; a failure is logged and otherwise ignored.
    pub fn save(&self) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        let result = (|| -> anyhow::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, toml::to_string_pretty(self)?)?;
            Ok(())
        })();
        if let Err(e) = result {
            warn!("Could not persist viewer settings to {:?}: {}", path, e);
        }
    }
}

/// Device capability class driving the resolution caps and the ambient
/// rotation default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceClass {
    /// Coarse (touch) primary pointer.
    pub coarse_pointer: bool,
    /// Reduced-data / low-power preference.
    pub reduced_power: bool,
}

impl DeviceClass {
    /// Probe the environment. Desktop builds default to a fine pointer; both
    /// axes can be forced through environment overrides.
    pub fn detect() -> Self {
        let flag = |name: &str| {
            std::env::var(name)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };
        Self {
            coarse_pointer: flag("SKINVIEW_COARSE_POINTER"),
            reduced_power: flag("SKINVIEW_REDUCED_POWER"),
        }
    }

    /// Density cap for on-demand rendering.
    pub fn density_cap(&self) -> f32 {
        if self.coarse_pointer {
            1.0
        } else {
            2.0
        }
    }

    /// Density override while a continuous animation runs, trading resolution
    /// for smoother frames.
    pub fn animating_density(&self) -> f32 {
        if self.coarse_pointer {
            1.0
        } else {
            1.5
        }
    }

    /// Per-axis pixel budget for the drawing surface.
    pub fn max_surface_dim(&self) -> u32 {
        if self.coarse_pointer {
            1400
        } else {
            4096
        }
    }

    /// Whether the ambient rotate preset is enabled by default.
    pub fn ambient_rotation(&self) -> bool {
        !self.coarse_pointer && !self.reduced_power
    }
}
