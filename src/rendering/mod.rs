pub mod camera;
pub mod renderer;
pub mod scheduler;
pub mod surface;

pub use camera::{ControlEvent, OrbitCamera, OrbitControls};
pub use renderer::{AvatarRenderer, BackSlot};
pub use scheduler::{FrameBudget, FrameDirective, FrameScheduler, Regime};
pub use surface::{RenderSurface, SurfaceError, SurfaceSpec};
