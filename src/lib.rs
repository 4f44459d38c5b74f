// skinview-rust: interactive player-skin viewer
// Lifecycle, scheduling and texture-fallback core for the avatar modal

pub mod utils;
pub mod identity;
pub mod networking;
pub mod config;
pub mod ui;
pub mod rendering;
pub mod viewer;
pub mod app;

// Re-export the types callers touch when embedding the viewer
pub use identity::{PageContext, PlayerIdentity};
pub use viewer::{ModalPhase, ViewerModal};
pub use viewer::animation::AnimationMode;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
