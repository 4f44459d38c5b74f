pub mod settings;

pub use settings::{DeviceClass, ViewerSettings};
