pub mod status;

pub use status::{StatusLevel, StatusLine};
