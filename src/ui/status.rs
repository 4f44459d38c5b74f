//! Footer status line of the viewer modal
//!
//! Every user-visible failure message goes through here. An empty message
//! hides the line.

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug)]
pub struct StatusLine {
    message: String,
    level: StatusLevel,
}

impl StatusLine {
    pub fn new() -> Self {
        Self {
            message: String::new(),
            level: StatusLevel::Info,
        }
    }

    pub fn set(&mut self, level: StatusLevel, message: impl Into<String>) {
        self.message = message.into().trim().to_string();
        self.level = level;
        if self.message.is_empty() {
            return;
        }
        match level {
            StatusLevel::Info => info!("status: {}", self.message),
            StatusLevel::Warning | StatusLevel::Error => warn!("status: {}", self.message),
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.set(StatusLevel::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.set(StatusLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.set(StatusLevel::Error, message);
    }

    pub fn clear(&mut self) {
        self.message.clear();
        self.level = StatusLevel::Info;
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn level(&self) -> StatusLevel {
        self.level
    }

    pub fn is_visible(&self) -> bool {
        !self.message.is_empty()
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new()
    }
}
