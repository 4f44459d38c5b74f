//! Remote texture and profile acquisition
//!
//! Thin fetch layer for the viewer: an ordered skin-provider fallback chain
//! that always ends in a bundled asset, and a memoized profile lookup that
//! yields the skin model flavor and cape URL.

pub mod profile;
pub mod skin;

pub use profile::{ProfileCache, ProfileInfo, SkinModelHint};
pub use skin::{resolve_skin, skin_candidates, SkinResolution, SkinSource, TextureFetcher};

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request failed: {reason}")]
    Http { reason: String },

    #[error("provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("request timed out")]
    Timeout,
}

pub type FetchResult<T> = Result<T, FetchError>;
