//! Memoized profile metadata lookup
//!
//! Resolves an identifier to its skin model flavor and cape URL through the
//! local reverse-proxy endpoint. At most one request is ever in flight per
//! identifier; concurrent callers share the pending result, and the resolved
//! value (including a null-metadata failure) is memoized for the process
//! lifetime.

use super::{skin::upgrade_to_https, FetchError, FetchResult};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::timeout;
use tracing::debug;
use url::Url;

/// Default bound on one profile lookup so a hung request cannot block the UI.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(8);

/// Wire shape of the reverse-proxy profile endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub properties: Vec<ProfileProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinModelHint {
    Slim,
    Default,
    Unknown,
}

/// Decoded profile metadata. `cape_url` is `None` when the player owns no cape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInfo {
    pub model: SkinModelHint,
    pub cape_url: Option<String>,
}

#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_profile(&self, uuid: &str) -> FetchResult<ProfileResponse>;
}

pub struct HttpProfileFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProfileFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("skinview-rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProfileFetcher for HttpProfileFetcher {
    async fn fetch_profile(&self, uuid: &str) -> FetchResult<ProfileResponse> {
        let mut url = Url::parse(&self.base_url).map_err(|e| FetchError::Http {
            reason: e.to_string(),
        })?;
        url.set_path("api/profile");
        url.query_pairs_mut().append_pair("uuid", uuid);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(|e| FetchError::Http {
            reason: e.to_string(),
        })
    }
}

/// Decode the base64 `textures` property into model flavor and cape URL.
fn decode_textures(response: &ProfileResponse) -> Option<ProfileInfo> {
    let property = response.properties.iter().find(|p| p.name == "textures")?;
    let raw = base64::engine::general_purpose::STANDARD
        .decode(&property.value)
        .ok()?;
    let decoded: serde_json::Value = serde_json::from_slice(&raw).ok()?;
    let textures = decoded.get("textures")?;

    let model = match textures
        .pointer("/SKIN/metadata/model")
        .and_then(|m| m.as_str())
    {
        Some("slim") => SkinModelHint::Slim,
        Some("default") | Some("wide") => SkinModelHint::Default,
        _ => SkinModelHint::Unknown,
    };
    let cape_url = textures
        .pointer("/CAPE/url")
        .and_then(|u| u.as_str())
        .map(upgrade_to_https);

    Some(ProfileInfo { model, cape_url })
}

type ProfileSlot = Arc<OnceCell<Option<ProfileInfo>>>;

/// Process-wide profile cache. Entries are never invalidated within a run;
/// staleness is acceptable.
pub struct ProfileCache {
    fetcher: Arc<dyn ProfileFetcher>,
    entries: Mutex<HashMap<String, ProfileSlot>>,
    lookup_timeout: Duration,
}

impl ProfileCache {
    pub fn new(fetcher: Arc<dyn ProfileFetcher>) -> Self {
        Self {
            fetcher,
            entries: Mutex::new(HashMap::new()),
            lookup_timeout: LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    /// Look up profile metadata. Network errors, bad responses and timeouts
    /// all resolve to `None` ("use defaults"), never an error.
    pub async fn get_profile(&self, uuid: &str) -> Option<ProfileInfo> {
        if uuid.is_empty() {
            return None;
        }
        let slot = {
            let mut entries = self.entries.lock().await;
            entries.entry(uuid.to_string()).or_default().clone()
        };
        slot.get_or_init(|| async {
            match timeout(self.lookup_timeout, self.fetcher.fetch_profile(uuid)).await {
                Ok(Ok(response)) => decode_textures(&response),
                Ok(Err(e)) => {
                    debug!("Profile lookup for {} failed: {}", uuid, e);
                    None
                }
                Err(_) => {
                    debug!("Profile lookup for {} timed out", uuid);
                    None
                }
            }
        })
        .await
        .clone()
    }
}
