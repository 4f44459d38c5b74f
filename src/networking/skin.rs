//! Skin texture source chain
//!
//! Produces the ordered candidate list (primary provider, secondary provider,
//! bundled placeholder) and walks it with a uniform attempt-advance loop. The
//! bundled tail guarantees the chain never dead-ends: the viewer is never left
//! without a loadable skin.

use super::{FetchError, FetchResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, warn};

use crate::identity::PlayerIdentity;

pub const PRIMARY_SKIN_PROVIDER: &str = "https://minotar.net/skin";
pub const SECONDARY_SKIN_PROVIDER: &str = "https://mc-heads.net/skin";

/// Compiled-in placeholder skin, the guaranteed final candidate.
pub static BUNDLED_SKIN: &[u8] = include_bytes!("../../assets/textures/placeholder_skin.png");
/// Compiled-in wing overlay used by the fly preset when no cape exists.
pub static BUNDLED_WINGS: &[u8] = include_bytes!("../../assets/textures/wings.png");

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One candidate skin source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkinSource {
    Remote(String),
    Bundled,
}

/// Outcome of walking a candidate list. `Exhausted` is only reachable for a
/// list without the bundled tail; `skin_candidates` always appends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkinResolution {
    Loaded { source: SkinSource, data: Bytes },
    Exhausted,
}

/// Ordered candidates for the given identity. Without a uuid only the bundled
/// placeholder remains.
pub fn skin_candidates(identity: &PlayerIdentity) -> Vec<SkinSource> {
    let mut out = Vec::with_capacity(3);
    if !identity.uuid.is_empty() {
        out.push(SkinSource::Remote(format!(
            "{}/{}",
            PRIMARY_SKIN_PROVIDER, identity.uuid
        )));
        out.push(SkinSource::Remote(format!(
            "{}/{}",
            SECONDARY_SKIN_PROVIDER, identity.uuid
        )));
    }
    out.push(SkinSource::Bundled);
    out
}

/// Fetches raw texture bytes. The HTTP implementation lives below; tests
/// substitute fakes.
#[async_trait]
pub trait TextureFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult<Bytes>;
}

pub struct HttpTextureFetcher {
    client: reqwest::Client,
}

impl HttpTextureFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("skinview-rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpTextureFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextureFetcher for HttpTextureFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<Bytes> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http {
                    reason: e.to_string(),
                }
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        response.bytes().await.map_err(|e| FetchError::Http {
            reason: e.to_string(),
        })
    }
}

/// Walk the candidates in order until one loads. Each failed attempt is
/// swallowed and the next candidate is tried.
pub async fn resolve_skin(
    fetcher: &dyn TextureFetcher,
    candidates: Vec<SkinSource>,
) -> SkinResolution {
    for source in candidates {
        match &source {
            SkinSource::Remote(url) => match fetcher.fetch(url).await {
                Ok(data) => {
                    debug!("Loaded skin from {} ({} bytes)", url, data.len());
                    return SkinResolution::Loaded { source, data };
                }
                Err(e) => {
                    debug!("Skin candidate {} failed: {}", url, e);
                }
            },
            SkinSource::Bundled => {
                return SkinResolution::Loaded {
                    source,
                    data: Bytes::from_static(BUNDLED_SKIN),
                };
            }
        }
    }
    SkinResolution::Exhausted
}

/// Upgrade plain-http texture URLs; the cape provider still hands them out.
pub fn upgrade_to_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

/// Fetch the cape texture from its single source. Absence is not an error and
/// a failed download degrades to "no cape".
pub async fn fetch_cape(fetcher: &dyn TextureFetcher, cape_url: Option<&str>) -> Option<Bytes> {
    let url = upgrade_to_https(cape_url?);
    match fetcher.fetch(&url).await {
        Ok(data) => Some(data),
        Err(e) => {
            warn!("Cape could not be loaded ({}): {}", url, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedFetcher {
        // url substring -> payload; everything else fails
        succeed_on: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextureFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> FetchResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.succeed_on {
                Some(needle) if url.contains(needle) => Ok(Bytes::from_static(b"texture")),
                _ => Err(FetchError::Timeout),
            }
        }
    }

    fn identity(uuid: &str) -> PlayerIdentity {
        PlayerIdentity {
            uuid: uuid.to_string(),
            name: String::new(),
        }
    }

    #[test]
    fn candidates_always_end_bundled() {
        let with_uuid = skin_candidates(&identity("a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4"));
        assert_eq!(with_uuid.len(), 3);
        assert_eq!(with_uuid.last(), Some(&SkinSource::Bundled));

        let anonymous = skin_candidates(&identity(""));
        assert_eq!(anonymous, vec![SkinSource::Bundled]);
    }

    #[tokio::test]
    async fn total_remote_failure_still_ends_loaded() {
        let fetcher = ScriptedFetcher {
            succeed_on: None,
            calls: AtomicUsize::new(0),
        };
        let uuid = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4";
        let result = resolve_skin(&fetcher, skin_candidates(&identity(uuid))).await;
        match result {
            SkinResolution::Loaded { source, data } => {
                assert_eq!(source, SkinSource::Bundled);
                assert_eq!(&data[..], BUNDLED_SKIN);
            }
            SkinResolution::Exhausted => panic!("chain must never dead-end"),
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn secondary_provider_wins_when_primary_times_out() {
        let fetcher = ScriptedFetcher {
            succeed_on: Some("mc-heads.net"),
            calls: AtomicUsize::new(0),
        };
        let uuid = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4";
        let result = resolve_skin(&fetcher, skin_candidates(&identity(uuid))).await;
        match result {
            SkinResolution::Loaded { source, .. } => match source {
                SkinSource::Remote(url) => assert!(url.contains("mc-heads.net")),
                SkinSource::Bundled => panic!("secondary provider should have answered"),
            },
            SkinResolution::Exhausted => panic!("chain must never dead-end"),
        }
    }

    #[tokio::test]
    async fn remote_only_list_can_exhaust() {
        let fetcher = ScriptedFetcher {
            succeed_on: None,
            calls: AtomicUsize::new(0),
        };
        let remote_only = vec![SkinSource::Remote("https://minotar.net/skin/x".into())];
        assert_eq!(
            resolve_skin(&fetcher, remote_only).await,
            SkinResolution::Exhausted
        );
    }

    #[tokio::test]
    async fn cape_absence_is_not_an_error() {
        let fetcher = ScriptedFetcher {
            succeed_on: None,
            calls: AtomicUsize::new(0),
        };
        assert!(fetch_cape(&fetcher, None).await.is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        // a failing download degrades to "no cape" as well
        assert!(fetch_cape(&fetcher, Some("http://example.com/cape.png"))
            .await
            .is_none());
    }

    #[test]
    fn http_cape_urls_are_upgraded() {
        assert_eq!(
            upgrade_to_https("http://textures.example/cape"),
            "https://textures.example/cape"
        );
        assert_eq!(
            upgrade_to_https("https://textures.example/cape"),
            "https://textures.example/cape"
        );
    }
}
