//! Player identity resolution
//!
//! Derives the canonical (uuid, display name) pair for one open cycle of the
//! viewer from the read-only hints the surrounding page provides. Resolution
//! never fails; both fields may come out empty, in which case the viewer shows
//! the generic placeholder avatar.

/// Read-only hints harvested from the page context before the modal opens.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// `uuid` query parameter, if present.
    pub query_uuid: Option<String>,
    /// `name` query parameter, if present.
    pub query_name: Option<String>,
    /// Text content of the uuid badge element next to the player card.
    pub badge_text: Option<String>,
    /// Text content of the player-name element.
    pub dom_name: Option<String>,
    /// Alt text of the player portrait image.
    pub image_alt: Option<String>,
}

/// Canonical identity for one open cycle. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    /// 32 lowercase hex chars, or empty when unknown.
    pub uuid: String,
    /// Display name, or empty when unknown.
    pub name: String,
}

/// Normalize an identifier: strip everything that is not a hex digit,
/// lowercase, and require exactly 32 chars. Anything else maps to empty.
pub fn normalize_uuid(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .flat_map(|c| c.to_lowercase())
        .collect();
    if cleaned.len() == 32 {
        cleaned
    } else {
        String::new()
    }
}

/// A DOM-derived name that is still a "loading…" placeholder must not win over
/// the image alt text.
fn is_loading_placeholder(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.starts_with("loading") || lower.starts_with("lädt")
}

impl PlayerIdentity {
    /// Resolve the identity from page hints. An explicit `name` query
    /// parameter wins outright; otherwise the uuid badge and the non-placeholder
    /// DOM name (falling back to the portrait alt text) are used.
    pub fn resolve(ctx: &PageContext) -> Self {
        let query_uuid = normalize_uuid(ctx.query_uuid.as_deref().unwrap_or(""));
        let query_name = ctx.query_name.as_deref().unwrap_or("").trim().to_string();
        if !query_name.is_empty() {
            return Self {
                uuid: query_uuid,
                name: query_name,
            };
        }

        let badge_uuid = normalize_uuid(ctx.badge_text.as_deref().unwrap_or(""));
        let uuid = if query_uuid.is_empty() {
            badge_uuid
        } else {
            query_uuid
        };

        let dom_name = ctx.dom_name.as_deref().unwrap_or("").trim().to_string();
        let image_alt = ctx.image_alt.as_deref().unwrap_or("").trim().to_string();
        let name = if !dom_name.is_empty() && !is_loading_placeholder(&dom_name) {
            dom_name
        } else {
            image_alt
        };

        Self { uuid, name }
    }

    pub fn is_empty(&self) -> bool {
        self.uuid.is_empty() && self.name.is_empty()
    }

    /// Viewer headline: named player, abbreviated uuid, or a generic label.
    pub fn title(&self) -> String {
        if !self.name.is_empty() {
            format!("Skin of {}", self.name)
        } else if !self.uuid.is_empty() {
            format!("Skin {}…", &self.uuid[..8])
        } else {
            "Player skin".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_accepts_dashed_uuid() {
        let raw = "A1B2C3D4-E5F6-A1B2-C3D4-E5F6A1B2C3D4";
        assert_eq!(normalize_uuid(raw), "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4");
    }

    #[test]
    fn normalize_rejects_wrong_length() {
        assert_eq!(normalize_uuid("abc123"), "");
        assert_eq!(normalize_uuid(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "A1B2C3D4-E5F6-A1B2-C3D4-E5F6A1B2C3D4",
            "not-a-uuid",
            "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4",
            "",
        ] {
            let once = normalize_uuid(raw);
            assert_eq!(normalize_uuid(&once), once);
        }
    }

    #[test]
    fn query_name_wins_outright() {
        let ctx = PageContext {
            query_uuid: Some("a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4".into()),
            query_name: Some("  Herobrine  ".into()),
            dom_name: Some("Somebody else".into()),
            ..Default::default()
        };
        let id = PlayerIdentity::resolve(&ctx);
        assert_eq!(id.name, "Herobrine");
        assert_eq!(id.uuid, "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4");
    }

    #[test]
    fn loading_placeholder_falls_back_to_alt_text() {
        let ctx = PageContext {
            badge_text: Some("a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4".into()),
            dom_name: Some("Loading player…".into()),
            image_alt: Some("Notch".into()),
            ..Default::default()
        };
        let id = PlayerIdentity::resolve(&ctx);
        assert_eq!(id.name, "Notch");
        assert_eq!(id.uuid, "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4");
    }

    #[test]
    fn empty_context_resolves_to_empty_identity() {
        let id = PlayerIdentity::resolve(&PageContext::default());
        assert!(id.is_empty());
        assert_eq!(id.title(), "Player skin");
    }

    #[test]
    fn title_prefers_name_then_short_uuid() {
        let named = PlayerIdentity {
            uuid: String::new(),
            name: "Alex".into(),
        };
        assert_eq!(named.title(), "Skin of Alex");
        let anon = PlayerIdentity {
            uuid: "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4".into(),
            name: String::new(),
        };
        assert_eq!(anon.title(), "Skin a1b2c3d4…");
    }
}
