//! End-to-end lifecycle scenarios against the public viewer API, without a
//! window or GPU device.

use async_trait::async_trait;
use bytes::Bytes;

use skinview_rust::config::{DeviceClass, ViewerSettings};
use skinview_rust::identity::PageContext;
use skinview_rust::networking::skin::{
    resolve_skin, skin_candidates, SkinResolution, SkinSource, TextureFetcher, BUNDLED_SKIN,
};
use skinview_rust::networking::{FetchError, FetchResult};
use skinview_rust::ui::StatusLevel;
use skinview_rust::viewer::animation::{AnimationMode, BackEquipment};
use skinview_rust::viewer::{ModalPhase, ViewerModal};
use skinview_rust::PlayerIdentity;

struct FailingFetcher;

#[async_trait]
impl TextureFetcher for FailingFetcher {
    async fn fetch(&self, _url: &str) -> FetchResult<Bytes> {
        Err(FetchError::Status { status: 404 })
    }
}

fn fresh_modal() -> ViewerModal {
    // in-memory settings keep the suite away from the real config file
    ViewerModal::with_settings(DeviceClass::default(), ViewerSettings::in_memory())
}

fn player_context() -> PageContext {
    PageContext {
        query_uuid: Some("a1b2c3d4-e5f6-a1b2-c3d4-e5f6a1b2c3d4".to_string()),
        query_name: Some("Alrisha".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn unknown_player_ends_with_default_skin_and_warning() {
    let mut modal = fresh_modal();
    let epoch = modal.open(&player_context()).unwrap();

    let identity = PlayerIdentity::resolve(&player_context());
    let candidates = skin_candidates(&identity);
    let had_remote = candidates
        .iter()
        .any(|c| matches!(c, SkinSource::Remote(_)));
    let resolution = resolve_skin(&FailingFetcher, candidates).await;

    modal.apply_skin(epoch, resolution, had_remote);
    assert!(modal.status.is_visible());
    assert_eq!(modal.status.level(), StatusLevel::Warning);
}

#[tokio::test]
async fn anonymous_context_shows_placeholder_silently() {
    let mut modal = fresh_modal();
    let epoch = modal.open(&PageContext::default()).unwrap();

    let identity = PlayerIdentity::resolve(&PageContext::default());
    assert!(identity.is_empty());
    let candidates = skin_candidates(&identity);
    assert_eq!(candidates, vec![SkinSource::Bundled]);

    let resolution = resolve_skin(&FailingFetcher, candidates).await;
    match &resolution {
        SkinResolution::Loaded { source, data } => {
            assert_eq!(*source, SkinSource::Bundled);
            assert_eq!(&data[..], BUNDLED_SKIN);
        }
        SkinResolution::Exhausted => panic!("bundled tail must always load"),
    }

    modal.apply_skin(epoch, resolution, false);
    assert!(!modal.status.is_visible());
    assert_eq!(modal.title(), "Player skin");
}

#[test]
fn results_from_a_previous_cycle_never_leak_into_the_next() {
    let mut modal = fresh_modal();
    let first = modal.open(&player_context()).unwrap();
    modal.close();
    let second = modal.open(&PageContext::default()).unwrap();
    assert!(second > first);

    modal.apply_skin(
        first,
        SkinResolution::Loaded {
            source: SkinSource::Bundled,
            data: Bytes::from_static(BUNDLED_SKIN),
        },
        true,
    );
    // the stale warning must not appear in the fresh cycle
    assert!(!modal.status.is_visible());

    modal.apply_cape(first, BUNDLED_SKIN);
    assert!(!modal.session().unwrap().animation.has_cape());
}

#[test]
fn close_tears_down_in_any_phase_and_is_reentrant() {
    let mut modal = fresh_modal();
    assert!(modal.close().is_none());

    modal.open(&player_context()).unwrap();
    assert!(matches!(modal.phase(), ModalPhase::Opening));
    modal.close();
    assert!(matches!(modal.phase(), ModalPhase::Closed));
    assert!(modal.session().is_none());
    modal.close();
    assert!(matches!(modal.phase(), ModalPhase::Closed));

    // the modal is reusable after teardown
    assert!(modal.open(&player_context()).is_ok());
}

#[test]
fn second_open_is_rejected_until_closed() {
    let mut modal = fresh_modal();
    modal.open(&player_context()).unwrap();
    assert!(modal.open(&player_context()).is_err());
    modal.close();
    assert!(modal.open(&player_context()).is_ok());
}

#[test]
fn fly_preset_survives_a_cape_arriving_mid_flight() {
    let mut modal = fresh_modal();
    let epoch = modal.open(&player_context()).unwrap();

    modal.select_mode(AnimationMode::Fly);
    assert_eq!(
        modal.session().unwrap().animation.back(),
        Some(BackEquipment::Wings)
    );

    // the cape downloads while flying; wings keep the slot until the preset ends
    modal.apply_cape(epoch, BUNDLED_SKIN);
    assert_eq!(
        modal.session().unwrap().animation.back(),
        Some(BackEquipment::Wings)
    );

    modal.select_mode(AnimationMode::None);
    assert_eq!(
        modal.session().unwrap().animation.back(),
        Some(BackEquipment::Cape)
    );
}

#[test]
fn context_loss_is_terminal_for_the_cycle_but_not_the_modal() {
    let mut modal = fresh_modal();
    modal.open(&player_context()).unwrap();
    modal.on_context_lost();
    assert_eq!(modal.status.level(), StatusLevel::Error);
    assert!(!modal.session().unwrap().scheduler.is_alive());

    modal.close();
    let epoch = modal.open(&player_context()).unwrap();
    assert!(modal.is_live(epoch));
    assert!(modal.session().unwrap().scheduler.is_alive());
    assert!(!modal.status.is_visible());
}

#[test]
fn hidden_page_suspends_and_resumes() {
    let mut modal = fresh_modal();
    modal.open(&player_context()).unwrap();
    modal.on_visibility(false);
    assert!(modal.is_suspended());
    modal.on_visibility(true);
    assert!(!modal.is_suspended());
}
