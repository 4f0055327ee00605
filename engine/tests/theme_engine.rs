//! End-to-end engine scenarios driven through mock collaborators: cold
//! start, the activation protocol, per-mode bookkeeping, debounced mode
//! reconciliation, and sync convergence.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use claims::{assert_err, assert_ok, assert_some, assert_some_eq};
use uuid::Uuid;

use engine::chrome::{IconError, Platform, PlatformChrome, StatusBarStyle};
use engine::config::EngineConfig;
use engine::error::ThemeError;
use engine::fetch::{FetchError, FetchOutcome, ThemeFetcher};
use engine::mode::{Mode, ModeEmitter};
use engine::storage::{
    InMemoryPreferenceStore, PreferenceStore, SAVED_SYSTEM_THEME_ID_KEY, SAVED_THEME_KEY,
};
use engine::sync::{DeliverySource, SyncFeed, SyncObserver, SyncSubscription, ThemeDelivery};
use engine::theme::template::{
    self, VAR_CONTRAST_BACKGROUND_COLOR, VAR_INFO_COLOR,
};
use engine::theme::{ThemeEngine, ThemeRecordPayload, ThemeVariables};

const DEBOUNCE_MS: u64 = 50;

#[derive(Default)]
struct MockSyncFeed {
    observers: Mutex<Vec<(u64, SyncObserver)>>,
    next_id: AtomicU64,
    sync_requests: AtomicU32,
}

impl MockSyncFeed {
    fn deliver(&self, delivery: ThemeDelivery) {
        let observers: Vec<SyncObserver> = {
            let guard = self
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard.iter().map(|(_, observer)| observer.clone()).collect()
        };
        for observer in observers {
            observer(delivery.clone());
        }
    }

    fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn sync_requests(&self) -> u32 {
        self.sync_requests.load(Ordering::SeqCst)
    }
}

impl SyncFeed for MockSyncFeed {
    fn register_theme_observer(&self, observer: SyncObserver) -> SyncSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        SyncSubscription(id)
    }

    fn unregister_theme_observer(&self, subscription: SyncSubscription) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != subscription.0);
    }

    fn request_sync(&self) {
        self.sync_requests.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockFetcher {
    outcome: Mutex<Result<FetchOutcome, FetchError>>,
    calls: AtomicU32,
}

impl MockFetcher {
    fn new(outcome: Result<FetchOutcome, FetchError>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            calls: AtomicU32::new(0),
        }
    }

    fn set_outcome(&self, outcome: Result<FetchOutcome, FetchError>) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThemeFetcher for MockFetcher {
    async fn fetch_theme(
        &self,
        _theme: &engine::theme::ThemeRecord,
    ) -> Result<FetchOutcome, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Default)]
struct RecordingChrome {
    styles: Mutex<Vec<StatusBarStyle>>,
    backgrounds: Mutex<Vec<String>>,
    icons: Mutex<Vec<Option<String>>>,
}

impl RecordingChrome {
    fn style_changes(&self) -> Vec<StatusBarStyle> {
        self.styles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn icon_changes(&self) -> Vec<Option<String>> {
        self.icons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PlatformChrome for RecordingChrome {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn set_status_bar_style(&self, style: StatusBarStyle) {
        self.styles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(style);
    }

    fn set_status_bar_background(&self, color: &str) {
        self.backgrounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(color.to_string());
    }

    fn set_app_icon(&self, name: Option<&str>) -> Result<(), IconError> {
        self.icons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.map(str::to_string));
        Ok(())
    }
}

struct Harness {
    engine: ThemeEngine,
    store: Arc<InMemoryPreferenceStore>,
    sync: Arc<MockSyncFeed>,
    fetcher: Arc<MockFetcher>,
    mode: Arc<ModeEmitter>,
    chrome: Arc<RecordingChrome>,
}

fn harness(initial_mode: Mode) -> Harness {
    let store = Arc::new(InMemoryPreferenceStore::new());
    let sync = Arc::new(MockSyncFeed::default());
    let fetcher = Arc::new(MockFetcher::new(Ok(FetchOutcome::Unavailable)));
    let mode = Arc::new(ModeEmitter::new(initial_mode));
    let chrome = Arc::new(RecordingChrome::default());
    let engine = ThemeEngine::new(
        store.clone(),
        sync.clone(),
        fetcher.clone(),
        mode.clone(),
        chrome.clone(),
        EngineConfig::default().with_mode_debounce_ms(DEBOUNCE_MS),
    );
    Harness {
        engine,
        store,
        sync,
        fetcher,
        mode,
        chrome,
    }
}

/// Let spawned event-handler tasks run without advancing the paused clock.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Advance past the debounce window so a pending reconciliation fires.
async fn fire_reconcile() {
    settle().await;
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS + 10)).await;
    settle().await;
}

fn complete_vars(contrast: &str) -> ThemeVariables {
    let mut vars = template::template_variables();
    vars.set(VAR_CONTRAST_BACKGROUND_COLOR, contrast);
    vars
}

fn payload(id: &str, name: &str, variables: ThemeVariables) -> ThemeRecordPayload {
    ThemeRecordPayload {
        id: id.to_string(),
        name: name.to_string(),
        variables,
        is_system: false,
        is_initial: false,
        preferred_light: false,
        preferred_dark: false,
    }
}

fn delivery(valid: Vec<ThemeRecordPayload>, deleted: Vec<String>) -> ThemeDelivery {
    ThemeDelivery {
        all: valid.clone(),
        valid,
        deleted,
        source: DeliverySource::RemoteSync,
    }
}

async fn assert_single_active(engine: &ThemeEngine) {
    let themes = engine.themes().await;
    let mut count = themes.iter().filter(|t| t.is_active_on_device()).count();
    if let Some(active) = engine.active_theme().await {
        if !themes.iter().any(|t| t.id == active.id) {
            count += usize::from(active.is_active_on_device());
        }
    }
    assert!(count <= 1, "expected at most one device-active theme, found {count}");
}

#[tokio::test(start_paused = true)]
async fn cold_start_with_empty_store_activates_initial_system_theme() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, template::INITIAL_SYSTEM_THEME);
    assert!(active.is_initial);
    assert!(active.is_active_on_device());
    assert_single_active(&h.engine).await;

    // Slate's contrast background is light, so the bar gets dark glyphs and
    // the initial system theme resets the icon
    assert_eq!(h.chrome.style_changes(), [StatusBarStyle::DarkContent]);
    assert_eq!(h.chrome.icon_changes(), [None]);
    assert!(!h.engine.styles().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cold_start_resumes_saved_system_theme() {
    let h = harness(Mode::Light);
    assert_ok!(
        h.store
            .set_item(SAVED_SYSTEM_THEME_ID_KEY, template::EMBER_SYSTEM_THEME)
            .await
    );

    h.engine.resolve_initial_theme().await;

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, template::EMBER_SYSTEM_THEME);
    assert_eq!(
        h.chrome.icon_changes(),
        [Some(template::EMBER_SYSTEM_THEME.to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn cold_start_with_unknown_system_id_falls_back_to_initial() {
    let h = harness(Mode::Light);
    assert_ok!(h.store.set_item(SAVED_SYSTEM_THEME_ID_KEY, "Retired").await);

    h.engine.resolve_initial_theme().await;

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, template::INITIAL_SYSTEM_THEME);
}

#[tokio::test(start_paused = true)]
async fn corrupt_saved_theme_blob_falls_back_to_initial() {
    let h = harness(Mode::Light);
    assert_ok!(h.store.set_item(SAVED_THEME_KEY, "{definitely not json").await);

    h.engine.resolve_initial_theme().await;

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, template::INITIAL_SYSTEM_THEME);
}

#[tokio::test(start_paused = true)]
async fn cold_start_resumes_cached_custom_theme_as_swap_in() {
    let h = harness(Mode::Light);
    let id = Uuid::new_v4().to_string();
    let cached = payload(&id, "Deep Sea", complete_vars("#101010"));
    assert_ok!(
        h.store
            .set_item(SAVED_THEME_KEY, &serde_json::to_string(&cached).unwrap())
            .await
    );

    h.engine.resolve_initial_theme().await;

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, id);
    assert!(active.is_swap_in());
    // dark contrast background selects light status bar glyphs
    assert_eq!(h.chrome.style_changes(), [StatusBarStyle::LightContent]);
    // a provisional custom theme is not part of the synced listing
    assert!(h.engine.themes().await.iter().all(|t| t.id != id));
}

#[tokio::test(start_paused = true)]
async fn activation_merges_partial_variables_over_template() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    let mut vars = ThemeVariables::new();
    vars.set(VAR_INFO_COLOR, "#112233");
    h.sync.deliver(delivery(vec![payload("t1", "Minimal", vars)], vec![]));
    settle().await;

    assert_ok!(h.engine.activate("t1").await);

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, "t1");
    // override wins, every other variable fills from the template
    assert_some_eq!(active.variables().get(VAR_INFO_COLOR), "#112233");
    for name in template::template_variables().keys() {
        assert!(active.variables().contains(name), "missing {name}");
    }
    assert_single_active(&h.engine).await;

    // custom themes persist as a full projection, and the system slot clears
    assert_some!(h.store.get_item(SAVED_THEME_KEY).await.unwrap());
    assert_eq!(h.store.get_item(SAVED_SYSTEM_THEME_ID_KEY).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn partial_theme_is_completed_remotely_before_activation() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    let mut partial = ThemeVariables::new();
    partial.set("background_color", "#123456");
    h.sync.deliver(delivery(vec![payload("t1", "Remote", partial)], vec![]));
    settle().await;

    h.fetcher
        .set_outcome(Ok(FetchOutcome::Variables(complete_vars("#202020"))));
    let requests_before = h.sync.sync_requests();

    assert_ok!(h.engine.activate("t1").await);

    assert_eq!(h.fetcher.calls(), 1);
    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, "t1");
    assert!(active.is_dirty());
    assert_some_eq!(
        active.variables().get(VAR_CONTRAST_BACKGROUND_COLOR),
        "#202020"
    );
    // one push for the completed variables, one for the preference flags
    assert_eq!(h.sync.sync_requests(), requests_before + 2);
}

#[tokio::test(start_paused = true)]
async fn unavailable_theme_aborts_and_preserves_state() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    let mut partial = ThemeVariables::new();
    partial.set("background_color", "#123456");
    h.sync.deliver(delivery(vec![payload("t1", "Gone", partial)], vec![]));
    settle().await;

    let styles_before = h.chrome.style_changes().len();
    let icons_before = h.chrome.icon_changes().len();

    let err = assert_err!(h.engine.activate("t1").await);
    assert_eq!(
        err,
        ThemeError::NotAvailable {
            name: "Gone".to_string()
        }
    );

    // the previous theme stays active and chrome was not touched again
    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, template::INITIAL_SYSTEM_THEME);
    assert!(active.is_active_on_device());
    assert_eq!(h.chrome.style_changes().len(), styles_before);
    assert_eq!(h.chrome.icon_changes().len(), icons_before);
    assert_single_active(&h.engine).await;
}

#[tokio::test(start_paused = true)]
async fn fetch_transport_error_aborts_activation() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    let mut partial = ThemeVariables::new();
    partial.set("background_color", "#123456");
    h.sync.deliver(delivery(vec![payload("t1", "Flaky", partial)], vec![]));
    settle().await;

    h.fetcher
        .set_outcome(Err(FetchError::Transport("socket closed".to_string())));

    let err = assert_err!(h.engine.activate("t1").await);
    assert!(matches!(err, ThemeError::Fetch(_)));

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, template::INITIAL_SYSTEM_THEME);
    assert_single_active(&h.engine).await;
}

#[tokio::test(start_paused = true)]
async fn activate_unknown_theme_errors() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    let err = assert_err!(h.engine.activate("nope").await);
    assert_eq!(
        err,
        ThemeError::UnknownTheme {
            id: "nope".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn at_most_one_theme_is_device_active_across_activations() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    h.sync.deliver(delivery(
        vec![
            payload("t1", "First", complete_vars("#111111")),
            payload("t2", "Second", complete_vars("#222222")),
        ],
        vec![],
    ));
    settle().await;

    for id in ["t1", "t2", template::EMBER_SYSTEM_THEME, "t1"] {
        assert_ok!(h.engine.activate(id).await);
        assert_single_active(&h.engine).await;
        assert!(h.engine.is_theme_active(id).await);
    }
}

#[tokio::test(start_paused = true)]
async fn persistence_slots_are_mutually_exclusive() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    h.sync.deliver(delivery(
        vec![payload("t1", "Custom", complete_vars("#111111"))],
        vec![],
    ));
    settle().await;

    assert_ok!(h.engine.activate("t1").await);
    assert_some!(h.store.get_item(SAVED_THEME_KEY).await.unwrap());
    assert_eq!(h.store.get_item(SAVED_SYSTEM_THEME_ID_KEY).await.unwrap(), None);

    assert_ok!(h.engine.activate(template::EMBER_SYSTEM_THEME).await);
    assert_some_eq!(
        h.store.get_item(SAVED_SYSTEM_THEME_ID_KEY).await.unwrap(),
        template::EMBER_SYSTEM_THEME.to_string()
    );
    assert_eq!(h.store.get_item(SAVED_THEME_KEY).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn save_for_current_mode_switches_immediately() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    h.sync.deliver(delivery(
        vec![payload("t1", "Custom", complete_vars("#111111"))],
        vec![],
    ));
    settle().await;

    assert_ok!(h.engine.save_theme_for_mode("t1", Mode::Light).await);

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, "t1");
    let themes = h.engine.themes().await;
    let flagged: Vec<&str> = themes
        .iter()
        .filter(|t| t.preferred_for(Mode::Light))
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(flagged, ["t1"]);
}

#[tokio::test(start_paused = true)]
async fn save_for_other_mode_defers_until_mode_changes() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    h.sync.deliver(delivery(
        vec![payload("t1", "Night", complete_vars("#050505"))],
        vec![],
    ));
    settle().await;

    assert_ok!(h.engine.save_theme_for_mode("t1", Mode::Dark).await);

    // still light mode: nothing switches yet
    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, template::INITIAL_SYSTEM_THEME);

    h.mode.set_mode(Mode::Dark);
    fire_reconcile().await;

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, "t1");
    assert_eq!(h.engine.current_mode().await, Mode::Dark);
    assert_single_active(&h.engine).await;
}

#[tokio::test(start_paused = true)]
async fn system_theme_save_binds_to_current_mode_not_requested() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    // the caller asks for dark, but system themes bind to the mode the
    // device is in right now
    assert_ok!(
        h.engine
            .save_theme_for_mode(template::EMBER_SYSTEM_THEME, Mode::Dark)
            .await
    );

    let themes = h.engine.themes().await;
    let ember = themes
        .iter()
        .find(|t| t.id == template::EMBER_SYSTEM_THEME)
        .unwrap();
    assert!(ember.preferred_for(Mode::Light));
    assert!(!ember.preferred_for(Mode::Dark));

    // saving for the (current) light mode also switches to it
    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, template::EMBER_SYSTEM_THEME);
}

#[tokio::test(start_paused = true)]
async fn reconcile_adopts_active_theme_when_no_preference_exists() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    fire_reconcile().await;

    let themes = h.engine.themes().await;
    let flagged: Vec<&str> = themes
        .iter()
        .filter(|t| t.preferred_for(Mode::Light))
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(flagged, [template::INITIAL_SYSTEM_THEME]);
    assert!(h.sync.sync_requests() >= 1);
}

#[tokio::test(start_paused = true)]
async fn conflicting_mode_flags_converge_to_one() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    // a sync conflict left two themes flagged for dark mode
    let mut first = payload("t1", "Apollo", complete_vars("#111111"));
    first.preferred_dark = true;
    let mut second = payload("t2", "Zebra", complete_vars("#222222"));
    second.preferred_dark = true;
    h.sync.deliver(delivery(vec![first, second], vec![]));
    settle().await;

    h.mode.set_mode(Mode::Dark);
    fire_reconcile().await;

    let themes = h.engine.themes().await;
    let flagged: Vec<&str> = themes
        .iter()
        .filter(|t| t.preferred_for(Mode::Dark))
        .map(|t| t.id.as_str())
        .collect();
    // the presentation-order winner survives, the conflict heals
    assert_eq!(flagged, ["t1"]);
    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, "t1");
}

#[tokio::test(start_paused = true)]
async fn reconcile_is_a_noop_when_preference_already_active() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;
    fire_reconcile().await;

    let styles_before = h.chrome.style_changes().len();
    let requests_before = h.sync.sync_requests();

    // a burst of mode flips back to the starting mode coalesces into one
    // pass that finds the preference already active
    h.mode.set_mode(Mode::Dark);
    settle().await;
    h.mode.set_mode(Mode::Light);
    fire_reconcile().await;

    assert_eq!(h.chrome.style_changes().len(), styles_before);
    assert_eq!(h.sync.sync_requests(), requests_before);
}

#[tokio::test(start_paused = true)]
async fn swap_in_converges_silently_when_synced_copy_is_identical() {
    let h = harness(Mode::Light);
    let id = Uuid::new_v4().to_string();
    let cached = payload(&id, "Deep Sea", complete_vars("#101010"));
    assert_ok!(
        h.store
            .set_item(SAVED_THEME_KEY, &serde_json::to_string(&cached).unwrap())
            .await
    );
    h.engine.resolve_initial_theme().await;

    let notifications = Arc::new(AtomicU32::new(0));
    let notifications_clone = notifications.clone();
    h.engine.add_theme_change_observer(Arc::new(move || {
        notifications_clone.fetch_add(1, Ordering::SeqCst);
    }));

    h.sync.deliver(delivery(vec![cached.clone()], vec![]));
    settle().await;

    // converged to the synced record without a visible re-activation
    assert_eq!(notifications.load(Ordering::SeqCst), 0);
    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, id);
    assert!(!active.is_swap_in());
    assert!(active.is_active_on_device());
    // the record now lives in the synced set
    assert!(h.engine.themes().await.iter().any(|t| t.id == id));
    assert_single_active(&h.engine).await;
}

#[tokio::test(start_paused = true)]
async fn swap_in_reactivates_when_synced_copy_differs() {
    let h = harness(Mode::Light);
    let id = Uuid::new_v4().to_string();
    let cached = payload(&id, "Deep Sea", complete_vars("#101010"));
    assert_ok!(
        h.store
            .set_item(SAVED_THEME_KEY, &serde_json::to_string(&cached).unwrap())
            .await
    );
    h.engine.resolve_initial_theme().await;

    let notifications = Arc::new(AtomicU32::new(0));
    let notifications_clone = notifications.clone();
    h.engine.add_theme_change_observer(Arc::new(move || {
        notifications_clone.fetch_add(1, Ordering::SeqCst);
    }));

    // another device re-themed the record since we cached it
    let updated = payload(&id, "Deep Sea", complete_vars("#fafafa"));
    h.sync.deliver(delivery(vec![updated], vec![]));
    settle().await;

    assert_eq!(notifications.load(Ordering::SeqCst), 1);
    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, id);
    assert!(!active.is_swap_in());
    assert_some_eq!(
        active.variables().get(VAR_CONTRAST_BACKGROUND_COLOR),
        "#fafafa"
    );
    assert_single_active(&h.engine).await;
}

#[tokio::test(start_paused = true)]
async fn tombstoning_the_active_theme_falls_back_to_initial() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    h.sync.deliver(delivery(
        vec![payload("t1", "Doomed", complete_vars("#111111"))],
        vec![],
    ));
    settle().await;
    assert_ok!(h.engine.activate("t1").await);

    h.sync.deliver(delivery(vec![], vec!["t1".to_string()]));
    settle().await;

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, template::INITIAL_SYSTEM_THEME);
    assert!(h.engine.themes().await.iter().all(|t| t.id != "t1"));
    assert_single_active(&h.engine).await;
}

#[tokio::test(start_paused = true)]
async fn tombstone_fallback_prefers_surviving_mode_preference() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    h.sync.deliver(delivery(
        vec![
            payload("t1", "Doomed", complete_vars("#111111")),
            payload("t2", "Survivor", complete_vars("#222222")),
        ],
        vec![],
    ));
    settle().await;
    assert_ok!(h.engine.activate("t1").await);

    // a conflicting flag for t2 arrives from another device
    let mut conflicting = payload("t2", "Survivor", complete_vars("#222222"));
    conflicting.preferred_light = true;
    h.sync
        .deliver(delivery(vec![conflicting], vec!["t1".to_string()]));
    settle().await;

    let active = assert_some!(h.engine.active_theme().await);
    assert_eq!(active.id, "t2");
    assert_single_active(&h.engine).await;
}

#[tokio::test(start_paused = true)]
async fn refresh_theme_refetches_and_reactivates() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    h.sync.deliver(delivery(
        vec![payload("t1", "Stale", complete_vars("#111111"))],
        vec![],
    ));
    settle().await;
    assert_ok!(h.engine.activate("t1").await);

    h.fetcher
        .set_outcome(Ok(FetchOutcome::Variables(complete_vars("#2e2e2e"))));
    assert_ok!(h.engine.refresh_theme("t1").await);

    assert_eq!(h.fetcher.calls(), 1);
    let active = assert_some!(h.engine.active_theme().await);
    assert_some_eq!(
        active.variables().get(VAR_CONTRAST_BACKGROUND_COLOR),
        "#2e2e2e"
    );
}

#[tokio::test(start_paused = true)]
async fn observer_may_remove_itself_mid_notification() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    let self_removals = Arc::new(AtomicU32::new(0));
    let peer_calls = Arc::new(AtomicU32::new(0));

    let token_slot: Arc<Mutex<Option<engine::theme::ObserverToken>>> =
        Arc::new(Mutex::new(None));
    let engine_handle = h.engine.clone();
    let slot_clone = token_slot.clone();
    let removals_clone = self_removals.clone();
    let token = h.engine.add_theme_change_observer(Arc::new(move || {
        removals_clone.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = slot_clone
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            engine_handle.remove_theme_change_observer(token);
        }
    }));
    *token_slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);

    let peer_clone = peer_calls.clone();
    h.engine.add_theme_change_observer(Arc::new(move || {
        peer_clone.fetch_add(1, Ordering::SeqCst);
    }));

    assert_ok!(h.engine.activate(template::EMBER_SYSTEM_THEME).await);
    // the self-removing observer ran once and did not starve its peer
    assert_eq!(self_removals.load(Ordering::SeqCst), 1);
    assert_eq!(peer_calls.load(Ordering::SeqCst), 1);

    assert_ok!(h.engine.activate(template::INITIAL_SYSTEM_THEME).await);
    assert_eq!(self_removals.load(Ordering::SeqCst), 1);
    assert_eq!(peer_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn teardown_detaches_listeners_and_cancels_reconcile() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    assert_eq!(h.mode.handler_count(), 1);
    assert_eq!(h.sync.observer_count(), 1);

    // leave a reconciliation pending, then tear down before it fires
    h.mode.set_mode(Mode::Dark);
    settle().await;
    h.engine.teardown();

    assert_eq!(h.mode.handler_count(), 0);
    assert_eq!(h.sync.observer_count(), 0);

    let requests_before = h.sync.sync_requests();
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 4)).await;
    settle().await;
    // the canceled pass never ran: no preference was recorded
    assert_eq!(h.sync.sync_requests(), requests_before);
    let themes = h.engine.themes().await;
    assert!(themes.iter().all(|t| !t.preferred_for(Mode::Dark)));
}

#[tokio::test(start_paused = true)]
async fn styles_resolve_platform_overlays() {
    let h = harness(Mode::Light);
    h.engine.resolve_initial_theme().await;

    // chrome reports iOS, so note_text picks up its platform overlay
    let styles = h.engine.styles_for_key("note_text").await;
    assert_eq!(styles.len(), 2);
    assert_some_eq!(styles[1].padding_horizontal, 9);

    let base_only = h.engine.styles_for_key("button_cell").await;
    assert_eq!(base_only.len(), 1);
}
