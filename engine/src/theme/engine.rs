//! The Resolution Engine: decides which theme is active, keeps per-mode
//! preferences, completes partial remote themes, persists the selection for
//! cold start, and reconciles state as records arrive over sync.
//!
//! All record mutation is serialized behind one async mutex, so every
//! commit step observes a consistent in-memory theme set; mode-change and
//! sync-delivery events arriving mid-operation queue on that timeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::chrome::{KeyboardAppearance, PlatformChrome, StatusBarStyle};
use crate::config::EngineConfig;
use crate::error::{ThemeError, ThemeResult};
use crate::fetch::{FetchOutcome, ThemeFetcher};
use crate::mode::{Mode, ModeSignal, ModeSubscription};
use crate::storage::{PreferenceStore, SAVED_SYSTEM_THEME_ID_KEY, SAVED_THEME_KEY};
use crate::sync::{SyncFeed, SyncSubscription, ThemeDelivery};
use crate::theme::styles::{LayoutConstants, Style, StyleSheet};
use crate::theme::template::{self, VAR_CONTRAST_BACKGROUND_COLOR};
use crate::theme::types::{ThemeRecord, ThemeRecordPayload};

/// Callback invoked once per completed activation.
pub type ThemeChangeObserver = Arc<dyn Fn() + Send + Sync>;

/// Handle for a registered theme-change observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

#[derive(Default)]
struct SubscriptionHandles {
    mode: Option<ModeSubscription>,
    sync: Option<SyncSubscription>,
}

struct EngineState {
    /// The two built-in themes, initial theme first. Seeded at construction
    /// and never removed.
    system_themes: Vec<ThemeRecord>,
    synced_themes: Vec<ThemeRecord>,
    /// Swap-in candidate applied from the cold-start blob, held outside the
    /// synced set until its canonical counterpart arrives.
    provisional: Option<ThemeRecord>,
    active_id: Option<String>,
    current_mode: Mode,
    styles: StyleSheet,
    layout: LayoutConstants,
}

impl EngineState {
    fn new(current_mode: Mode) -> Self {
        Self {
            system_themes: template::builtin_themes(),
            synced_themes: Vec::new(),
            provisional: None,
            active_id: None,
            current_mode,
            styles: StyleSheet::default(),
            layout: LayoutConstants::default(),
        }
    }

    fn record(&self, id: &str) -> Option<&ThemeRecord> {
        if let Some(record) = self.system_themes.iter().find(|t| t.id == id) {
            return Some(record);
        }
        if let Some(record) = self.synced_themes.iter().find(|t| t.id == id) {
            return Some(record);
        }
        self.provisional.as_ref().filter(|t| t.id == id)
    }

    fn record_mut(&mut self, id: &str) -> Option<&mut ThemeRecord> {
        if let Some(record) = self.system_themes.iter_mut().find(|t| t.id == id) {
            return Some(record);
        }
        if let Some(record) = self.synced_themes.iter_mut().find(|t| t.id == id) {
            return Some(record);
        }
        self.provisional.as_mut().filter(|t| t.id == id)
    }

    fn all_records_mut(&mut self) -> impl Iterator<Item = &mut ThemeRecord> {
        self.system_themes
            .iter_mut()
            .chain(self.synced_themes.iter_mut())
            .chain(self.provisional.iter_mut())
    }

    /// Every known theme in presentation order: system themes in seed
    /// order, then synced themes sorted case-insensitively by name. The
    /// provisional record is not listed.
    fn sorted_themes(&self) -> Vec<&ThemeRecord> {
        let mut synced: Vec<&ThemeRecord> = self.synced_themes.iter().collect();
        synced.sort_by_key(|t| t.name.to_lowercase());
        self.system_themes.iter().chain(synced).collect()
    }

    fn find_preferred(&self, mode: Mode) -> Option<&ThemeRecord> {
        self.sorted_themes()
            .into_iter()
            .find(|t| t.preferred_for(mode))
    }

    fn active_record(&self) -> Option<&ThemeRecord> {
        self.active_id.as_deref().and_then(|id| self.record(id))
    }

    fn initial_system_id(&self) -> String {
        self.system_themes
            .iter()
            .find(|t| t.is_initial)
            .or_else(|| self.system_themes.first())
            .map(|t| t.id.clone())
            .unwrap_or_default()
    }
}

struct EngineShared {
    store: Arc<dyn PreferenceStore>,
    sync_feed: Arc<dyn SyncFeed>,
    fetcher: Arc<dyn ThemeFetcher>,
    mode_signal: Arc<dyn ModeSignal>,
    chrome: Arc<dyn PlatformChrome>,
    config: EngineConfig,
    state: Mutex<EngineState>,
    observers: StdMutex<Vec<(ObserverToken, ThemeChangeObserver)>>,
    next_observer: AtomicU64,
    debounce: StdMutex<CancellationToken>,
    subscriptions: StdMutex<SubscriptionHandles>,
}

/// Cheaply-cloneable handle to the single engine instance the app owns.
///
/// Construct once at startup inside a Tokio runtime (event handling and the
/// reconciliation debounce spawn tasks), then call
/// [`resolve_initial_theme`] before first paint and [`teardown`] on exit.
///
/// [`resolve_initial_theme`]: ThemeEngine::resolve_initial_theme
/// [`teardown`]: ThemeEngine::teardown
#[derive(Clone)]
pub struct ThemeEngine {
    shared: Arc<EngineShared>,
}

impl ThemeEngine {
    /// Wire the engine to its collaborators, seed the system themes, and
    /// schedule the initial mode reconciliation pass.
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        sync_feed: Arc<dyn SyncFeed>,
        fetcher: Arc<dyn ThemeFetcher>,
        mode_signal: Arc<dyn ModeSignal>,
        chrome: Arc<dyn PlatformChrome>,
        config: EngineConfig,
    ) -> Self {
        let current_mode = mode_signal.current_mode();
        let shared = Arc::new(EngineShared {
            store,
            sync_feed,
            fetcher,
            mode_signal,
            chrome,
            config,
            state: Mutex::new(EngineState::new(current_mode)),
            observers: StdMutex::new(Vec::new()),
            next_observer: AtomicU64::new(0),
            debounce: StdMutex::new(CancellationToken::new()),
            subscriptions: StdMutex::new(SubscriptionHandles::default()),
        });

        let weak = Arc::downgrade(&shared);
        let sync_subscription =
            shared
                .sync_feed
                .register_theme_observer(Arc::new(move |delivery| {
                    if let Some(shared) = weak.upgrade() {
                        tokio::spawn(shared.on_sync_delivery(delivery));
                    }
                }));

        let weak = Arc::downgrade(&shared);
        let mode_subscription = shared.mode_signal.subscribe(Arc::new(move |mode| {
            if let Some(shared) = weak.upgrade() {
                tokio::spawn(shared.on_mode_changed(mode));
            }
        }));

        {
            let mut handles = shared
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            handles.mode = Some(mode_subscription);
            handles.sync = Some(sync_subscription);
        }

        // construction counts as a mode event: once the startup burst
        // settles, pick up whatever per-mode preference has synced in
        EngineShared::schedule_mode_reconcile(&shared);

        log::info!("theme engine constructed in {current_mode:?} mode");
        Self { shared }
    }

    /// Resolve an active theme from the Preference Store alone, so the UI
    /// is styled before any sync data loads. Never blocks on the network;
    /// every failure degrades to the initial system theme.
    pub async fn resolve_initial_theme(&self) {
        let shared = &self.shared;

        let saved = match shared.store.get_item(SAVED_THEME_KEY).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("saved theme read failed, using system fallback: {e}");
                None
            }
        };

        if let Some(blob) = saved {
            match serde_json::from_str::<ThemeRecordPayload>(&blob) {
                Ok(payload) => {
                    let mut record = ThemeRecord::from_payload(payload);
                    record.is_swap_in = true;
                    let id = record.id.clone();

                    let mut state = shared.state.lock().await;
                    state.provisional = Some(record);
                    shared.apply_record(&mut state, &id);
                    log::info!("cold start resolved cached theme '{id}'");
                    return;
                }
                Err(e) => {
                    log::error!("corrupt saved theme blob, using system fallback: {e}");
                }
            }
        }

        let saved_id = match shared.store.get_item(SAVED_SYSTEM_THEME_ID_KEY).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("saved system theme id read failed: {e}");
                None
            }
        };

        let mut state = shared.state.lock().await;
        let id = saved_id
            .and_then(|saved| {
                state
                    .system_themes
                    .iter()
                    .find(|t| t.id == saved)
                    .map(|t| t.id.clone())
            })
            .unwrap_or_else(|| state.initial_system_id());
        shared.apply_record(&mut state, &id);
        log::info!("cold start resolved system theme '{id}'");
    }

    /// Activate a known theme, persisting it as the resumable selection.
    pub async fn activate(&self, theme_id: &str) -> ThemeResult<()> {
        self.activate_with(theme_id, true).await
    }

    /// Activate a known theme, optionally skipping the persistence step.
    pub async fn activate_with(&self, theme_id: &str, persist: bool) -> ThemeResult<()> {
        let mut state = self.shared.state.lock().await;
        self.shared
            .activate_internal(&mut state, theme_id, persist)
            .await
    }

    /// Record `theme_id` as the preferred theme for `mode`, switching to it
    /// when that mode is the one the device is currently in.
    ///
    /// System themes ignore the requested mode and bind to the current
    /// device mode: they are mode-agnostic skins picked per mode.
    pub async fn save_theme_for_mode(&self, theme_id: &str, mode: Mode) -> ThemeResult<()> {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        if state.record(theme_id).is_none() {
            return Err(ThemeError::UnknownTheme {
                id: theme_id.to_string(),
            });
        }

        let target = shared.record_preference_for_mode(&mut state, theme_id, mode);
        if target == state.current_mode && state.active_id.as_deref() != Some(theme_id) {
            shared.apply_record(&mut state, theme_id);
        }
        Ok(())
    }

    /// Re-fetch a theme's variables from the remote definition, push the
    /// update via sync, and re-activate it.
    pub async fn refresh_theme(&self, theme_id: &str) -> ThemeResult<()> {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;
        let Some(snapshot) = state.record(theme_id).cloned() else {
            return Err(ThemeError::UnknownTheme {
                id: theme_id.to_string(),
            });
        };

        match shared.fetcher.fetch_theme(&snapshot).await? {
            FetchOutcome::Variables(variables) if !variables.is_empty() => {
                if let Some(record) = state.record_mut(theme_id) {
                    record.replace_variables(variables);
                    record.is_dirty = true;
                }
                shared.sync_feed.request_sync();
            }
            FetchOutcome::Variables(_) | FetchOutcome::Unavailable => {
                return Err(ThemeError::NotAvailable {
                    name: snapshot.name,
                });
            }
        }

        shared.activate_internal(&mut state, theme_id, true).await
    }

    /// Every known theme in presentation order: system themes first, then
    /// synced themes sorted case-insensitively by name.
    pub async fn themes(&self) -> Vec<ThemeRecord> {
        let state = self.shared.state.lock().await;
        state.sorted_themes().into_iter().cloned().collect()
    }

    pub async fn active_theme(&self) -> Option<ThemeRecord> {
        let state = self.shared.state.lock().await;
        state.active_record().cloned()
    }

    pub async fn is_theme_active(&self, theme_id: &str) -> bool {
        let state = self.shared.state.lock().await;
        match &state.active_id {
            Some(active) => active == theme_id,
            None => state
                .record(theme_id)
                .map(|t| t.is_active_on_device())
                .unwrap_or(false),
        }
    }

    /// Value of one style variable on the active theme.
    pub async fn variable(&self, name: &str) -> Option<String> {
        let state = self.shared.state.lock().await;
        state
            .active_record()
            .and_then(|t| t.variables().get(name).map(str::to_string))
    }

    pub async fn current_mode(&self) -> Mode {
        let state = self.shared.state.lock().await;
        state.current_mode
    }

    /// The derived style table for the active theme.
    pub async fn styles(&self) -> StyleSheet {
        let state = self.shared.state.lock().await;
        state.styles.clone()
    }

    /// Base style for `key` plus the overlay for the host platform.
    pub async fn styles_for_key(&self, key: &str) -> Vec<Style> {
        let state = self.shared.state.lock().await;
        state
            .styles
            .styles_for_key(key, self.shared.chrome.platform())
            .into_iter()
            .cloned()
            .collect()
    }

    /// Keyboard appearance matching the active theme's contrast background.
    pub async fn keyboard_appearance(&self) -> KeyboardAppearance {
        let mut state = self.shared.state.lock().await;
        let Some(id) = state.active_id.clone() else {
            return KeyboardAppearance::Light;
        };
        state
            .record_mut(&id)
            .map(|t| t.keyboard_appearance())
            .unwrap_or(KeyboardAppearance::Light)
    }

    /// Status bar content styling for the active theme.
    pub async fn active_status_bar_style(&self) -> StatusBarStyle {
        let mut state = self.shared.state.lock().await;
        let Some(id) = state.active_id.clone() else {
            return StatusBarStyle::DarkContent;
        };
        state
            .record_mut(&id)
            .map(|t| t.status_bar_style())
            .unwrap_or(StatusBarStyle::DarkContent)
    }

    /// Register an observer invoked once per completed activation,
    /// synchronously, in registration order.
    pub fn add_theme_change_observer(&self, observer: ThemeChangeObserver) -> ObserverToken {
        let token = ObserverToken(self.shared.next_observer.fetch_add(1, Ordering::Relaxed));
        self.shared
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((token, observer));
        token
    }

    pub fn remove_theme_change_observer(&self, token: ObserverToken) {
        self.shared
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(t, _)| *t != token);
    }

    /// Detach from the Mode Signal and Sync Feed and cancel any pending
    /// reconciliation. The process-wide mode emitter would otherwise keep
    /// the listener alive forever.
    pub fn teardown(&self) {
        let shared = &self.shared;
        shared
            .debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();

        let (mode, sync) = {
            let mut handles = shared
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            (handles.mode.take(), handles.sync.take())
        };
        if let Some(subscription) = mode {
            shared.mode_signal.unsubscribe(subscription);
        }
        if let Some(subscription) = sync {
            shared.sync_feed.unregister_theme_observer(subscription);
        }
        log::info!("theme engine torn down");
    }
}

impl EngineShared {
    /// Reset the debounce window and arm a reconciliation pass behind it.
    /// Bursts of triggers (startup, rapid mode flips) collapse into one run.
    fn schedule_mode_reconcile(shared: &Arc<Self>) {
        let token = CancellationToken::new();
        {
            let mut slot = shared
                .debounce
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slot.cancel();
            *slot = token.clone();
        }

        let window = shared.config.mode_debounce();
        let weak = Arc::downgrade(shared);
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(window) => {
                    if let Some(shared) = weak.upgrade() {
                        shared.reconcile_mode_preference().await;
                    }
                }
                () = token.cancelled() => {}
            }
        });
    }

    async fn on_mode_changed(self: Arc<Self>, mode: Mode) {
        {
            let mut state = self.state.lock().await;
            if state.current_mode != mode {
                log::debug!("device mode changed to {mode:?}");
                state.current_mode = mode;
            }
        }
        Self::schedule_mode_reconcile(&self);
    }

    /// Pick the theme to show for the current mode: the flagged preference
    /// if one exists, otherwise adopt the currently active theme as the
    /// preference for this mode.
    async fn reconcile_mode_preference(&self) {
        let mut state = self.state.lock().await;
        let mode = state.current_mode;
        let preferred = state.find_preferred(mode).map(|t| t.id.clone());

        match preferred {
            Some(id) if state.active_id.as_deref() == Some(id.as_str()) => {
                log::debug!("preferred theme for {mode:?} already active");
            }
            Some(id) => {
                if let Err(e) = self.activate_internal(&mut state, &id, true).await {
                    log::warn!("failed to activate preferred theme for {mode:?}: {e}");
                }
            }
            None => {
                if let Some(active) = state.active_id.clone() {
                    self.record_preference_for_mode(&mut state, &active, mode);
                }
            }
        }
    }

    async fn on_sync_delivery(self: Arc<Self>, delivery: ThemeDelivery) {
        let mut state = self.state.lock().await;
        log::debug!(
            "sync delivered {} updated and {} deleted theme records ({:?})",
            delivery.valid.len(),
            delivery.deleted.len(),
            delivery.source
        );

        for payload in delivery.valid {
            if state.system_themes.iter().any(|t| t.id == payload.id) {
                log::warn!(
                    "ignoring synced record colliding with system theme '{}'",
                    payload.id
                );
                continue;
            }
            let incoming = ThemeRecord::from_payload(payload);
            if let Some(existing) = state.synced_themes.iter_mut().find(|t| t.id == incoming.id)
            {
                let was_active = existing.is_active_on_device();
                *existing = incoming;
                existing.is_active_on_device = was_active;
            } else {
                state.synced_themes.push(incoming);
            }
        }

        self.converge_swap_in(&mut state);

        let mut active_deleted = false;
        for id in &delivery.deleted {
            if state.active_id.as_deref() == Some(id.as_str()) {
                active_deleted = true;
            }
            state.synced_themes.retain(|t| &t.id != id);
        }

        if active_deleted {
            state.active_id = None;
            let fallback = state
                .find_preferred(state.current_mode)
                .map(|t| t.id.clone())
                .unwrap_or_else(|| state.initial_system_id());
            if let Err(e) = self.activate_internal(&mut state, &fallback, true).await {
                log::warn!("fallback activation after tombstone failed: {e}");
                let initial = state.initial_system_id();
                if initial != fallback {
                    if let Err(e) = self.activate_internal(&mut state, &initial, true).await {
                        log::warn!("initial system theme activation failed: {e}");
                    }
                }
            }
        }
    }

    /// Replace an active swap-in candidate with its synced counterpart.
    /// Runs at most once per cold start; an equivalent synced copy is
    /// adopted silently so the screen never flickers.
    fn converge_swap_in(&self, state: &mut EngineState) {
        let converging = state
            .provisional
            .as_ref()
            .filter(|p| p.is_swap_in() && state.active_id.as_deref() == Some(p.id.as_str()))
            .map(|p| p.id.clone());

        let Some(id) = converging else { return };
        if !state.synced_themes.iter().any(|t| t.id == id) {
            return;
        }

        let provisional = state.provisional.take();
        let equivalent = match (
            state.synced_themes.iter().find(|t| t.id == id),
            provisional.as_ref(),
        ) {
            (Some(synced), Some(cached)) => {
                // the cached record was template-merged when applied, so
                // normalize the synced copy the same way before comparing
                let mut normalized = synced.clone();
                normalized.merge_template();
                normalized.to_payload() == cached.to_payload()
            }
            _ => false,
        };

        if equivalent {
            if let Some(record) = state.record_mut(&id) {
                record.merge_template();
                record.is_active_on_device = true;
            }
            log::debug!("swap-in theme '{id}' converged without re-activation");
        } else {
            self.apply_record(state, &id);
            log::info!("swap-in theme '{id}' replaced by its synced copy");
        }
    }

    /// The full activation protocol: clear the old active flag, complete
    /// the variable set remotely if needed, merge the template, record the
    /// per-mode preference, persist, and apply side effects.
    async fn activate_internal(
        &self,
        state: &mut EngineState,
        theme_id: &str,
        persist: bool,
    ) -> ThemeResult<()> {
        let Some(snapshot) = state.record(theme_id).cloned() else {
            return Err(ThemeError::UnknownTheme {
                id: theme_id.to_string(),
            });
        };

        let previous_id = state.active_id.clone();
        if let Some(previous) = previous_id.as_deref() {
            if previous != theme_id {
                if let Some(record) = state.record_mut(previous) {
                    record.is_active_on_device = false;
                }
            }
        }

        if snapshot.needs_remote_completion() {
            match self.fetcher.fetch_theme(&snapshot).await {
                Ok(FetchOutcome::Variables(variables)) if !variables.is_empty() => {
                    if let Some(record) = state.record_mut(theme_id) {
                        record.replace_variables(variables);
                        record.is_dirty = true;
                    }
                    self.sync_feed.request_sync();
                }
                Ok(FetchOutcome::Variables(_)) | Ok(FetchOutcome::Unavailable) => {
                    self.restore_active(state, previous_id.as_deref());
                    log::warn!("theme '{}' is not available on this device", snapshot.name);
                    return Err(ThemeError::NotAvailable {
                        name: snapshot.name,
                    });
                }
                Err(e) => {
                    self.restore_active(state, previous_id.as_deref());
                    log::warn!("theme download failed for '{}': {e}", snapshot.name);
                    return Err(e.into());
                }
            }
        }

        self.commit_active(state, theme_id);
        let mode = state.current_mode;
        self.record_preference_for_mode(state, theme_id, mode);
        if persist {
            self.persist_selection(state, theme_id).await;
        }
        self.apply_side_effects(state, theme_id);
        log::info!("activated theme '{theme_id}'");
        Ok(())
    }

    /// The internal commit path used where the full protocol is not wanted:
    /// cold start, swap-in convergence, and the save-for-mode switch.
    fn apply_record(&self, state: &mut EngineState, theme_id: &str) {
        if let Some(previous) = state.active_id.clone() {
            if previous != theme_id {
                if let Some(record) = state.record_mut(&previous) {
                    record.is_active_on_device = false;
                }
            }
        }
        self.commit_active(state, theme_id);
        self.apply_side_effects(state, theme_id);
    }

    fn commit_active(&self, state: &mut EngineState, theme_id: &str) {
        if let Some(record) = state.record_mut(theme_id) {
            record.merge_template();
            record.is_active_on_device = true;
        }
        state.active_id = Some(theme_id.to_string());
    }

    fn restore_active(&self, state: &mut EngineState, previous: Option<&str>) {
        if let Some(id) = previous {
            if let Some(record) = state.record_mut(id) {
                record.is_active_on_device = true;
            }
        }
    }

    /// Bind `theme_id` to one mode's preference slot. Sweeps every record
    /// rather than the single expected holder: sync conflicts can leave two
    /// records flagged for one mode, and this is where that heals.
    ///
    /// Returns the mode actually targeted; system themes always bind to
    /// the current device mode, whatever the caller requested.
    fn record_preference_for_mode(
        &self,
        state: &mut EngineState,
        theme_id: &str,
        requested: Mode,
    ) -> Mode {
        let is_system = state
            .record(theme_id)
            .map(|t| t.is_system)
            .unwrap_or(false);
        let target = if is_system {
            state.current_mode
        } else {
            requested
        };

        for record in state.all_records_mut() {
            if record.preferred_for(target) {
                record.set_preferred_for(target, false);
                record.is_dirty = true;
            }
        }
        if let Some(record) = state.record_mut(theme_id) {
            record.set_preferred_for(target, true);
            record.is_dirty = true;
        }

        self.sync_feed.request_sync();
        target
    }

    /// Write the dual-slot cold-start state: system themes resume by id,
    /// custom themes by their full serialized projection.
    async fn persist_selection(&self, state: &EngineState, theme_id: &str) {
        let Some(record) = state.record(theme_id) else {
            return;
        };

        if record.is_system {
            if let Err(e) = self.store.set_item(SAVED_SYSTEM_THEME_ID_KEY, &record.id).await {
                log::warn!("failed to persist system theme id: {e}");
            }
            if let Err(e) = self.store.remove_item(SAVED_THEME_KEY).await {
                log::warn!("failed to clear saved theme slot: {e}");
            }
        } else {
            match serde_json::to_string(&record.to_payload()) {
                Ok(blob) => {
                    if let Err(e) = self.store.set_item(SAVED_THEME_KEY, &blob).await {
                        log::warn!("failed to persist saved theme: {e}");
                    }
                    if let Err(e) = self.store.remove_item(SAVED_SYSTEM_THEME_ID_KEY).await {
                        log::warn!("failed to clear system theme id slot: {e}");
                    }
                }
                Err(e) => log::error!("failed to serialize active theme: {e}"),
            }
        }
    }

    /// Chrome side effects, the rebuilt style table, and observer
    /// notification: the externally visible tail of every activation.
    fn apply_side_effects(&self, state: &mut EngineState, theme_id: &str) {
        let Some((style, background, icon)) = state.record_mut(theme_id).map(|record| {
            let style = record.status_bar_style();
            let background = record
                .variables()
                .get(VAR_CONTRAST_BACKGROUND_COLOR)
                .map(str::to_string);
            let icon = record.is_system.then(|| {
                if record.is_initial {
                    None
                } else {
                    Some(record.name.clone())
                }
            });
            (style, background, icon)
        }) else {
            return;
        };

        self.chrome.set_status_bar_style(style);
        if let Some(color) = &background {
            self.chrome.set_status_bar_background(color);
        }
        if let Some(icon) = icon {
            if let Err(e) = self.chrome.set_app_icon(icon.as_deref()) {
                log::debug!("app icon change skipped: {e}");
            }
        }

        if let Some(variables) = state.record(theme_id).map(|t| t.variables().clone()) {
            state.styles = StyleSheet::build(&variables, &state.layout);
        }

        self.notify_observers();
    }

    fn notify_observers(&self) {
        // snapshot first: an observer may deregister itself (or a peer)
        // while the notification sweep is running
        let observers: Vec<ThemeChangeObserver> = {
            let guard = self
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard.iter().map(|(_, observer)| observer.clone()).collect()
        };
        for observer in observers {
            observer();
        }
    }
}
