//! Application state for mdpaste.
//!
//! `AppState` owns the user preferences and the conversion counters. It is
//! built once at startup and lent to the menu bar, which reads it on every
//! render and routes every mutation through it. All mutation happens on the
//! main thread; work finishing elsewhere is queued and applied by
//! [`AppState::process_pending`].

use crate::prefs::{PrefKey, PrefValue, PreferenceStore, Preferences};
use crate::services::{LoginItemService, NotificationService};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

/// What changed in an [`AppState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Enabled,
    LaunchAtLogin,
    DetectionSensitivity,
    IncludeRtf,
    ShowNotifications,
    BaseFontSize,
    /// Conversion count or timestamp
    Conversions,
}

impl From<PrefKey> for Change {
    fn from(key: PrefKey) -> Self {
        match key {
            PrefKey::Enabled => Change::Enabled,
            PrefKey::LaunchAtLogin => Change::LaunchAtLogin,
            PrefKey::DetectionSensitivity => Change::DetectionSensitivity,
            PrefKey::IncludeRtf => Change::IncludeRtf,
            PrefKey::ShowNotifications => Change::ShowNotifications,
            PrefKey::BaseFontSize => Change::BaseFontSize,
        }
    }
}

/// A single preference write, as produced by the settings window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceEdit {
    Enabled(bool),
    LaunchAtLogin(bool),
    DetectionSensitivity(i64),
    IncludeRtf(bool),
    ShowNotifications(bool),
    BaseFontSize(i64),
}

/// Conversion counters. Written by the converter, read by the menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Number of conversions since launch
    pub count: u64,
    /// Time of the most recent conversion
    pub last_conversion: Option<DateTime<Utc>>,
}

impl ConversionStats {
    pub fn record(&mut self, at: DateTime<Utc>) {
        self.count += 1;
        self.last_conversion = Some(at);
    }
}

/// Configuration handed to the clipboard converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSettings {
    pub detection_sensitivity: i64,
    pub include_rtf: bool,
    pub base_font_size: i64,
}

/// Results that arrive off the main thread.
#[derive(Debug)]
enum Deferred {
    NotificationPermission { granted: bool },
}

/// Called from any thread when deferred work is queued, so the event loop
/// can wake up and call [`AppState::process_pending`].
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`AppState::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(Change)>;

pub struct AppState {
    prefs: Preferences,
    stats: ConversionStats,
    store: Box<dyn PreferenceStore>,
    login_items: Box<dyn LoginItemService>,
    notifications: Box<dyn NotificationService>,
    deferred_tx: Sender<Deferred>,
    deferred_rx: Receiver<Deferred>,
    waker: Option<Waker>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl AppState {
    /// Build the state, reading current preferences from `store`.
    pub fn new(
        store: Box<dyn PreferenceStore>,
        login_items: Box<dyn LoginItemService>,
        notifications: Box<dyn NotificationService>,
    ) -> Self {
        let prefs = Preferences::load(store.as_ref());
        let (deferred_tx, deferred_rx) = channel();
        Self {
            prefs,
            stats: ConversionStats::default(),
            store,
            login_items,
            notifications,
            deferred_tx,
            deferred_rx,
            waker: None,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker);
    }

    /// Register a listener called after every change.
    pub fn subscribe(&mut self, listener: impl FnMut(Change) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.listeners.retain(|(existing, _)| *existing != id);
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn enabled(&self) -> bool {
        self.prefs.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.prefs.enabled = enabled;
        self.persist(PrefKey::Enabled);
    }

    pub fn toggle_enabled(&mut self) {
        self.set_enabled(!self.prefs.enabled);
    }

    pub fn launch_at_login(&self) -> bool {
        self.prefs.launch_at_login
    }

    /// Store the preference, then register or unregister the login item.
    ///
    /// Runs on every write, including writes of the current value. A failed
    /// OS call is logged and returned, but the stored value stays as written,
    /// so it can disagree with the actual registration.
    pub fn set_launch_at_login(&mut self, launch: bool) -> Result<()> {
        self.prefs.launch_at_login = launch;
        self.persist(PrefKey::LaunchAtLogin);

        let result = if launch {
            self.login_items.register()
        } else {
            self.login_items.unregister()
        };
        if let Err(ref e) = result {
            tracing::warn!("Failed to update launch at login: {:#}", e);
        }
        result
    }

    pub fn detection_sensitivity(&self) -> i64 {
        self.prefs.detection_sensitivity
    }

    pub fn set_detection_sensitivity(&mut self, level: i64) {
        self.prefs.detection_sensitivity = level;
        self.persist(PrefKey::DetectionSensitivity);
    }

    pub fn include_rtf(&self) -> bool {
        self.prefs.include_rtf
    }

    pub fn set_include_rtf(&mut self, include: bool) {
        self.prefs.include_rtf = include;
        self.persist(PrefKey::IncludeRtf);
    }

    pub fn show_notifications(&self) -> bool {
        self.prefs.show_notifications
    }

    /// Store the preference; when turning it on, ask for notification
    /// permission.
    ///
    /// The request does not block. If it is denied, the preference is reset
    /// to `false` by the next [`process_pending`](Self::process_pending);
    /// until then it reads `true`.
    pub fn set_show_notifications(&mut self, show: bool) {
        self.prefs.show_notifications = show;
        self.persist(PrefKey::ShowNotifications);

        if show {
            self.request_notification_permission();
        }
    }

    pub fn base_font_size(&self) -> i64 {
        self.prefs.base_font_size
    }

    pub fn set_base_font_size(&mut self, size: i64) {
        self.prefs.base_font_size = size;
        self.persist(PrefKey::BaseFontSize);
    }

    /// Apply one edit through the matching setter, side effects included.
    pub fn apply(&mut self, edit: PreferenceEdit) -> Result<()> {
        match edit {
            PreferenceEdit::Enabled(v) => self.set_enabled(v),
            PreferenceEdit::LaunchAtLogin(v) => return self.set_launch_at_login(v),
            PreferenceEdit::DetectionSensitivity(v) => self.set_detection_sensitivity(v),
            PreferenceEdit::IncludeRtf(v) => self.set_include_rtf(v),
            PreferenceEdit::ShowNotifications(v) => self.set_show_notifications(v),
            PreferenceEdit::BaseFontSize(v) => self.set_base_font_size(v),
        }
        Ok(())
    }

    pub fn conversion_stats(&self) -> &ConversionStats {
        &self.stats
    }

    /// Called by the converter after each clipboard conversion.
    pub fn record_conversion(&mut self, at: DateTime<Utc>) {
        self.stats.record(at);
        self.notify(Change::Conversions);
    }

    pub fn conversion_settings(&self) -> ConversionSettings {
        ConversionSettings {
            detection_sensitivity: self.prefs.detection_sensitivity,
            include_rtf: self.prefs.include_rtf,
            base_font_size: self.prefs.base_font_size,
        }
    }

    /// Apply results queued from other threads. Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(deferred) = self.deferred_rx.try_recv() {
            match deferred {
                Deferred::NotificationPermission { granted: true } => {
                    tracing::debug!("Notification permission granted");
                }
                Deferred::NotificationPermission { granted: false } => {
                    tracing::info!("Notification permission denied, turning notifications off");
                    self.set_show_notifications(false);
                }
            }
            applied += 1;
        }
        applied
    }

    /// Re-read preferences after the store changed outside the app.
    ///
    /// Listeners hear about every field that differs. No OS side effects
    /// run; those follow in-app writes only.
    pub fn reload_preferences(&mut self) -> Result<Vec<Change>> {
        self.store.reload()?;
        let fresh = Preferences::load(self.store.as_ref());

        let changes: Vec<Change> = PrefKey::ALL
            .iter()
            .filter(|key| fresh.value(**key) != self.prefs.value(**key))
            .map(|key| Change::from(*key))
            .collect();

        self.prefs = fresh;
        for change in &changes {
            self.notify(*change);
        }
        Ok(changes)
    }

    fn request_notification_permission(&self) {
        let tx = self.deferred_tx.clone();
        let waker = self.waker.clone();
        self.notifications
            .request_authorization(Box::new(move |granted| {
                if tx.send(Deferred::NotificationPermission { granted }).is_ok() {
                    if let Some(wake) = waker {
                        wake();
                    }
                }
            }));
    }

    /// Write the in-memory value of `key` to the store and notify listeners.
    fn persist(&mut self, key: PrefKey) {
        let value: PrefValue = self.prefs.value(key);
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!("Failed to save preference {}: {:#}", key.as_str(), e);
        }
        self.notify(Change::from(key));
    }

    fn notify(&mut self, change: Change) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryStore;
    use crate::services::mock::{FailingStore, Harness, LoginItemCall};
    use chrono::Duration;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record_changes(state: &mut AppState) -> Rc<RefCell<Vec<Change>>> {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        state.subscribe(move |change| sink.borrow_mut().push(change));
        changes
    }

    #[test]
    fn test_defaults() {
        let h = Harness::new();
        assert!(h.state.enabled());
        assert!(!h.state.launch_at_login());
        assert_eq!(h.state.detection_sensitivity(), 2);
        assert!(h.state.include_rtf());
        assert!(!h.state.show_notifications());
        assert_eq!(h.state.base_font_size(), 14);
        assert_eq!(h.state.conversion_stats().count, 0);
        assert!(h.state.conversion_stats().last_conversion.is_none());
    }

    #[test]
    fn test_loads_stored_preferences() {
        let store = MemoryStore::new()
            .with(PrefKey::Enabled, PrefValue::Bool(false))
            .with(PrefKey::DetectionSensitivity, PrefValue::Int(4));
        let h = Harness::with_store(store);
        assert!(!h.state.enabled());
        assert_eq!(h.state.detection_sensitivity(), 4);
    }

    #[test]
    fn test_set_enabled_has_no_side_effects() {
        let mut h = Harness::new();
        for value in [false, true, true, false] {
            h.state.set_enabled(value);
            assert_eq!(h.state.enabled(), value);
        }
        assert!(h.login_items.calls.borrow().is_empty());
        assert_eq!(h.notifications.requests.get(), 0);
    }

    #[test]
    fn test_toggle_enabled() {
        let mut h = Harness::new();
        h.state.toggle_enabled();
        assert!(!h.state.enabled());
        h.state.toggle_enabled();
        assert!(h.state.enabled());
    }

    #[test]
    fn test_launch_at_login_registers_and_unregisters() {
        let mut h = Harness::new();

        h.state.set_launch_at_login(true).unwrap();
        assert_eq!(*h.login_items.calls.borrow(), vec![LoginItemCall::Register]);

        h.state.set_launch_at_login(false).unwrap();
        assert_eq!(
            *h.login_items.calls.borrow(),
            vec![LoginItemCall::Register, LoginItemCall::Unregister]
        );
    }

    #[test]
    fn test_launch_at_login_same_value_calls_again() {
        let mut h = Harness::new();
        h.state.set_launch_at_login(true).unwrap();
        h.state.set_launch_at_login(true).unwrap();
        assert_eq!(
            *h.login_items.calls.borrow(),
            vec![LoginItemCall::Register, LoginItemCall::Register]
        );
    }

    #[test]
    fn test_launch_at_login_failure_keeps_value() {
        let mut h = Harness::new();
        h.login_items.fail.set(true);

        let result = h.state.set_launch_at_login(true);
        assert!(result.is_err());
        assert!(h.state.launch_at_login());
        assert_eq!(h.login_items.calls.borrow().len(), 1);
    }

    #[test]
    fn test_show_notifications_denied_resets_after_processing() {
        let mut h = Harness::new();

        h.state.set_show_notifications(true);
        assert_eq!(h.notifications.requests.get(), 1);
        assert!(h.state.show_notifications());

        h.notifications.resolve_all(false);
        // Still true until the main thread applies the result
        assert!(h.state.show_notifications());

        assert_eq!(h.state.process_pending(), 1);
        assert!(!h.state.show_notifications());
        // The reset itself does not ask again
        assert_eq!(h.notifications.requests.get(), 1);
    }

    #[test]
    fn test_show_notifications_granted_stays_on() {
        let mut h = Harness::new();
        h.state.set_show_notifications(true);
        h.notifications.resolve_all(true);
        assert_eq!(h.state.process_pending(), 1);
        assert!(h.state.show_notifications());
    }

    #[test]
    fn test_show_notifications_false_does_not_request() {
        let mut h = Harness::new();
        h.state.set_show_notifications(false);
        assert_eq!(h.notifications.requests.get(), 0);
        assert_eq!(h.notifications.pending(), 0);
    }

    #[test]
    fn test_immediate_refusal_settles_to_false() {
        struct Unavailable;

        impl NotificationService for Unavailable {
            fn request_authorization(&self, reply: crate::services::PermissionReply) {
                reply(false);
            }
        }

        let mut state = AppState::new(
            Box::new(MemoryStore::new()),
            Box::new(crate::services::mock::MockLoginItems::default()),
            Box::new(Unavailable),
        );

        state.set_show_notifications(true);
        assert!(state.show_notifications());
        assert_eq!(state.process_pending(), 1);
        assert!(!state.show_notifications());
    }

    #[test]
    fn test_process_pending_with_nothing_queued() {
        let mut h = Harness::new();
        assert_eq!(h.state.process_pending(), 0);
    }

    #[test]
    fn test_waker_called_when_reply_arrives() {
        let mut h = Harness::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = wakes.clone();
        h.state.set_waker(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        h.state.set_show_notifications(true);
        assert_eq!(wakes.load(Ordering::SeqCst), 0);

        h.notifications.resolve_all(true);
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reply_from_another_thread() {
        let mut h = Harness::new();
        h.state.set_show_notifications(true);

        let tx = h.state.deferred_tx.clone();
        std::thread::spawn(move || {
            tx.send(Deferred::NotificationPermission { granted: false })
                .unwrap();
        })
        .join()
        .unwrap();

        h.state.process_pending();
        assert!(!h.state.show_notifications());
    }

    #[test]
    fn test_writes_persist_to_store() {
        let mut h = Harness::new();
        h.state.set_base_font_size(20);
        h.state.set_include_rtf(false);

        let reloaded = Preferences::load(h.state.store.as_ref());
        assert_eq!(reloaded.base_font_size, 20);
        assert!(!reloaded.include_rtf);
    }

    #[test]
    fn test_store_write_failure_keeps_value_and_side_effects() {
        let mut h = Harness::with_store(FailingStore);
        let changes = record_changes(&mut h.state);

        h.state.set_enabled(false);
        assert!(!h.state.enabled());

        h.state.set_launch_at_login(true).unwrap();
        assert!(h.state.launch_at_login());
        assert_eq!(*h.login_items.calls.borrow(), vec![LoginItemCall::Register]);

        h.state.set_show_notifications(true);
        assert!(h.state.show_notifications());
        assert_eq!(h.notifications.requests.get(), 1);

        assert_eq!(
            *changes.borrow(),
            vec![
                Change::Enabled,
                Change::LaunchAtLogin,
                Change::ShowNotifications
            ]
        );
    }

    #[test]
    fn test_no_range_validation() {
        let mut h = Harness::new();
        h.state.set_detection_sensitivity(-3);
        h.state.set_base_font_size(500);
        assert_eq!(h.state.detection_sensitivity(), -3);
        assert_eq!(h.state.base_font_size(), 500);
    }

    #[test]
    fn test_listeners_hear_changes() {
        let mut h = Harness::new();
        let changes = record_changes(&mut h.state);

        h.state.set_enabled(false);
        h.state.set_base_font_size(12);
        h.state.record_conversion(Utc::now());

        assert_eq!(
            *changes.borrow(),
            vec![Change::Enabled, Change::BaseFontSize, Change::Conversions]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let mut h = Harness::new();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        let id = h.state.subscribe(move |change| sink.borrow_mut().push(change));

        h.state.set_enabled(false);
        h.state.unsubscribe(id);
        h.state.set_enabled(true);

        assert_eq!(*changes.borrow(), vec![Change::Enabled]);
    }

    #[test]
    fn test_record_conversion() {
        let mut h = Harness::new();
        let first = Utc::now() - Duration::minutes(3);
        let second = Utc::now();

        h.state.record_conversion(first);
        h.state.record_conversion(second);

        let stats = h.state.conversion_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.last_conversion, Some(second));
    }

    #[test]
    fn test_conversion_settings_follow_preferences() {
        let mut h = Harness::new();
        h.state.set_detection_sensitivity(3);
        h.state.set_include_rtf(false);
        h.state.set_base_font_size(16);

        assert_eq!(
            h.state.conversion_settings(),
            ConversionSettings {
                detection_sensitivity: 3,
                include_rtf: false,
                base_font_size: 16,
            }
        );
    }

    #[test]
    fn test_apply_routes_side_effects() {
        let mut h = Harness::new();
        h.state.apply(PreferenceEdit::LaunchAtLogin(true)).unwrap();
        h.state.apply(PreferenceEdit::ShowNotifications(true)).unwrap();
        h.state.apply(PreferenceEdit::DetectionSensitivity(1)).unwrap();

        assert_eq!(*h.login_items.calls.borrow(), vec![LoginItemCall::Register]);
        assert_eq!(h.notifications.requests.get(), 1);
        assert_eq!(h.state.detection_sensitivity(), 1);
    }

    #[test]
    fn test_apply_returns_login_item_error() {
        let mut h = Harness::new();
        h.login_items.fail.set(true);
        assert!(h.state.apply(PreferenceEdit::LaunchAtLogin(false)).is_err());
        assert!(h.state.apply(PreferenceEdit::Enabled(false)).is_ok());
    }

    #[test]
    fn test_reload_without_changes_is_quiet() {
        let mut h = Harness::new();
        let changes = record_changes(&mut h.state);
        assert!(h.state.reload_preferences().unwrap().is_empty());
        assert!(changes.borrow().is_empty());
    }
}
