//! Session: one tenant's messaging connection.
//!
//! A session combines a transport link, a [`MessageCache`], a [`ToggleSet`],
//! its webhook targets and a lifecycle state. Lifecycle operations
//! (`start`/`stop`/`restart`, see [`lifecycle`]) are serialized by one async
//! mutex per session. `status` and all ingestion paths (see [`events`]) only
//! touch short synchronous sections and never wait on a lifecycle operation.

pub mod events;
pub mod lifecycle;

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tenantgate_types::session::{SessionState, SessionStatusReport, Token, TokenFingerprint};
use tenantgate_types::toggle::ToggleValues;
use tenantgate_types::webhook::{WebhookEvent, WebhookTarget};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::MessageCache;
use crate::toggle::ToggleSet;
use crate::transport::{BoxTransportConnector, TransportLink};
use crate::webhook::WebhookDispatcher;

pub use lifecycle::{StartOutcome, StopOutcome};

/// Per-session settings resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub cache_capacity: usize,
    /// Window for a start attempt to reach `Connected`.
    pub start_timeout: Duration,
    pub toggles: ToggleValues,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            start_timeout: Duration::from_secs(30),
            toggles: ToggleValues::default(),
        }
    }
}

/// Lifecycle bookkeeping read by `status`.
#[derive(Debug, Clone)]
struct StatusCell {
    state: SessionState,
    last_failure: Option<String>,
    last_stop_reason: Option<String>,
    changed_at: DateTime<Utc>,
}

/// State guarded by the lifecycle mutex.
#[derive(Default)]
struct Lifecycle {
    link: Option<Box<dyn TransportLink>>,
}

/// Read-only snapshot served by the info endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub token: TokenFingerprint,
    #[serde(flatten)]
    pub status: SessionStatusReport,
    pub toggles: ToggleValues,
    pub cached_messages: usize,
    pub cache_capacity: usize,
    pub webhooks: usize,
    pub transport: String,
}

pub struct Session {
    token: Token,
    fingerprint: TokenFingerprint,
    status: Mutex<StatusCell>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    /// Cancels the in-flight start attempt, if any.
    pending_start: Mutex<Option<CancellationToken>>,
    /// Bumped on every connect attempt so events from a replaced link can be told apart.
    link_generation: AtomicU64,
    toggles: ToggleSet,
    cache: MessageCache,
    webhooks: RwLock<Vec<WebhookTarget>>,
    connector: Arc<BoxTransportConnector>,
    dispatcher: Arc<WebhookDispatcher>,
    start_timeout: Duration,
    /// Handed to the transport as its event sink.
    this: Weak<Session>,
}

impl Session {
    pub fn new(
        token: Token,
        options: SessionOptions,
        connector: Arc<BoxTransportConnector>,
        dispatcher: Arc<WebhookDispatcher>,
    ) -> Arc<Self> {
        let fingerprint = token.fingerprint();
        Arc::new_cyclic(|this| Self {
            token,
            fingerprint,
            status: Mutex::new(StatusCell {
                state: SessionState::Stopped,
                last_failure: None,
                last_stop_reason: None,
                changed_at: Utc::now(),
            }),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::default()),
            pending_start: Mutex::new(None),
            link_generation: AtomicU64::new(0),
            toggles: ToggleSet::new(options.toggles),
            cache: MessageCache::new(options.cache_capacity),
            webhooks: RwLock::new(Vec::new()),
            connector,
            dispatcher,
            start_timeout: options.start_timeout,
            this: this.clone(),
        })
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn fingerprint(&self) -> &TokenFingerprint {
        &self.fingerprint
    }

    pub fn toggles(&self) -> &ToggleSet {
        &self.toggles
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.status_cell().state
    }

    /// Current state plus the recorded failure cause. Never waits on a
    /// lifecycle operation in progress.
    pub fn status(&self) -> SessionStatusReport {
        let cell = self.status_cell();
        SessionStatusReport {
            state: cell.state,
            last_failure: cell.last_failure.clone(),
            last_stop_reason: cell.last_stop_reason.clone(),
            changed_at: cell.changed_at,
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            token: self.fingerprint.clone(),
            status: self.status(),
            toggles: self.toggles.snapshot(),
            cached_messages: self.cache.len(),
            cache_capacity: self.cache.capacity(),
            webhooks: self.read_webhooks().len(),
            transport: self.connector.name().to_string(),
        }
    }

    fn status_cell(&self) -> std::sync::MutexGuard<'_, StatusCell> {
        self.status.lock().expect("session status lock poisoned")
    }

    /// Unconditionally move to `to`. `failure` is kept only for `Failed`.
    fn set_state(&self, to: SessionState, failure: Option<String>) {
        let mut cell = self.status_cell();
        let from = cell.state;
        cell.state = to;
        cell.last_failure = if to == SessionState::Failed { failure } else { None };
        cell.changed_at = Utc::now();
        drop(cell);
        info!(token = %self.fingerprint, %from, %to, "session state changed");
    }

    /// Move from `from` to `to` only if the session is currently in `from`.
    fn compare_and_set_state(&self, from: SessionState, to: SessionState) -> bool {
        let mut cell = self.status_cell();
        if cell.state != from {
            return false;
        }
        cell.state = to;
        cell.last_failure = None;
        cell.changed_at = Utc::now();
        drop(cell);
        info!(token = %self.fingerprint, %from, %to, "session state changed by transport");
        true
    }

    fn record_stop_reason(&self, reason: &str) {
        self.status_cell().last_stop_reason = Some(reason.to_string());
    }

    // -----------------------------------------------------------------------
    // Webhook targets
    // -----------------------------------------------------------------------

    /// Register `target`, replacing any existing target with the same URL.
    ///
    /// Returns `true` if the URL was not registered before.
    pub fn add_webhook(&self, target: WebhookTarget) -> bool {
        let mut webhooks = self.write_webhooks();
        match webhooks.iter_mut().find(|existing| existing.url == target.url) {
            Some(existing) => {
                *existing = target;
                false
            }
            None => {
                info!(token = %self.fingerprint, url = %target.url, "webhook registered");
                webhooks.push(target);
                true
            }
        }
    }

    /// Unregister the target with `url`. Payloads already queued for it are
    /// still delivered.
    pub fn remove_webhook(&self, url: &str) -> bool {
        let removed = {
            let mut webhooks = self.write_webhooks();
            let before = webhooks.len();
            webhooks.retain(|target| target.url != url);
            webhooks.len() != before
        };
        if removed {
            self.dispatcher.retire(&self.token, url);
            info!(token = %self.fingerprint, url, "webhook removed");
        }
        removed
    }

    /// Unregister every target. Returns how many were removed.
    pub fn clear_webhooks(&self) -> usize {
        let removed = std::mem::take(&mut *self.write_webhooks()).len();
        if removed > 0 {
            self.dispatcher.retire_session(&self.token);
            info!(token = %self.fingerprint, removed, "webhooks cleared");
        }
        removed
    }

    /// Close every delivery lane of this session, keeping the registered
    /// targets. Queued payloads are still delivered.
    pub fn retire_webhook_lanes(&self) -> usize {
        self.dispatcher.retire_session(&self.token)
    }

    pub fn webhooks(&self) -> Vec<WebhookTarget> {
        self.read_webhooks().clone()
    }

    fn read_webhooks(&self) -> std::sync::RwLockReadGuard<'_, Vec<WebhookTarget>> {
        self.webhooks.read().expect("session webhook lock poisoned")
    }

    fn write_webhooks(&self) -> std::sync::RwLockWriteGuard<'_, Vec<WebhookTarget>> {
        self.webhooks.write().expect("session webhook lock poisoned")
    }

    /// Hand `event` to the dispatcher for every registered target.
    fn emit(&self, event: WebhookEvent) {
        let targets = self.webhooks();
        if targets.is_empty() {
            return;
        }
        self.dispatcher.dispatch(&self.token, &event, &targets);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;

    #[test]
    fn new_session_is_stopped_with_defaults() {
        let fx = fixture("tenant-a");
        let status = fx.session.status();
        assert_eq!(status.state, SessionState::Stopped);
        assert!(status.last_failure.is_none());
        assert!(fx.session.cache().is_empty());
        assert!(fx.session.toggles().snapshot().groups);
    }

    #[test]
    fn add_webhook_upserts_by_url() {
        let fx = fixture("tenant-a");
        assert_eq!(fx.session.webhooks().len(), 1);

        let mut replacement = WebhookTarget::new("https://hooks.example.com/in");
        replacement.track_id = Some("crm".to_string());
        assert!(!fx.session.add_webhook(replacement));
        assert_eq!(fx.session.webhooks().len(), 1);
        assert_eq!(fx.session.webhooks()[0].track_id.as_deref(), Some("crm"));

        assert!(fx.session.add_webhook(WebhookTarget::new("https://other.example.com")));
        assert_eq!(fx.session.webhooks().len(), 2);
    }

    #[test]
    fn remove_and_clear_webhooks() {
        let fx = fixture("tenant-a");
        fx.session.add_webhook(WebhookTarget::new("https://b.example.com"));

        assert!(fx.session.remove_webhook("https://b.example.com"));
        assert!(!fx.session.remove_webhook("https://b.example.com"));
        assert_eq!(fx.session.clear_webhooks(), 1);
        assert!(fx.session.webhooks().is_empty());
    }

    #[tokio::test]
    async fn removing_a_webhook_retires_its_lane() {
        let fx = fixture("tenant-a");
        fx.session.start().await.unwrap();
        assert_eq!(fx.dispatcher.stats().lanes, 1);

        assert!(fx.session.remove_webhook("https://hooks.example.com/in"));
        assert_eq!(fx.dispatcher.stats().lanes, 0);
    }

    #[test]
    fn info_reports_snapshot() {
        let fx = fixture("tenant-a");
        let info = fx.session.info();
        assert_eq!(info.token, Token::new("tenant-a").fingerprint());
        assert_eq!(info.webhooks, 1);
        assert_eq!(info.cache_capacity, 16);
        assert_eq!(info.transport, "scripted");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["state"], "stopped");
        assert!(!json.to_string().contains("tenant-a"));
    }
}
