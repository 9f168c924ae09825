//! Application state wiring the registry, dispatcher and transport together.
//!
//! AppState holds the concrete instances shared by the HTTP handlers and the
//! `serve` command. The core is generic over transport and webhook sender
//! ports; AppState pins them to the infra implementations at boot and to test
//! doubles in tests.

use std::sync::Arc;
use std::time::Duration;

use tenantgate_core::registry::SessionRegistry;
use tenantgate_core::session::{Session, SessionOptions};
use tenantgate_core::transport::BoxTransportConnector;
use tenantgate_core::webhook::{BoxWebhookSender, WebhookDispatcher};
use tenantgate_infra::transport::LoopbackConnector;
use tenantgate_infra::webhook::HttpWebhookSender;
use tenantgate_types::config::{GatewayConfig, SessionConfig};
use tenantgate_types::error::RegistryError;
use tenantgate_types::session::Token;
use tracing::{info, warn};

/// Upper bound on draining webhook lanes at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Reason recorded on every session stopped by process shutdown.
pub const STOP_REASON_SHUTDOWN: &str = "shutdown";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub connector: Arc<BoxTransportConnector>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Wire state from explicit transport and sender implementations.
    pub fn new(
        config: GatewayConfig,
        connector: BoxTransportConnector,
        sender: BoxWebhookSender,
    ) -> Self {
        let dispatcher = WebhookDispatcher::from_config(sender, &config.webhook);
        Self {
            registry: Arc::new(SessionRegistry::new()),
            dispatcher: Arc::new(dispatcher),
            connector: Arc::new(connector),
            config: Arc::new(config),
        }
    }

    /// Wire the production stack: HTTP webhook delivery over the loopback
    /// transport.
    pub fn init(config: GatewayConfig) -> anyhow::Result<Self> {
        let sender = HttpWebhookSender::new(Duration::from_secs(config.webhook.request_timeout_secs))?;
        Ok(Self::new(
            config,
            BoxTransportConnector::new(LoopbackConnector::new()),
            BoxWebhookSender::new(sender),
        ))
    }

    fn session_options(&self, entry: &SessionConfig) -> SessionOptions {
        SessionOptions {
            cache_capacity: self.config.effective_cache_capacity(),
            start_timeout: self.config.start_timeout(),
            toggles: entry.toggles.apply(self.config.toggles),
        }
    }

    /// Create a session for `entry` and add it to the registry.
    pub fn provision(&self, entry: &SessionConfig) -> Result<Arc<Session>, RegistryError> {
        let session = Session::new(
            Token::new(entry.token.trim()),
            self.session_options(entry),
            Arc::clone(&self.connector),
            Arc::clone(&self.dispatcher),
        );
        for target in &entry.webhooks {
            session.add_webhook(target.clone());
        }
        self.registry.insert(Arc::clone(&session))?;
        Ok(session)
    }

    /// Provision every configured session, then start the `autostart` ones.
    ///
    /// A session that fails to start stays registered in `Failed` so its
    /// status can be queried. Returns the number of sessions provisioned.
    pub async fn provision_all(&self) -> Result<usize, RegistryError> {
        let mut autostart = Vec::new();
        for entry in &self.config.sessions {
            let session = self.provision(entry)?;
            if entry.autostart {
                autostart.push(session);
            }
        }

        let starts = autostart.iter().map(|session| async move {
            if let Err(e) = session.start().await {
                warn!(token = %session.fingerprint(), error = %e, "autostart failed");
            }
        });
        futures_util::future::join_all(starts).await;

        let count = self.registry.len();
        info!(count, autostarted = autostart.len(), "sessions provisioned");
        Ok(count)
    }

    /// Stop all sessions, then drain pending webhook deliveries.
    pub async fn shutdown(&self) {
        self.registry.stop_all(STOP_REASON_SHUTDOWN).await;
        if tokio::time::timeout(DRAIN_TIMEOUT, self.dispatcher.shutdown())
            .await
            .is_err()
        {
            warn!(timeout = ?DRAIN_TIMEOUT, "webhook lanes did not drain in time");
        }
    }
}
