//! LoopbackConnector -- in-process [`TransportConnector`] for local runs.
//!
//! Connecting always succeeds and registers the session's sink with a
//! shared hub. Events are then injected through the connector itself
//! (`inject_message`, `inject_status`, ...) instead of arriving from a real
//! messaging network. Closing the link unregisters the sink.

use std::sync::Arc;

use dashmap::DashMap;
use tenantgate_core::sink::EventSink;
use tenantgate_core::transport::{TransportConnector, TransportLink};
use tenantgate_types::error::TransportError;
use tenantgate_types::message::{Message, MessageStatus};
use tenantgate_types::session::Token;

/// Shared table of live loopback links, token -> sink.
type Hub = Arc<DashMap<Token, Arc<dyn EventSink>>>;

#[derive(Clone, Default)]
pub struct LoopbackConnector {
    hub: Hub,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self, token: &str) -> bool {
        self.hub.contains_key(token)
    }

    fn sink(&self, token: &str) -> Option<Arc<dyn EventSink>> {
        self.hub.get(token).map(|entry| Arc::clone(entry.value()))
    }

    /// Deliver `message` as if it had arrived from the network.
    /// Returns `false` when the token has no live link.
    pub fn inject_message(&self, token: &str, message: Message) -> bool {
        match self.sink(token) {
            Some(sink) => {
                sink.message(message);
                true
            }
            None => false,
        }
    }

    /// Returns whether the status update was applied.
    pub fn inject_status(&self, token: &str, id: &str, status: MessageStatus) -> bool {
        self.sink(token)
            .map(|sink| sink.message_status_update(id, status))
            .unwrap_or(false)
    }

    pub fn inject_receipt(&self, token: &str, message: Message) -> bool {
        match self.sink(token) {
            Some(sink) => {
                sink.receipt(message);
                true
            }
            None => false,
        }
    }

    /// Simulate a remote logout. The link is dropped from the hub.
    pub fn inject_logout(&self, token: &str, reason: &str) -> bool {
        match self.hub.remove(token) {
            Some((_, sink)) => {
                sink.logged_out(reason);
                true
            }
            None => false,
        }
    }
}

impl TransportConnector for LoopbackConnector {
    fn name(&self) -> &str {
        "loopback"
    }

    async fn connect(
        &self,
        token: &Token,
        sink: Arc<dyn EventSink>,
    ) -> Result<Box<dyn TransportLink>, TransportError> {
        if token.is_empty() {
            return Err(TransportError::Unpaired("empty token".to_string()));
        }
        self.hub.insert(token.clone(), sink);
        tracing::debug!(token = %token.fingerprint(), "loopback link opened");
        Ok(Box::new(LoopbackLink {
            token: token.clone(),
            hub: Arc::clone(&self.hub),
        }))
    }
}

struct LoopbackLink {
    token: Token,
    hub: Hub,
}

impl TransportLink for LoopbackLink {
    fn close(&self) {
        if self.hub.remove(&self.token).is_some() {
            tracing::debug!(token = %self.token.fingerprint(), "loopback link closed");
        }
    }
}
