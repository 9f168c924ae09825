//! EventSink implementation: transport events flowing into a session.
//!
//! Every message is cached. Forwarding to webhooks is gated by the toggles:
//! group chats by `groups`, broadcast lists by `broadcasts`, call
//! notifications by `calls`. Read receipts are dropped entirely while
//! `readreceipts` is off.

use tenantgate_types::error::CacheError;
use tenantgate_types::message::{ChatKind, Message, MessageKind, MessageStatus};
use tenantgate_types::session::SessionState;
use tenantgate_types::toggle::ToggleName;
use tenantgate_types::webhook::{WebhookEvent, WebhookEventKind};
use tracing::{debug, warn};

use super::Session;
use crate::sink::EventSink;

impl Session {
    /// Whether toggles allow `message` to reach the webhooks.
    fn should_forward(&self, message: &Message) -> bool {
        if message.kind == MessageKind::Call && !self.toggles.is_enabled(ToggleName::Calls) {
            return false;
        }
        match message.chat_kind() {
            ChatKind::Group => self.toggles.is_enabled(ToggleName::Groups),
            ChatKind::Broadcast => self.toggles.is_enabled(ToggleName::Broadcasts),
            ChatKind::Direct => true,
        }
    }
}

impl EventSink for Session {
    fn message(&self, message: Message) {
        let forward = self.should_forward(&message);
        if forward {
            self.cache.upsert(message.clone());
            self.emit(WebhookEvent::message(message));
        } else {
            debug!(
                token = %self.fingerprint,
                message_id = %message.id,
                "message cached, forwarding suppressed by toggle"
            );
            self.cache.upsert(message);
        }
    }

    fn message_status_update(&self, id: &str, status: MessageStatus) -> bool {
        match self.cache.update_status(id, status) {
            Some(updated) => {
                if self.should_forward(&updated) {
                    self.emit(WebhookEvent::status(updated));
                }
                true
            }
            None => {
                debug!(token = %self.fingerprint, message_id = id, %status, "status update not applied");
                false
            }
        }
    }

    fn receipt(&self, message: Message) {
        if !self.toggles.is_enabled(ToggleName::ReadReceipts) {
            debug!(token = %self.fingerprint, message_id = %message.id, "read receipt ignored");
            return;
        }
        if let Some(updated) = self.cache.update_status(&message.id, message.status) {
            if self.should_forward(&updated) {
                self.emit(WebhookEvent::receipt(updated));
            }
        }
    }

    fn logged_out(&self, reason: &str) {
        let Some(session) = self.this.upgrade() else {
            return;
        };
        let generation = self.link_generation();
        let reason = reason.to_string();
        match self.dispatcher.runtime() {
            Some(runtime) => {
                runtime.spawn(async move { session.handle_logged_out(generation, reason).await });
            }
            None => {
                warn!(token = %self.fingerprint, "no async runtime, logout not handled");
            }
        }
    }

    fn get_leading(&self) -> Option<Message> {
        self.cache.leading()
    }

    fn get_by_id(&self, id: &str) -> Result<Message, CacheError> {
        self.cache.get(id)
    }

    fn on_connected(&self) {
        if self.compare_and_set_state(SessionState::Disconnected, SessionState::Connected) {
            self.emit_lifecycle(WebhookEventKind::Connected, None);
        }
    }

    fn on_disconnected(&self) {
        if self.compare_and_set_state(SessionState::Connected, SessionState::Disconnected) {
            self.emit_lifecycle(WebhookEventKind::Disconnected, None);
        }
    }
}
