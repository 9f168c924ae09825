//! Webhook target and payload types.
//!
//! A session forwards qualifying events to each of its registered
//! `WebhookTarget`s. The wire body of every delivery is a `WebhookPayload`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::message::Message;
use crate::session::{SessionStatusReport, Token, TokenFingerprint};

/// An external endpoint registered to receive a session's events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub url: String,
    /// Caller-supplied correlation id echoed in every payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    /// Arbitrary JSON echoed in every payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
    /// Shared secret for the `X-Tenantgate-Signature` header. Never serialized.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
}

impl WebhookTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            track_id: None,
            extra: None,
            secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

/// Type of event carried by a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookEventKind {
    Message,
    Status,
    Receipt,
    Connected,
    Disconnected,
    LoggedOut,
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookEventKind::Message => write!(f, "message"),
            WebhookEventKind::Status => write!(f, "status"),
            WebhookEventKind::Receipt => write!(f, "receipt"),
            WebhookEventKind::Connected => write!(f, "connected"),
            WebhookEventKind::Disconnected => write!(f, "disconnected"),
            WebhookEventKind::LoggedOut => write!(f, "logged-out"),
        }
    }
}

/// An event produced by a session, before it is addressed to any target.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub kind: WebhookEventKind,
    pub message: Option<Message>,
    pub state: Option<SessionStatusReport>,
    pub reason: Option<String>,
}

impl WebhookEvent {
    pub fn message(message: Message) -> Self {
        Self::with_message(WebhookEventKind::Message, message)
    }

    pub fn status(message: Message) -> Self {
        Self::with_message(WebhookEventKind::Status, message)
    }

    pub fn receipt(message: Message) -> Self {
        Self::with_message(WebhookEventKind::Receipt, message)
    }

    fn with_message(kind: WebhookEventKind, message: Message) -> Self {
        Self {
            kind,
            message: Some(message),
            state: None,
            reason: None,
        }
    }

    /// A connection event (`Connected`, `Disconnected`, `LoggedOut`) with a
    /// state snapshot.
    pub fn lifecycle(
        kind: WebhookEventKind,
        state: SessionStatusReport,
        reason: Option<String>,
    ) -> Self {
        Self {
            kind,
            message: None,
            state: Some(state),
            reason,
        }
    }

    /// Address this event to `target`, stamping the delivery time.
    pub fn to_payload(&self, token: &Token, target: &WebhookTarget) -> WebhookPayload {
        WebhookPayload {
            event: self.kind,
            token: token.as_str().to_string(),
            message: self.message.clone(),
            state: self.state.clone(),
            reason: self.reason.clone(),
            track_id: target.track_id.clone(),
            extra: target.extra.clone(),
            delivered_at: Utc::now(),
        }
    }
}

/// JSON body posted to a webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: WebhookEventKind,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionStatusReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
    pub delivered_at: DateTime<Utc>,
}

/// Record of a delivery that was given up on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryFailure {
    pub token: TokenFingerprint,
    pub url: String,
    pub event: WebhookEventKind,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}
