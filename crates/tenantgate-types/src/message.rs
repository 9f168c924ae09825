//! Chat message types observed by a session.
//!
//! A `Message` is one inbound or outbound chat event as delivered by the
//! transport. Delivery status only moves forward:
//! `Pending -> Sent -> Delivered -> Read`, with `Failed` reachable from any
//! non-terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Delivery/read status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Position in the forward progression. `Failed` sits outside it.
    fn rank(self) -> Option<u8> {
        match self {
            MessageStatus::Pending => Some(0),
            MessageStatus::Sent => Some(1),
            MessageStatus::Delivered => Some(2),
            MessageStatus::Read => Some(3),
            MessageStatus::Failed => None,
        }
    }

    /// `Read` and `Failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Read | MessageStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the monotonic order.
    ///
    /// Same-status updates are not transitions and return `false`.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target > current,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Delivered => write!(f, "delivered"),
            MessageStatus::Read => write!(f, "read"),
            MessageStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MessageStatus::Pending),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(format!("invalid message status: '{other}'")),
        }
    }
}

/// Whether the message was received by or sent from the tenant's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Payload category of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Media,
    /// Incoming or missed call notification.
    Call,
    System,
}

/// Conversation category, derived from the chat id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
    Broadcast,
}

impl ChatKind {
    /// Suffix the protocol uses for group chat ids.
    pub const GROUP_SUFFIX: &'static str = "@g.us";
    /// Suffix the protocol uses for broadcast lists and status updates.
    pub const BROADCAST_SUFFIX: &'static str = "@broadcast";

    /// Classify a chat id by its server suffix.
    pub fn classify(chat_id: &str) -> Self {
        if chat_id.ends_with(Self::GROUP_SUFFIX) {
            ChatKind::Group
        } else if chat_id.ends_with(Self::BROADCAST_SUFFIX) {
            ChatKind::Broadcast
        } else {
            ChatKind::Direct
        }
    }
}

/// One chat event held in a session's message cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Protocol-assigned id, unique within a session.
    pub id: String,
    /// Conversation or contact identifier.
    pub chat_id: String,
    /// Participant that authored the message (group chats), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub kind: MessageKind,
    pub status: MessageStatus,
    pub direction: MessageDirection,
    /// Event time used for ordering.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// A freshly received inbound text message.
    pub fn inbound(id: impl Into<String>, chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            chat_id: chat_id.into(),
            sender: None,
            text: Some(text.into()),
            kind: MessageKind::Text,
            status: MessageStatus::Delivered,
            direction: MessageDirection::Inbound,
            timestamp: Utc::now(),
        }
    }

    /// An outbound message that has not yet been acknowledged by the server.
    pub fn outbound(id: impl Into<String>, chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            chat_id: chat_id.into(),
            sender: None,
            text: Some(text.into()),
            kind: MessageKind::Text,
            status: MessageStatus::Pending,
            direction: MessageDirection::Outbound,
            timestamp: Utc::now(),
        }
    }

    /// Set the message kind (builder style).
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the status (builder style).
    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    /// Conversation category of this message's chat.
    pub fn chat_kind(&self) -> ChatKind {
        ChatKind::classify(&self.chat_id)
    }
}
