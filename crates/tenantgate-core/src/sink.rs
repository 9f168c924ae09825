//! EventSink trait: the contract through which a transport delivers events.
//!
//! A transport holds an `Arc<dyn EventSink>` for the lifetime of its link
//! and calls into it at most once per logical event. Calls may arrive
//! concurrently, from any thread, and in any order across event types.
//! A tokio runtime context is not required. Every method is
//! synchronous and must return quickly: implementations enqueue any network
//! work instead of performing it inline.

use tenantgate_types::error::CacheError;
use tenantgate_types::message::{Message, MessageStatus};

/// Receiver of transport events for one session.
pub trait EventSink: Send + Sync {
    /// A new inbound or outbound message was observed.
    fn message(&self, message: Message);

    /// Delivery status changed for message `id`.
    ///
    /// Returns `true` if the update was applied. Unknown ids and backward
    /// moves return `false`; neither is an error.
    fn message_status_update(&self, id: &str, status: MessageStatus) -> bool;

    /// A read receipt arrived. `message` carries the id and the new status.
    fn receipt(&self, message: Message);

    /// The account was logged out remotely. The link is unusable afterwards.
    fn logged_out(&self, reason: &str);

    /// The most recently inserted or updated message, or `None` when no
    /// message has been seen yet.
    fn get_leading(&self) -> Option<Message>;

    fn get_by_id(&self, id: &str) -> Result<Message, CacheError>;

    /// The transport (re)established its link.
    fn on_connected(&self);

    /// The transport lost its link without being asked to stop.
    fn on_disconnected(&self);
}
