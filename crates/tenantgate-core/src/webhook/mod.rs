//! Webhook fan-out: per-endpoint ordered delivery with bounded retry.

pub mod dispatcher;
pub mod retry;
pub mod sender;

pub use dispatcher::{DispatcherStats, WebhookDispatcher};
pub use retry::RetryPolicy;
pub use sender::{BoxWebhookSender, WebhookSender};
