//! TransportConnector trait definition.

use std::sync::Arc;

use tenantgate_types::error::TransportError;
use tenantgate_types::session::Token;

use crate::sink::EventSink;

/// An established protocol connection owned by a session.
///
/// Dropping the link without calling `close` is allowed but leaves teardown
/// to the implementation's `Drop`.
pub trait TransportLink: Send + Sync {
    /// Tear the connection down. Must not call back into the sink.
    fn close(&self);
}

/// Factory for transport links.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Implementations
/// live in tenantgate-infra (e.g., `LoopbackConnector`).
pub trait TransportConnector: Send + Sync {
    /// Human-readable transport name (e.g., "loopback").
    fn name(&self) -> &str;

    /// Establish a link for `token`, delivering its events into `sink`.
    ///
    /// The caller enforces the start timeout and may drop the future at any
    /// point to cancel the attempt.
    fn connect(
        &self,
        token: &Token,
        sink: Arc<dyn EventSink>,
    ) -> impl std::future::Future<Output = Result<Box<dyn TransportLink>, TransportError>> + Send;
}
