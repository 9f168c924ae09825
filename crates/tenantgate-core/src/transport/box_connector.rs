//! BoxTransportConnector -- object-safe dynamic dispatch wrapper for TransportConnector.
//!
//! 1. Define an object-safe `TransportConnectorDyn` trait with boxed futures
//! 2. Blanket-impl `TransportConnectorDyn` for all `T: TransportConnector`
//! 3. `BoxTransportConnector` wraps `Box<dyn TransportConnectorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tenantgate_types::error::TransportError;
use tenantgate_types::session::Token;

use super::connector::{TransportConnector, TransportLink};
use crate::sink::EventSink;

type ConnectFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Box<dyn TransportLink>, TransportError>> + Send + 'a>>;

/// Object-safe version of [`TransportConnector`] with boxed futures.
pub trait TransportConnectorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn connect_boxed<'a>(&'a self, token: &'a Token, sink: Arc<dyn EventSink>) -> ConnectFuture<'a>;
}

impl<T: TransportConnector> TransportConnectorDyn for T {
    fn name(&self) -> &str {
        TransportConnector::name(self)
    }

    fn connect_boxed<'a>(&'a self, token: &'a Token, sink: Arc<dyn EventSink>) -> ConnectFuture<'a> {
        Box::pin(self.connect(token, sink))
    }
}

/// Type-erased transport connector selected at startup.
///
/// Since `TransportConnector` uses RPITIT, it cannot be used as a trait object
/// directly; sessions hold an `Arc<BoxTransportConnector>` instead.
pub struct BoxTransportConnector {
    inner: Box<dyn TransportConnectorDyn + Send + Sync>,
}

impl BoxTransportConnector {
    pub fn new<T: TransportConnector + 'static>(connector: T) -> Self {
        Self {
            inner: Box::new(connector),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn connect(
        &self,
        token: &Token,
        sink: Arc<dyn EventSink>,
    ) -> Result<Box<dyn TransportLink>, TransportError> {
        self.inner.connect_boxed(token, sink).await
    }
}

impl std::fmt::Debug for BoxTransportConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTransportConnector")
            .field("name", &self.name())
            .finish()
    }
}
