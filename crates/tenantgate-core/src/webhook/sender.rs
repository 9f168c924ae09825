//! WebhookSender trait and its object-safe wrapper.
//!
//! A sender performs exactly one delivery attempt; retry and ordering are
//! the dispatcher's job. The HTTP implementation lives in tenantgate-infra.

use std::future::Future;
use std::pin::Pin;

use tenantgate_types::error::DeliveryError;
use tenantgate_types::webhook::{WebhookPayload, WebhookTarget};

/// One-shot delivery of a payload to a webhook endpoint.
pub trait WebhookSender: Send + Sync {
    fn send(
        &self,
        target: &WebhookTarget,
        payload: &WebhookPayload,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;

/// Object-safe version of [`WebhookSender`] with boxed futures.
pub trait WebhookSenderDyn: Send + Sync {
    fn send_boxed<'a>(
        &'a self,
        target: &'a WebhookTarget,
        payload: &'a WebhookPayload,
    ) -> SendFuture<'a>;
}

impl<T: WebhookSender> WebhookSenderDyn for T {
    fn send_boxed<'a>(
        &'a self,
        target: &'a WebhookTarget,
        payload: &'a WebhookPayload,
    ) -> SendFuture<'a> {
        Box::pin(self.send(target, payload))
    }
}

/// Type-erased webhook sender shared by all dispatcher lanes.
pub struct BoxWebhookSender {
    inner: Box<dyn WebhookSenderDyn + Send + Sync>,
}

impl BoxWebhookSender {
    pub fn new<T: WebhookSender + 'static>(sender: T) -> Self {
        Self {
            inner: Box::new(sender),
        }
    }

    pub async fn send(
        &self,
        target: &WebhookTarget,
        payload: &WebhookPayload,
    ) -> Result<(), DeliveryError> {
        self.inner.send_boxed(target, payload).await
    }
}
