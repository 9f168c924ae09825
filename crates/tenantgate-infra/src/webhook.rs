//! HttpWebhookSender -- concrete [`WebhookSender`] posting JSON over HTTP.
//!
//! One call is one attempt. Any 2xx response is success, any other status is
//! `Rejected` (the dispatcher decides what is permanent), and transport-level
//! errors (connect, timeout, reset) are `Unavailable`.
//!
//! When the target carries a secret the raw body is signed with HMAC-SHA256
//! and sent as `X-Tenantgate-Signature: sha256=<hex>`.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use tenantgate_core::webhook::WebhookSender;
use tenantgate_types::error::DeliveryError;
use tenantgate_types::webhook::{WebhookPayload, WebhookTarget};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Tenantgate-Signature";

/// Header carrying the event kind.
pub const EVENT_HEADER: &str = "X-Tenantgate-Event";

/// Webhook sender backed by a shared `reqwest::Client`.
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    /// Build a sender whose requests time out after `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("tenantgate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

/// Compute the `sha256=<hex>` signature of `body` under `secret`.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> Result<String, DeliveryError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| DeliveryError::Encoding(format!("invalid signing key: {e}")))?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    Ok(format!("sha256={hex}"))
}

impl WebhookSender for HttpWebhookSender {
    async fn send(
        &self,
        target: &WebhookTarget,
        payload: &WebhookPayload,
    ) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| DeliveryError::Encoding(format!("failed to serialize payload: {e}")))?;

        let mut request = self
            .client
            .post(&target.url)
            .header("content-type", "application/json")
            .header(EVENT_HEADER, payload.event.to_string());
        if let Some(secret) = target.secret.as_deref() {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret.as_bytes(), &body)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Unavailable(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
