//! Webhook target management for the resolved session.
//!
//! POST   /webhook           - Register a target (upsert by url).
//! GET    /webhook           - List targets. Secrets are never returned.
//! DELETE /webhook?url=<url> - Remove one target, or all when `url` is absent.

use axum::Json;
use axum::extract::Query;
use serde::{Deserialize, Serialize};

use tenantgate_types::webhook::WebhookTarget;

use crate::http::error::AppError;
use crate::http::extractors::auth::TenantSession;
use crate::http::response::{ApiResponse, RequestClock};

#[derive(Debug, Serialize)]
pub struct WebhookChange {
    /// Whether the target was new (POST) or existed (DELETE).
    pub changed: usize,
    pub webhooks: Vec<WebhookTarget>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RemoveQuery {
    pub url: Option<String>,
}

pub async fn add_webhook(
    TenantSession(session): TenantSession,
    Json(target): Json<WebhookTarget>,
) -> Result<Json<ApiResponse<WebhookChange>>, AppError> {
    let clock = RequestClock::start();
    let url = target.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::Validation(format!(
            "webhook url must be http(s): '{url}'"
        )));
    }
    let target = WebhookTarget {
        url: url.to_string(),
        ..target
    };

    let created = session.add_webhook(target);
    Ok(clock.finish(WebhookChange {
        changed: usize::from(created),
        webhooks: session.webhooks(),
    }))
}

pub async fn list_webhooks(
    TenantSession(session): TenantSession,
) -> Result<Json<ApiResponse<Vec<WebhookTarget>>>, AppError> {
    let clock = RequestClock::start();
    Ok(clock.finish(session.webhooks()))
}

pub async fn remove_webhooks(
    TenantSession(session): TenantSession,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<ApiResponse<WebhookChange>>, AppError> {
    let clock = RequestClock::start();
    let changed = match query.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => usize::from(session.remove_webhook(url)),
        _ => session.clear_webhooks(),
    };
    Ok(clock.finish(WebhookChange {
        changed,
        webhooks: session.webhooks(),
    }))
}
