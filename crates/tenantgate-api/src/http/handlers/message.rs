//! Cached message retrieval.
//!
//! GET /message/{id} - One message by id.
//! GET /message      - The leading (most recently inserted or updated)
//!                     message, `null` when the cache is empty.

use axum::Json;
use axum::extract::Path;

use tenantgate_types::message::Message;

use crate::http::error::AppError;
use crate::http::extractors::auth::TenantSession;
use crate::http::response::{ApiResponse, RequestClock};

pub async fn get_message(
    TenantSession(session): TenantSession,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Message>>, AppError> {
    let clock = RequestClock::start();
    let message = session.cache().get(&id)?;
    Ok(clock.finish(message))
}

pub async fn get_leading(
    TenantSession(session): TenantSession,
) -> Result<Json<ApiResponse<Option<Message>>>, AppError> {
    let clock = RequestClock::start();
    Ok(clock.finish(session.cache().leading()))
}
