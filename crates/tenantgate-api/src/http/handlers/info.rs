//! GET /info - Status snapshot of the resolved session.

use axum::Json;

use tenantgate_core::session::SessionInfo;

use crate::http::error::AppError;
use crate::http::extractors::auth::TenantSession;
use crate::http::response::{ApiResponse, RequestClock};

pub async fn get_info(
    TenantSession(session): TenantSession,
) -> Result<Json<ApiResponse<SessionInfo>>, AppError> {
    let clock = RequestClock::start();
    Ok(clock.finish(session.info()))
}
