//! GET /command?action=<verb> - Run one command against the session.

use axum::Json;
use axum::extract::Query;
use serde::Deserialize;

use tenantgate_core::command::{CommandDispatcher, CommandResponse};

use crate::http::error::AppError;
use crate::http::extractors::auth::TenantSession;
use crate::http::response::{ApiResponse, RequestClock};

#[derive(Debug, Deserialize, Default)]
pub struct CommandQuery {
    /// Missing is treated like an unknown verb.
    #[serde(default)]
    pub action: String,
}

pub async fn run_command(
    TenantSession(session): TenantSession,
    Query(query): Query<CommandQuery>,
) -> Result<Json<ApiResponse<CommandResponse>>, AppError> {
    let clock = RequestClock::start();
    let reply = CommandDispatcher::run(&session, &query.action).await?;
    tracing::debug!(
        request_id = clock.request_id(),
        token = %session.fingerprint(),
        action = %reply.action,
        "command handled"
    );
    Ok(clock.finish(reply))
}
