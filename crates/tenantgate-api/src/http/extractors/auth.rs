//! Tenant session extractor.
//!
//! Resolves the session a request acts on from, in order:
//! - `X-Master-Key: <key>`: the system credential, resolving the first
//!   available session
//! - `Authorization: Bearer <token>` header
//! - `X-Token: <token>` header
//! - `?token=<token>` query parameter
//!
//! Unknown tokens are rejected without revealing whether any session exists.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;

use tenantgate_core::access::authorize_master;
use tenantgate_core::session::Session;

use crate::http::error::AppError;
use crate::state::AppState;

pub const MASTER_KEY_HEADER: &str = "x-master-key";
pub const TOKEN_HEADER: &str = "x-token";

/// The session resolved for this request.
pub struct TenantSession(pub Arc<Session>);

impl FromRequestParts<AppState> for TenantSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(presented) = header_value(parts, MASTER_KEY_HEADER)? {
            authorize_master(state.config.master_key.as_deref(), Some(&presented))?;
            let session = state.registry.resolve_first_available()?;
            tracing::debug!(token = %session.fingerprint(), "resolved by system credential");
            return Ok(TenantSession(session));
        }

        let token = extract_token(parts)?;
        Ok(TenantSession(state.registry.resolve(&token)?))
    }
}

fn header_value(parts: &Parts, name: &str) -> Result<Option<String>, AppError> {
    match parts.headers.get(name) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| AppError::Unauthorized(format!("Invalid {name} header encoding")))?;
            Ok(Some(value.trim().to_string()))
        }
        None => Ok(None),
    }
}

/// Extract the session token from headers or the query string.
fn extract_token(parts: &Parts) -> Result<String, AppError> {
    if let Some(auth) = header_value(parts, "authorization")? {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Ok(token.trim().to_string());
        }
    }

    if let Some(token) = header_value(parts, TOKEN_HEADER)? {
        return Ok(token);
    }

    if let Ok(Query(params)) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
        if let Some(token) = params.get("token") {
            return Ok(token.trim().to_string());
        }
    }

    Err(AppError::Unauthorized(
        "Missing token. Provide via 'Authorization: Bearer <token>', 'X-Token: <token>' or '?token='."
            .to_string(),
    ))
}
