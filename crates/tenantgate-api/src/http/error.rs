//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tenantgate_types::error::{AccessError, CacheError, CommandError, RegistryError, SessionError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Token resolution failures.
    Registry(RegistryError),
    /// System-credential failures.
    Access(AccessError),
    /// Command verb failures.
    Command(CommandError),
    /// Message lookups.
    Cache(CacheError),
    /// Authentication failure before any lookup.
    Unauthorized(String),
    /// Validation error.
    Validation(String),
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        AppError::Registry(e)
    }
}

impl From<AccessError> for AppError {
    fn from(e: AccessError) -> Self {
        AppError::Access(e)
    }
}

impl From<CommandError> for AppError {
    fn from(e: CommandError) -> Self {
        AppError::Command(e)
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Cache(e)
    }
}

impl AppError {
    /// Status code, machine-readable code and message for the envelope.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Registry(RegistryError::NotFound) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "invalid token".to_string(),
            ),
            AppError::Registry(e) => (StatusCode::CONFLICT, "CONFLICT", e.to_string()),
            AppError::Access(e @ AccessError::Missing) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", e.to_string())
            }
            AppError::Access(e) => (StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string()),
            AppError::Command(e @ (CommandError::InvalidAction(_) | CommandError::Toggle(_))) => {
                (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", e.to_string())
            }
            AppError::Command(CommandError::Session(e @ SessionError::Cancelled)) => {
                (StatusCode::CONFLICT, "START_CANCELLED", e.to_string())
            }
            AppError::Command(CommandError::Session(e @ SessionError::Timeout(_))) => {
                (StatusCode::GATEWAY_TIMEOUT, "START_TIMEOUT", e.to_string())
            }
            AppError::Command(CommandError::Session(e)) => {
                (StatusCode::BAD_GATEWAY, "TRANSPORT_FAILURE", e.to_string())
            }
            AppError::Cache(e) => (StatusCode::NOT_FOUND, "MESSAGE_NOT_FOUND", e.to_string()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tenantgate_types::error::{ToggleError, TransportError};

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        let err: AppError = err.into();
        err.parts().0
    }

    #[test]
    fn unknown_token_does_not_say_not_found() {
        let (status, _, message) = AppError::from(RegistryError::NotFound).parts();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "invalid token");
    }

    #[test]
    fn access_errors_map_to_auth_statuses() {
        assert_eq!(status_of(AccessError::Disabled), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AccessError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AccessError::Missing), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn command_errors_map_by_cause() {
        assert_eq!(
            status_of(CommandError::InvalidAction("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CommandError::Toggle(ToggleError::Unknown("x".to_string()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CommandError::Session(SessionError::TransportFailure(
                TransportError::Closed
            ))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(CommandError::Session(SessionError::Timeout(Duration::from_secs(1)))),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn missing_message_is_not_found() {
        assert_eq!(
            status_of(CacheError::NotFound("m1".to_string())),
            StatusCode::NOT_FOUND
        );
    }
}
