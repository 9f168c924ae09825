use std::time::Duration;

use thiserror::Error;

/// Errors from session registry lookups.
///
/// Deliberately coarse: an unknown token and a malformed token are the same
/// `NotFound` so callers cannot probe registry contents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session not found")]
    NotFound,

    #[error("token is already provisioned")]
    AlreadyProvisioned,

    #[error("token must not be empty")]
    EmptyToken,
}

/// Errors from message cache lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("message '{0}' not found")]
    NotFound(String),
}

/// Errors from toggle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToggleError {
    #[error("unknown toggle: '{0}'")]
    Unknown(String),
}

/// Errors reported by a transport connector while establishing a link.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("account is not paired: {0}")]
    Unpaired(String),

    #[error("transport closed")]
    Closed,
}

/// Errors from session lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("start failed: {0}")]
    TransportFailure(#[from] TransportError),

    #[error("start timed out after {0:?}")]
    Timeout(Duration),

    #[error("start was cancelled by a stop request")]
    Cancelled,
}

/// Errors from the command surface.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(
        "invalid action: {{{0}}}, try {{start,stop,restart,status,groups,broadcasts,readreceipts,calls}}"
    )]
    InvalidAction(String),

    #[error(transparent)]
    Toggle(#[from] ToggleError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors from a single webhook delivery attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("endpoint rejected delivery with status {status}")]
    Rejected { status: u16 },

    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("payload encoding failed: {0}")]
    Encoding(String),
}

impl DeliveryError {
    /// Whether retrying the same payload can never succeed.
    ///
    /// 4xx rejections (except 408 and 429) and encoding failures are permanent.
    pub fn is_permanent(&self) -> bool {
        match self {
            DeliveryError::Rejected { status } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            DeliveryError::Unavailable(_) => false,
            DeliveryError::Encoding(_) => true,
        }
    }
}

/// Errors from the privileged system-credential path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("server is not allowed to use this method")]
    Disabled,

    #[error("invalid system credential")]
    Forbidden,

    #[error("missing credential")]
    Missing,
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
