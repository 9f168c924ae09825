//! Session identity and lifecycle state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Opaque tenant credential identifying exactly one session.
///
/// `Debug` prints a fingerprint instead of the raw value so tokens never end
/// up in logs by accident.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Short, non-reversible identifier safe for logs and metrics.
    pub fn fingerprint(&self) -> TokenFingerprint {
        let digest = Sha256::digest(self.0.as_bytes());
        let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
        TokenFingerprint(hex)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.fingerprint())
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// First 12 hex characters of the token's SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenFingerprint(String);

impl fmt::Display for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a session's transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Stopped,
    Starting,
    Connected,
    /// Transport dropped the link without a stop request.
    Disconnected,
    Failed,
}

impl SessionState {
    /// States from which `start` performs a connection attempt.
    pub fn can_start(self) -> bool {
        matches!(
            self,
            SessionState::Stopped | SessionState::Disconnected | SessionState::Failed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Stopped => write!(f, "stopped"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stopped" => Ok(SessionState::Stopped),
            "starting" => Ok(SessionState::Starting),
            "connected" => Ok(SessionState::Connected),
            "disconnected" => Ok(SessionState::Disconnected),
            "failed" => Ok(SessionState::Failed),
            other => Err(format!("invalid session state: '{other}'")),
        }
    }
}

/// Point-in-time view of a session's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatusReport {
    pub state: SessionState,
    /// Cause recorded by the most recent failed start or unexpected logout.
    /// Only populated while `state` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
    /// Reason passed to the most recent stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stop_reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl fmt::Display for SessionStatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.state, &self.last_failure) {
            (SessionState::Failed, Some(cause)) => write!(f, "failed: {cause}"),
            (state, _) => write!(f, "{state}"),
        }
    }
}
