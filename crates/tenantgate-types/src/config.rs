//! Gateway configuration types.
//!
//! `GatewayConfig` represents the top-level `tenantgate.toml` that controls
//! cache sizing, lifecycle timeouts, toggle defaults, webhook retry policy,
//! the HTTP listener and tenant provisioning.

use serde::{Deserialize, Serialize};

use std::time::Duration;

use crate::toggle::{ToggleOverrides, ToggleValues};
use crate::webhook::WebhookTarget;

/// Top-level configuration for the gateway.
///
/// Loaded from `~/.tenantgate/tenantgate.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Maximum number of messages retained per session.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Window for a start attempt to reach `Connected`.
    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,

    /// Deployment-wide toggle defaults for new sessions.
    #[serde(default)]
    pub toggles: ToggleValues,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// System credential for the first-available bypass. Unset disables it.
    #[serde(default, skip_serializing)]
    pub master_key: Option<String>,

    /// Tenants provisioned at startup.
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_start_timeout_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            start_timeout_secs: default_start_timeout_secs(),
            toggles: ToggleValues::default(),
            webhook: WebhookConfig::default(),
            server: ServerConfig::default(),
            master_key: None,
            sessions: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Cache capacity with a floor of one message.
    pub fn effective_cache_capacity(&self) -> usize {
        self.cache_capacity.max(1)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }
}

/// Webhook delivery and retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Total delivery attempts per payload, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound on a single retry delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pending payloads per (session, endpoint) lane before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    31000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// One tenant provisioned from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub token: String,
    #[serde(default)]
    pub webhooks: Vec<WebhookTarget>,
    #[serde(default)]
    pub toggles: ToggleOverrides,
    /// Start the session as soon as the gateway boots.
    #[serde(default)]
    pub autostart: bool,
}
