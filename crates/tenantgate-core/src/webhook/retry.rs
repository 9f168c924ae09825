//! Retry policy for webhook delivery.
//!
//! Stateless: the dispatcher lane tracks the attempt number and asks the
//! policy whether to try again and how long to wait.

use std::time::Duration;

use tenantgate_types::config::WebhookConfig;
use tenantgate_types::error::DeliveryError;

/// Capped exponential backoff with a bounded attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per payload, including the first. At least 1.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            backoff_max,
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// Whether attempt number `attempt` (1-based) that failed with `error`
    /// should be followed by another.
    pub fn should_retry(&self, attempt: u32, error: &DeliveryError) -> bool {
        !error.is_permanent() && attempt < self.max_attempts
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    ///
    /// `base * 2^(attempt - 1)`, capped at `backoff_max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WebhookConfig::default())
    }
}
