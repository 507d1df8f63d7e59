//! Retry configuration and delay calculation.
//!
//! Retry is an explicit bounded loop driven by the gateway orchestrator
//! (see [`gateway`](crate::gateway)); this module holds the policy so
//! the backoff math is independently testable with deterministic inputs.
//! Only transient errors ([`GatewayError::is_transient`]) are eligible,
//! and a retry never bypasses the circuit breaker.
//!
//! [`GatewayError::is_transient`]: crate::GatewayError::is_transient

use std::time::Duration;

use rand::Rng;

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff with optional multiplicative jitter.
/// Supports a gateway-wide default and per-provider overrides via the
/// builder:
///
/// ```rust
/// # use heimdall::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(3)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(true);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
    /// Whether to add random jitter to delays. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Calculate the base delay for a given attempt number (0-indexed).
    ///
    /// Exponential backoff: `initial_delay * 2^attempt`, capped at
    /// `max_delay`. Does NOT include jitter — see
    /// [`effective_delay()`](Self::effective_delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the delay to sleep before retrying `attempt`.
    ///
    /// When jitter is enabled, up to 25% of the base delay is added,
    /// keeping the result within `max_delay`.
    pub fn effective_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if !self.jitter {
            return base;
        }
        let factor = rand::rng().random_range(0.0..=0.25);
        (base + base.mul_f64(factor)).min(self.max_delay)
    }
}
