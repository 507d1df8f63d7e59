//! Per-provider control-plane configuration.
//!
//! Quota ceilings and pricing live on the [`Provider`](crate::Provider)
//! adapter itself (the vendor knows its own limits); everything the
//! *gateway* decides — breaker thresholds, budget ceilings, retry
//! overrides — lives here and is supplied at registration time.

use std::time::Duration;

use crate::budget::BudgetLimits;
use crate::providers::RetryConfig;

/// Gateway-side configuration for one registered provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Consecutive classified failures before the circuit opens. Default: 5.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing. Default: 60s.
    pub recovery_timeout: Duration,
    /// Spend ceiling for any one UTC hour (runaway-loop guard).
    pub hourly_spike_limit: Option<f64>,
    /// Spend ceiling for one UTC day.
    pub daily_limit: Option<f64>,
    /// Retry override for this provider; falls back to the gateway default.
    pub retry: Option<RetryConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            hourly_spike_limit: None,
            daily_limit: None,
            retry: None,
        }
    }
}

impl ProviderConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the circuit-breaker failure threshold.
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Set the circuit-breaker recovery timeout.
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the hourly spike spend ceiling.
    pub fn hourly_spike_limit(mut self, usd: f64) -> Self {
        self.hourly_spike_limit = Some(usd);
        self
    }

    /// Set the daily spend ceiling.
    pub fn daily_limit(mut self, usd: f64) -> Self {
        self.daily_limit = Some(usd);
        self
    }

    /// Override the gateway-wide retry policy for this provider.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    pub(crate) fn budget_limits(&self) -> BudgetLimits {
        BudgetLimits {
            hourly_spike: self.hourly_spike_limit,
            daily: self.daily_limit,
        }
    }
}
