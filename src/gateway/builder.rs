//! Builder for configuring gateway instances.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::breaker::CircuitBreaker;
use crate::budget::{BudgetGuard, BudgetLimits, UsageLedger};
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::ProviderConfig;
use crate::limiter::ProviderLimiter;
use crate::providers::{Provider, RetryConfig};
use crate::{GatewayError, Result};

use super::orchestrator::{Gateway, ProviderEntry};

/// Main entry point for creating gateway instances.
pub struct Heimdall;

impl Heimdall {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> HeimdallBuilder {
        HeimdallBuilder::new()
    }
}

/// Builder for configuring gateway instances.
///
/// ```rust,no_run
/// use heimdall::{Heimdall, HttpJsonProvider, ProviderConfig, RateLimits};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn main() -> heimdall::Result<()> {
/// let places = HttpJsonProvider::new(
///     "places",
///     "https://places.example.com/v1",
///     RateLimits { daily_quota: 1000, burst_per_second: 10 },
/// )?
/// .cost_per_call("search", 0.017)
/// .cacheable("search", Duration::from_secs(86_400));
///
/// let gateway = Heimdall::builder()
///     .provider(
///         Arc::new(places),
///         ProviderConfig::new().daily_limit(25.0).hourly_spike_limit(5.0),
///     )
///     .global_daily_limit(100.0)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HeimdallBuilder {
    providers: Vec<(Arc<dyn Provider>, ProviderConfig)>,
    retry: RetryConfig,
    cache: CacheConfig,
    global_daily_limit: Option<f64>,
    ledger_path: Option<PathBuf>,
}

impl HeimdallBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            global_daily_limit: None,
            ledger_path: None,
        }
    }

    /// Register a provider adapter with its gateway-side configuration.
    pub fn provider(mut self, adapter: Arc<dyn Provider>, config: ProviderConfig) -> Self {
        self.providers.push((adapter, config));
        self
    }

    /// Set the gateway-wide retry policy (per-provider configs may override).
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Configure the response cache.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Set the global daily spend ceiling, the hard backstop across all
    /// providers.
    pub fn global_daily_limit(mut self, usd: f64) -> Self {
        self.global_daily_limit = Some(usd);
        self
    }

    /// Persist usage records as JSON lines at `path` (appended, so
    /// records survive restarts).
    pub fn ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = Some(path.into());
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<Gateway> {
        if self.providers.is_empty() {
            return Err(GatewayError::Configuration(
                "no providers registered".to_owned(),
            ));
        }

        let mut entries = HashMap::new();
        let mut budget_limits: HashMap<String, BudgetLimits> = HashMap::new();
        for (adapter, config) in self.providers {
            let name = adapter.name().to_owned();
            if entries.contains_key(&name) {
                return Err(GatewayError::Configuration(format!(
                    "provider '{name}' registered twice"
                )));
            }
            budget_limits.insert(name.clone(), config.budget_limits());
            let entry = ProviderEntry {
                limiter: ProviderLimiter::new(&adapter.rate_limits()),
                breaker: CircuitBreaker::new(
                    name.as_str(),
                    config.failure_threshold,
                    config.recovery_timeout,
                ),
                retry: config.retry.unwrap_or_else(|| self.retry.clone()),
                adapter,
            };
            entries.insert(name, entry);
        }

        let ledger = match self.ledger_path {
            Some(path) => UsageLedger::with_sink(path)?,
            None => UsageLedger::in_memory(),
        };

        Ok(Gateway {
            providers: entries,
            cache: ResponseCache::new(&self.cache),
            budget: BudgetGuard::new(self.global_daily_limit, budget_limits),
            ledger: Arc::new(ledger),
        })
    }
}

impl Default for HeimdallBuilder {
    fn default() -> Self {
        Self::new()
    }
}
