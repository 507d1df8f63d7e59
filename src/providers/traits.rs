//! The provider facade trait.
//!
//! Every concrete vendor adapter (places lookup, page-performance
//! analysis, LLM completion, payments, transactional email) implements
//! [`Provider`] and is registered with the gateway at startup. Business
//! code never calls an adapter directly — the gateway is the only entry
//! point, so every outbound call passes through admission control.
//!
//! The trait deliberately excludes vendor payload schemas: `execute`
//! takes and returns JSON, and the adapter is responsible for
//! classifying its transport errors into the gateway taxonomy
//! (timeout / connection / server-error / client-error).

use async_trait::async_trait;
use std::time::Duration;

use crate::Result;
use crate::limiter::RateLimits;

/// Uniform calling convention for one external vendor.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name, used as the registry key and in logs and metrics.
    fn name(&self) -> &str;

    /// Vendor-imposed quota ceilings (daily + burst).
    fn rate_limits(&self) -> RateLimits;

    /// Estimated cost in US dollars of one invocation of `operation`.
    ///
    /// Used both for the budget reservation before the call and as the
    /// recorded cost after a success.
    fn cost(&self, operation: &str) -> f64;

    /// Cache TTL for `operation`.
    ///
    /// `None` marks the operation non-idempotent or time-sensitive; the
    /// gateway then bypasses the cache entirely for it.
    fn cache_ttl(&self, operation: &str) -> Option<Duration>;

    /// Perform the network call.
    ///
    /// Errors must be classified: `Timeout` / `Connection` /
    /// `ServerError` for provider-side unavailability (these count
    /// toward the circuit breaker and are retried), `ClientError` for a
    /// malformed request (never retried, never counted).
    async fn execute(&self, operation: &str, params: &serde_json::Value)
    -> Result<serde_json::Value>;
}
