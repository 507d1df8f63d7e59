//! The gateway orchestrator — the single chokepoint for outbound calls.
//!
//! For each logical request, [`Gateway::invoke`] runs the admission
//! pipeline in a fixed order:
//!
//! 1. compute fingerprint; consult the response cache (a hit costs no
//!    quota or budget and returns immediately);
//! 2. circuit breaker — reject if OPEN;
//! 3. budget guardrail — reserve the estimated cost, reject if blocked;
//! 4. rate-limit tokens (daily + burst) — reject if unavailable; the
//!    caller decides when to come back;
//! 5. execute with bounded retry and backoff; a retry never bypasses
//!    the breaker;
//! 6. record exactly one usage record for the logical call, settle or
//!    release the budget reservation, update cache and circuit state
//!    from the *final* outcome.
//!
//! Cross-provider calls never contend: all mutable state is per
//! provider, and every lock is held only for in-memory bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::breaker::{Admission, CircuitBreaker, CircuitState, ProbeGuard};
use crate::budget::{BudgetGuard, BudgetRemaining, UsageLedger, UsageRecord};
use crate::cache::ResponseCache;
use crate::fingerprint::Fingerprint;
use crate::limiter::{ProviderLimiter, RateLimitRemaining};
use crate::providers::{Provider, RetryConfig};
use crate::telemetry;
use crate::{GatewayError, Result};

/// A successful gateway response.
#[derive(Debug, Clone)]
pub struct Response {
    /// The provider's response payload.
    pub payload: serde_json::Value,
    /// Whether the payload came from the response cache.
    pub cache_hit: bool,
    /// Correlation id (the request fingerprint) for log lookup.
    pub correlation_id: String,
}

/// Read-only provider status for dashboards and health checks.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    /// Current circuit state.
    pub circuit_state: CircuitState,
    /// Budget headroom across the three enforcement tiers.
    pub budget_remaining: BudgetRemaining,
    /// Tokens left in the daily and burst buckets.
    pub rate_limit_remaining: RateLimitRemaining,
}

pub(crate) struct ProviderEntry {
    pub(crate) adapter: Arc<dyn Provider>,
    pub(crate) limiter: ProviderLimiter,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) retry: RetryConfig,
}

/// The external-API resilience gateway.
///
/// Built via [`Heimdall::builder()`](crate::Heimdall::builder). Cheap to
/// share behind an `Arc`; all methods take `&self`.
pub struct Gateway {
    pub(crate) providers: HashMap<String, ProviderEntry>,
    pub(crate) cache: ResponseCache,
    pub(crate) budget: BudgetGuard,
    pub(crate) ledger: Arc<UsageLedger>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Invoke `operation` on `provider` through the full admission pipeline.
    ///
    /// `unit_tag` is an opaque business-unit-of-work id copied onto the
    /// usage record for cost attribution; the gateway never interprets it.
    #[instrument(skip(self, params, unit_tag))]
    pub async fn invoke(
        &self,
        provider: &str,
        operation: &str,
        params: serde_json::Value,
        unit_tag: Option<&str>,
    ) -> Result<Response> {
        let entry = self
            .providers
            .get(provider)
            .ok_or_else(|| GatewayError::UnknownProvider(provider.to_owned()))?;
        let fp = Fingerprint::compute(provider, operation, &params);
        let started = Instant::now();

        // 1. Cache. A hit exempts the call from every other check.
        let ttl = entry.adapter.cache_ttl(operation);
        if ttl.is_some()
            && let Some(hit) = self.cache.get(&fp).await
        {
            debug!(fingerprint = %fp, "cache hit");
            self.record(&fp, unit_tag, started, 0.0, true, "ok");
            return Ok(Response {
                payload: hit.payload,
                cache_hit: true,
                correlation_id: fp.correlation_id(),
            });
        }

        // 2. Circuit breaker.
        let admission = entry.breaker.admit();
        let probe = match admission {
            Admission::Allowed => false,
            Admission::Probe => true,
            Admission::Rejected { retry_after } => {
                let err = GatewayError::CircuitOpen {
                    provider: provider.to_owned(),
                    retry_after: Some(retry_after),
                };
                self.record(&fp, unit_tag, started, 0.0, false, err.status_label());
                self.finish_metrics(&fp, started, err.status_label());
                return Err(err);
            }
        };
        // Resolved by exactly one breaker outcome call below; Drop
        // releases the probe slot if this future is cancelled.
        let mut probe_guard = probe.then(|| ProbeGuard::new(&entry.breaker));

        // 3. Budget guardrail, with an estimated-cost reservation.
        let estimate = entry.adapter.cost(operation);
        let reservation = match self.budget.try_reserve(provider, estimate) {
            Ok(r) => r,
            Err(err) => {
                self.record(&fp, unit_tag, started, 0.0, false, err.status_label());
                self.finish_metrics(&fp, started, err.status_label());
                return Err(err);
            }
        };

        // 4. Rate-limit admission, daily and burst together.
        if !entry.limiter.try_acquire(1) {
            reservation.release();
            metrics::counter!(telemetry::RATE_LIMITED_TOTAL,
                "provider" => provider.to_owned(),
            )
            .increment(1);
            let err = GatewayError::RateLimitExceeded {
                provider: provider.to_owned(),
                retry_after: Some(entry.limiter.retry_after(1)),
            };
            self.record(&fp, unit_tag, started, 0.0, false, err.status_label());
            self.finish_metrics(&fp, started, err.status_label());
            return Err(err);
        }

        // 5. Execute with bounded retry. The token consumed above stays
        // consumed whatever happens next.
        let outcome = self
            .execute_with_retry(entry, operation, &params, probe, &fp)
            .await;

        // 6. Final-outcome bookkeeping: one breaker update, one usage
        // record, one budget settlement for the whole retry sequence.
        match outcome {
            Ok(payload) => {
                if let Some(g) = probe_guard.as_mut() {
                    g.defuse();
                }
                entry.breaker.on_success(probe);
                reservation.settle(estimate);
                if let Some(ttl) = ttl {
                    self.cache.put(&fp, payload.clone(), ttl).await;
                }
                self.record(&fp, unit_tag, started, estimate, false, "ok");
                self.finish_metrics(&fp, started, "ok");
                metrics::histogram!(telemetry::COST_USD,
                    "provider" => fp.provider().to_owned(),
                    "operation" => fp.operation().to_owned(),
                )
                .record(estimate);
                Ok(Response {
                    payload,
                    cache_hit: false,
                    correlation_id: fp.correlation_id(),
                })
            }
            Err(err) => {
                if let Some(g) = probe_guard.as_mut() {
                    g.defuse();
                }
                if err.counts_toward_breaker() {
                    entry.breaker.on_failure(probe);
                } else if probe {
                    // The probe reached the provider and got a non-failure
                    // classification (e.g. 4xx): the provider is back.
                    entry.breaker.on_success(true);
                }
                // Failures cost nothing unless a vendor charges for them;
                // release the reservation rather than settling it.
                reservation.release();
                self.record(&fp, unit_tag, started, 0.0, false, err.status_label());
                self.finish_metrics(&fp, started, err.status_label());
                Err(err)
            }
        }
    }

    /// Read-only health snapshot for one provider.
    pub fn provider_health(&self, provider: &str) -> Result<ProviderHealth> {
        let entry = self
            .providers
            .get(provider)
            .ok_or_else(|| GatewayError::UnknownProvider(provider.to_owned()))?;
        Ok(ProviderHealth {
            circuit_state: entry.breaker.state(),
            budget_remaining: self.budget.remaining(provider),
            rate_limit_remaining: entry.limiter.remaining(),
        })
    }

    /// Names of all registered providers.
    pub fn providers(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Drop any cached response for this exact request.
    pub async fn invalidate(
        &self,
        provider: &str,
        operation: &str,
        params: &serde_json::Value,
    ) {
        let fp = Fingerprint::compute(provider, operation, params);
        self.cache.invalidate(&fp).await;
    }

    /// The gateway's usage ledger.
    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Bounded retry loop around the adapter's network call.
    ///
    /// Retries only transient errors, sleeping with exponential backoff
    /// and jitter between attempts. After each backoff sleep the breaker
    /// is re-checked: a non-probe retry proceeds only while the circuit
    /// is still closed — if a concurrent caller tripped it, or another
    /// caller now holds the half-open probe slot, the retry stops with
    /// `CircuitOpen` instead of bypassing the breaker. The half-open
    /// probe holds its own authorization, so it may complete its
    /// attempts without re-admission.
    async fn execute_with_retry(
        &self,
        entry: &ProviderEntry,
        operation: &str,
        params: &serde_json::Value,
        probe: bool,
        fp: &Fingerprint,
    ) -> Result<serde_json::Value> {
        let config = &entry.retry;
        let mut attempt = 0;
        loop {
            match entry.adapter.execute(operation, params).await {
                Ok(payload) => return Ok(payload),
                Err(e) if e.is_transient() && attempt + 1 < config.max_attempts => {
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "provider" => fp.provider().to_owned(),
                        "operation" => fp.operation().to_owned(),
                    )
                    .increment(1);
                    let delay = config.effective_delay(attempt);
                    warn!(
                        provider = fp.provider(),
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    // The circuit may have tripped during the sleep.
                    if !probe && entry.breaker.state() != CircuitState::Closed {
                        return Err(GatewayError::CircuitOpen {
                            provider: entry.adapter.name().to_owned(),
                            retry_after: None,
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn record(
        &self,
        fp: &Fingerprint,
        unit_tag: Option<&str>,
        started: Instant,
        cost_usd: f64,
        cache_hit: bool,
        status: &str,
    ) {
        self.ledger.record(UsageRecord {
            provider: fp.provider().to_owned(),
            operation: fp.operation().to_owned(),
            cost_usd,
            cache_hit,
            response_time_ms: started.elapsed().as_millis() as u64,
            status: status.to_owned(),
            timestamp: Utc::now(),
            correlation_id: fp.correlation_id(),
            unit_tag: unit_tag.map(str::to_owned),
        });
    }

    fn finish_metrics(&self, fp: &Fingerprint, started: Instant, status: &'static str) {
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => fp.provider().to_owned(),
            "operation" => fp.operation().to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => fp.provider().to_owned(),
            "operation" => fp.operation().to_owned(),
        )
        .record(started.elapsed().as_secs_f64());
    }
}
