//! Per-provider circuit breaker.
//!
//! Classic three-state machine: CLOSED passes requests and counts
//! consecutive classified failures; OPEN rejects immediately without a
//! network call; after the recovery timeout the next request is admitted
//! as the single HALF_OPEN probe. Probe success closes the circuit, probe
//! failure reopens it and restarts the recovery timer.
//!
//! Only errors that indicate provider-side unavailability count toward
//! the failure threshold — the orchestrator filters with
//! [`GatewayError::counts_toward_breaker`](crate::GatewayError::counts_toward_breaker)
//! before reporting, so a caller bug (4xx) never blinds the gateway to a
//! healthy provider.
//!
//! Invariant: at most one probe in flight per provider. The probe slot is
//! handed out by [`CircuitBreaker::admit`] and must be resolved by
//! exactly one of `on_success` / `on_failure` / `abandon_probe`; the
//! orchestrator holds a drop guard so a cancelled probe releases the
//! slot instead of wedging the breaker half-open forever.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry;

/// Circuit state for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests pass through; failures are being counted.
    Closed,
    /// Requests are rejected without a network attempt.
    Open,
    /// One probe request is testing recovery.
    HalfOpen,
}

impl CircuitState {
    fn label(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed, request passes.
    Allowed,
    /// Circuit half-open; this request holds the single probe slot.
    Probe,
    /// Circuit open; reject without a network call.
    Rejected {
        /// Time left until a probe will be admitted.
        retry_after: Duration,
    },
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Failure-isolation state machine for one provider.
pub struct CircuitBreaker {
    provider: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for a provider.
    pub fn new(provider: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            provider: provider.into(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Check whether a request may proceed.
    ///
    /// When the recovery timeout has elapsed on an open circuit, the
    /// caller receiving [`Admission::Probe`] owns the half-open probe
    /// slot; concurrent callers keep getting [`Admission::Rejected`]
    /// until the probe resolves.
    pub fn admit(&self) -> Admission {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::HalfOpen => Admission::Rejected {
                retry_after: Duration::ZERO,
            },
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.recovery_timeout && !inner.probe_in_flight {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    self.transition(CircuitState::HalfOpen);
                    Admission::Probe
                } else {
                    Admission::Rejected {
                        retry_after: self.recovery_timeout.saturating_sub(elapsed),
                    }
                }
            }
        }
    }

    /// Report a successful final outcome.
    ///
    /// Only the probe holder may close a non-closed circuit. A success
    /// from a call admitted before the trip is ignored while the circuit
    /// is open or half-open, so it can never close the circuit over an
    /// outstanding probe.
    pub fn on_success(&self, probe: bool) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if probe {
            inner.probe_in_flight = false;
            if inner.state != CircuitState::Closed {
                inner.state = CircuitState::Closed;
                inner.opened_at = None;
                self.transition(CircuitState::Closed);
            }
            inner.consecutive_failures = 0;
            return;
        }
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::Open | CircuitState::HalfOpen => {}
        }
    }

    /// Report a classified failure as the final outcome.
    pub fn on_failure(&self, probe: bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if probe {
            // Probe failed: reopen and restart the recovery timer.
            inner.probe_in_flight = false;
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            self.transition(CircuitState::Open);
            return;
        }
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                    warn!(
                        provider = %self.provider,
                        failures = inner.consecutive_failures,
                        "failure threshold reached, opening circuit"
                    );
                    self.transition(CircuitState::Open);
                }
            }
            // A call admitted before the circuit opened finished late;
            // the circuit is already isolating, nothing more to count.
            CircuitState::Open | CircuitState::HalfOpen => {}
        }
    }

    /// Release an unresolved probe slot (cancelled caller).
    ///
    /// Reverts to OPEN without touching `opened_at`, so the next request
    /// can claim a fresh probe immediately.
    pub fn abandon_probe(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
            inner.state = CircuitState::Open;
            debug!(provider = %self.provider, "half-open probe abandoned");
            self.transition(CircuitState::Open);
        }
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Consecutive classified failures observed while closed.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner
            .lock()
            .expect("breaker lock poisoned")
            .consecutive_failures
    }

    fn transition(&self, to: CircuitState) {
        metrics::counter!(telemetry::CIRCUIT_TRANSITIONS_TOTAL,
            "provider" => self.provider.clone(),
            "to" => to.label(),
        )
        .increment(1);
    }
}

/// Drop guard for the half-open probe slot.
///
/// Created by the orchestrator when [`CircuitBreaker::admit`] returns
/// [`Admission::Probe`]. If the holder reports an outcome, the guard is
/// defused; if the future is dropped mid-flight, `Drop` releases the
/// slot so the breaker is not stuck half-open.
pub struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> ProbeGuard<'a> {
    /// Arm a guard for a freshly admitted probe.
    pub fn new(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            armed: true,
        }
    }

    /// Mark the probe as resolved; `Drop` becomes a no-op.
    pub fn defuse(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_probe();
        }
    }
}
