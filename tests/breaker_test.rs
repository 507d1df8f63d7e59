//! Circuit breaker state-machine tests.
//!
//! Paused runtime: the recovery clock only moves via `tokio::time::advance`.

use std::time::Duration;

use heimdall::breaker::{Admission, CircuitBreaker, CircuitState, ProbeGuard};

const RECOVERY: Duration = Duration::from_secs(30);

fn breaker(threshold: u32) -> CircuitBreaker {
    CircuitBreaker::new("places", threshold, RECOVERY)
}

// ============================================================================
// Closed behaviour
// ============================================================================

#[tokio::test(start_paused = true)]
async fn closed_circuit_admits() {
    let b = breaker(3);
    assert_eq!(b.admit(), Admission::Allowed);
    assert_eq!(b.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn opens_after_consecutive_failures() {
    let b = breaker(3);
    b.on_failure(false);
    b.on_failure(false);
    assert_eq!(b.state(), CircuitState::Closed);
    b.on_failure(false);
    assert_eq!(b.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn success_resets_the_failure_count() {
    let b = breaker(3);
    b.on_failure(false);
    b.on_failure(false);
    b.on_success(false);
    assert_eq!(b.consecutive_failures(), 0);
    b.on_failure(false);
    b.on_failure(false);
    assert_eq!(b.state(), CircuitState::Closed, "count must not carry over");
}

// ============================================================================
// Open behaviour
// ============================================================================

#[tokio::test(start_paused = true)]
async fn open_circuit_rejects_with_countdown() {
    let b = breaker(1);
    b.on_failure(false);

    tokio::time::advance(Duration::from_secs(10)).await;
    match b.admit() {
        Admission::Rejected { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(20));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn late_failures_while_open_do_not_extend_the_timer() {
    let b = breaker(1);
    b.on_failure(false);
    tokio::time::advance(Duration::from_secs(29)).await;
    // A call admitted before the trip finishes late.
    b.on_failure(false);
    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(b.admit(), Admission::Probe);
}

// ============================================================================
// Half-open probe
// ============================================================================

#[tokio::test(start_paused = true)]
async fn single_probe_after_recovery_timeout() {
    let b = breaker(1);
    b.on_failure(false);
    tokio::time::advance(RECOVERY).await;

    assert_eq!(b.admit(), Admission::Probe);
    assert_eq!(b.state(), CircuitState::HalfOpen);
    // Concurrent callers are rejected while the probe is in flight.
    assert!(matches!(b.admit(), Admission::Rejected { .. }));
    assert!(matches!(b.admit(), Admission::Rejected { .. }));
}

#[tokio::test(start_paused = true)]
async fn probe_success_closes_the_circuit() {
    let b = breaker(1);
    b.on_failure(false);
    tokio::time::advance(RECOVERY).await;
    assert_eq!(b.admit(), Admission::Probe);

    b.on_success(true);
    assert_eq!(b.state(), CircuitState::Closed);
    assert_eq!(b.consecutive_failures(), 0);
    assert_eq!(b.admit(), Admission::Allowed);
}

#[tokio::test(start_paused = true)]
async fn probe_failure_reopens_and_restarts_the_timer() {
    let b = breaker(1);
    b.on_failure(false);
    tokio::time::advance(RECOVERY).await;
    assert_eq!(b.admit(), Admission::Probe);

    b.on_failure(true);
    assert_eq!(b.state(), CircuitState::Open);
    assert!(matches!(b.admit(), Admission::Rejected { .. }));

    // Full recovery timeout again before the next probe.
    tokio::time::advance(RECOVERY - Duration::from_secs(1)).await;
    assert!(matches!(b.admit(), Admission::Rejected { .. }));
    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(b.admit(), Admission::Probe);
}

#[tokio::test(start_paused = true)]
async fn abandoned_probe_frees_the_slot_immediately() {
    let b = breaker(1);
    b.on_failure(false);
    tokio::time::advance(RECOVERY).await;
    assert_eq!(b.admit(), Admission::Probe);

    b.abandon_probe();
    assert_eq!(b.state(), CircuitState::Open);
    // The recovery timer was not restarted: the next caller probes now.
    assert_eq!(b.admit(), Admission::Probe);
}

#[tokio::test(start_paused = true)]
async fn late_success_cannot_close_over_an_outstanding_probe() {
    let b = breaker(1);
    b.on_failure(false);
    tokio::time::advance(RECOVERY).await;
    assert_eq!(b.admit(), Admission::Probe);

    // A call admitted before the trip finishes late with a success.
    b.on_success(false);
    assert_eq!(b.state(), CircuitState::HalfOpen);
    assert!(matches!(b.admit(), Admission::Rejected { .. }));

    // The probe still owns the outcome.
    b.on_failure(true);
    assert_eq!(b.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn late_success_while_open_does_not_close_the_circuit() {
    let b = breaker(1);
    b.on_failure(false);
    b.on_success(false);
    assert_eq!(b.state(), CircuitState::Open);
}

// ============================================================================
// Probe drop guard
// ============================================================================

#[tokio::test(start_paused = true)]
async fn dropping_an_armed_guard_releases_the_probe() {
    let b = breaker(1);
    b.on_failure(false);
    tokio::time::advance(RECOVERY).await;
    assert_eq!(b.admit(), Admission::Probe);

    {
        let _guard = ProbeGuard::new(&b);
        // Caller cancelled mid-flight.
    }
    assert_eq!(b.state(), CircuitState::Open);
    assert_eq!(b.admit(), Admission::Probe);
}

#[tokio::test(start_paused = true)]
async fn defused_guard_leaves_the_outcome_alone() {
    let b = breaker(1);
    b.on_failure(false);
    tokio::time::advance(RECOVERY).await;
    assert_eq!(b.admit(), Admission::Probe);

    {
        let mut guard = ProbeGuard::new(&b);
        b.on_success(true);
        guard.defuse();
    }
    assert_eq!(b.state(), CircuitState::Closed);
}

// ============================================================================
// Threshold floor
// ============================================================================

#[tokio::test(start_paused = true)]
async fn zero_threshold_is_clamped_to_one() {
    let b = CircuitBreaker::new("misconfigured", 0, RECOVERY);
    b.on_failure(false);
    assert_eq!(b.state(), CircuitState::Open);
}
