//! Error taxonomy classification tests.

use std::time::Duration;

use heimdall::GatewayError;

// ============================================================================
// Transient classification (retry eligibility)
// ============================================================================

#[test]
fn provider_side_failures_are_transient() {
    assert!(
        GatewayError::Timeout {
            provider: "places".into()
        }
        .is_transient()
    );
    assert!(
        GatewayError::Connection {
            provider: "places".into(),
            message: "connection refused".into()
        }
        .is_transient()
    );
    assert!(
        GatewayError::ServerError {
            provider: "places".into(),
            status: 503,
            message: "unavailable".into()
        }
        .is_transient()
    );
}

#[test]
fn admission_errors_are_not_transient() {
    assert!(
        !GatewayError::RateLimitExceeded {
            provider: "places".into(),
            retry_after: None
        }
        .is_transient()
    );
    assert!(
        !GatewayError::CircuitOpen {
            provider: "places".into(),
            retry_after: None
        }
        .is_transient()
    );
    assert!(
        !GatewayError::BudgetExceeded {
            scope: "global_daily".into(),
            spent: 10.0,
            limit: 10.0,
            retry_after: None
        }
        .is_transient()
    );
}

#[test]
fn client_errors_are_never_transient() {
    assert!(
        !GatewayError::ClientError {
            provider: "places".into(),
            status: 400,
            message: "missing field".into()
        }
        .is_transient()
    );
}

// ============================================================================
// Circuit-breaker classification
// ============================================================================

#[test]
fn server_errors_count_toward_breaker() {
    assert!(
        GatewayError::ServerError {
            provider: "llm".into(),
            status: 500,
            message: "oops".into()
        }
        .counts_toward_breaker()
    );
    assert!(
        GatewayError::Timeout {
            provider: "llm".into()
        }
        .counts_toward_breaker()
    );
}

#[test]
fn client_errors_do_not_count_toward_breaker() {
    assert!(
        !GatewayError::ClientError {
            provider: "llm".into(),
            status: 422,
            message: "bad prompt".into()
        }
        .counts_toward_breaker()
    );
}

#[test]
fn gateway_rejections_do_not_count_toward_breaker() {
    assert!(
        !GatewayError::RateLimitExceeded {
            provider: "llm".into(),
            retry_after: None
        }
        .counts_toward_breaker()
    );
    assert!(
        !GatewayError::BudgetExceeded {
            scope: "hourly_spike(llm)".into(),
            spent: 5.0,
            limit: 5.0,
            retry_after: None
        }
        .counts_toward_breaker()
    );
}

// ============================================================================
// retry_after extraction
// ============================================================================

#[test]
fn retry_after_from_admission_errors() {
    let d = Duration::from_secs(30);
    let err = GatewayError::CircuitOpen {
        provider: "mailer".into(),
        retry_after: Some(d),
    };
    assert_eq!(err.retry_after(), Some(d));
}

#[test]
fn retry_after_none_for_provider_errors() {
    assert_eq!(
        GatewayError::Timeout {
            provider: "mailer".into()
        }
        .retry_after(),
        None
    );
}

// ============================================================================
// Structure for caller fallback decisions
// ============================================================================

#[test]
fn errors_name_their_provider() {
    let err = GatewayError::ServerError {
        provider: "payments".into(),
        status: 502,
        message: "bad gateway".into(),
    };
    assert_eq!(err.provider(), Some("payments"));
    assert_eq!(GatewayError::UnknownProvider("x".into()).provider(), None);
}

#[test]
fn status_labels_are_stable() {
    assert_eq!(
        GatewayError::Timeout {
            provider: "p".into()
        }
        .status_label(),
        "timeout"
    );
    assert_eq!(
        GatewayError::CircuitOpen {
            provider: "p".into(),
            retry_after: None
        }
        .status_label(),
        "circuit_open"
    );
    assert_eq!(
        GatewayError::BudgetExceeded {
            scope: "s".into(),
            spent: 0.0,
            limit: 0.0,
            retry_after: None
        }
        .status_label(),
        "budget_exceeded"
    );
}
