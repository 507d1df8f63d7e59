//! Heimdall error taxonomy.
//!
//! Errors split into two families: admission errors raised by the gateway
//! itself before any network attempt (`RateLimitExceeded`, `CircuitOpen`,
//! `BudgetExceeded`) and provider errors classified by the adapter layer
//! (`Timeout`, `Connection`, `ServerError`, `ClientError`). The
//! classification drives both retry eligibility ([`is_transient`]) and
//! circuit-breaker accounting ([`counts_toward_breaker`]).
//!
//! [`is_transient`]: GatewayError::is_transient
//! [`counts_toward_breaker`]: GatewayError::counts_toward_breaker

use std::time::Duration;

/// Heimdall error types
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    // Admission errors — the call never reached the provider
    #[error("rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("circuit open for provider '{provider}'")]
    CircuitOpen {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("budget exceeded for {scope}: spent ${spent:.4} of ${limit:.2}")]
    BudgetExceeded {
        scope: String,
        spent: f64,
        limit: f64,
        retry_after: Option<Duration>,
    },

    // Provider errors — classified by the adapter layer
    #[error("provider '{provider}' timed out")]
    Timeout { provider: String },

    #[error("provider '{provider}' unreachable: {message}")]
    Connection { provider: String, message: String },

    #[error("provider '{provider}' server error ({status}): {message}")]
    ServerError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("provider '{provider}' rejected request ({status}): {message}")]
    ClientError {
        provider: String,
        status: u16,
        message: String,
    },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Whether this error is eligible for automatic retry with backoff.
    ///
    /// Only provider-side unavailability qualifies. Admission errors are
    /// never retried by the gateway itself — `RateLimitExceeded` is the
    /// caller's cue to back off, `BudgetExceeded` requires intervention,
    /// and `CircuitOpen` means the provider is presumed down.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout { .. }
                | GatewayError::Connection { .. }
                | GatewayError::ServerError { .. }
        )
    }

    /// Whether this error counts toward the circuit-breaker failure threshold.
    ///
    /// Client-side errors (4xx validation) indicate a caller bug, not
    /// provider unhealthiness, and never trip the breaker.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout { .. }
                | GatewayError::Connection { .. }
                | GatewayError::ServerError { .. }
        )
    }

    /// Extract a retry-after hint, if the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimitExceeded { retry_after, .. }
            | GatewayError::CircuitOpen { retry_after, .. }
            | GatewayError::BudgetExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// The provider this error concerns, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            GatewayError::RateLimitExceeded { provider, .. }
            | GatewayError::CircuitOpen { provider, .. }
            | GatewayError::Timeout { provider }
            | GatewayError::Connection { provider, .. }
            | GatewayError::ServerError { provider, .. }
            | GatewayError::ClientError { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Short status label for the usage ledger and metrics.
    pub fn status_label(&self) -> &'static str {
        match self {
            GatewayError::RateLimitExceeded { .. } => "rate_limited",
            GatewayError::CircuitOpen { .. } => "circuit_open",
            GatewayError::BudgetExceeded { .. } => "budget_exceeded",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::Connection { .. } => "connection",
            GatewayError::ServerError { .. } => "server_error",
            GatewayError::ClientError { .. } => "client_error",
            GatewayError::Json(_) => "json",
            GatewayError::UnknownProvider(_) => "unknown_provider",
            GatewayError::Configuration(_) => "configuration",
            GatewayError::Io(_) => "io",
        }
    }
}

/// Result type alias for Heimdall operations
pub type Result<T> = std::result::Result<T, GatewayError>;
