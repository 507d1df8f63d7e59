//! Telemetry metric name constants.
//!
//! Centralised metric names for heimdall operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `heimdall_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` — provider name (e.g. "places", "pagespeed")
//! - `operation` — operation invoked (e.g. "search", "analyze")
//! - `status` — outcome label (e.g. "ok", "timeout", "circuit_open")

/// Total invocations dispatched through the gateway.
///
/// Labels: `provider`, `operation`, `status`.
pub const REQUESTS_TOTAL: &str = "heimdall_requests_total";

/// Invocation duration in seconds, measured across the full retry sequence.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "heimdall_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "heimdall_retries_total";

/// Total response cache hits.
///
/// Labels: `provider`, `operation`.
pub const CACHE_HITS_TOTAL: &str = "heimdall_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `provider`, `operation`.
pub const CACHE_MISSES_TOTAL: &str = "heimdall_cache_misses_total";

/// Total admissions rejected by the token-bucket limiter.
///
/// Labels: `provider`.
pub const RATE_LIMITED_TOTAL: &str = "heimdall_rate_limited_total";

/// Total circuit state transitions.
///
/// Labels: `provider`, `to` ("open" | "half_open" | "closed").
pub const CIRCUIT_TRANSITIONS_TOTAL: &str = "heimdall_circuit_transitions_total";

/// Total admissions rejected by the budget guardrail.
///
/// Labels: `provider`, `scope`.
pub const BUDGET_REJECTIONS_TOTAL: &str = "heimdall_budget_rejections_total";

/// Per-call recorded cost in US dollars (histogram).
///
/// Labels: `provider`, `operation`.
pub const COST_USD: &str = "heimdall_cost_usd";
