//! Heimdall - resilience gateway for metered third-party APIs
//!
//! Every call to an external provider — places lookup, page-performance
//! analysis, LLM completion, payments, transactional email — passes
//! through one chokepoint that makes unreliable, rate-limited, metered
//! services behave as a predictable, boundable, observable capability.
//!
//! For each outbound call the gateway checks its response cache, the
//! provider's circuit breaker, the budget guardrail, and the
//! token-bucket rate limiter, then executes with bounded retry and
//! records cost and outcome in an append-only usage ledger.
//!
//! # Example
//!
//! ```rust,no_run
//! use heimdall::{Heimdall, HttpJsonProvider, ProviderConfig, RateLimits};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> heimdall::Result<()> {
//!     let pagespeed = HttpJsonProvider::new(
//!         "pagespeed",
//!         "https://pagespeed.example.com/v5",
//!         RateLimits { daily_quota: 25_000, burst_per_second: 5 },
//!     )?
//!     .cost_per_call("analyze", 0.004)
//!     .cacheable("analyze", Duration::from_secs(7 * 86_400));
//!
//!     let gateway = Heimdall::builder()
//!         .provider(Arc::new(pagespeed), ProviderConfig::new().daily_limit(10.0))
//!         .global_daily_limit(50.0)
//!         .build()?;
//!
//!     let response = gateway
//!         .invoke("pagespeed", "analyze", json!({"url": "https://example.com"}), None)
//!         .await?;
//!     println!("{}", response.payload);
//!     Ok(())
//! }
//! ```

pub mod breaker;
pub mod budget;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod limiter;
pub mod providers;
pub mod telemetry;

// Re-export main types at crate root
pub use breaker::{Admission, CircuitBreaker, CircuitState};
pub use budget::{BudgetGuard, BudgetLimits, BudgetRemaining, UsageLedger, UsageRecord};
pub use cache::{CacheConfig, CachedEntry, ResponseCache};
pub use config::ProviderConfig;
pub use error::{GatewayError, Result};
pub use fingerprint::Fingerprint;
pub use gateway::{Gateway, Heimdall, HeimdallBuilder, ProviderHealth, Response};
pub use limiter::{ProviderLimiter, RateLimitRemaining, RateLimits};
pub use providers::{HttpJsonProvider, Provider, RetryConfig};
