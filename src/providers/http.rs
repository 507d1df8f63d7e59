//! Generic JSON-over-HTTP provider adapter.
//!
//! Most vendor adapters are "POST JSON, read JSON back" plus tables of
//! per-operation pricing and cache TTLs. [`HttpJsonProvider`] covers that
//! shape so a concrete adapter is configuration, not code: endpoint,
//! quota ceilings, cost table, TTL table, optional bearer token.
//!
//! Its real job is error classification — mapping transport failures and
//! HTTP statuses onto the gateway taxonomy so the circuit breaker and
//! retry loop see correctly classed errors:
//!
//! - request timeout → [`GatewayError::Timeout`]
//! - connect failure → [`GatewayError::Connection`]
//! - 5xx → [`GatewayError::ServerError`]
//! - 4xx → [`GatewayError::ClientError`]
//!
//! Vendors whose wire shape doesn't fit implement [`Provider`] directly.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::traits::Provider;
use crate::limiter::RateLimits;
use crate::{GatewayError, Result};

/// Provider adapter for JSON-over-HTTP vendors.
pub struct HttpJsonProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    limits: RateLimits,
    bearer_token: Option<String>,
    cost_table: HashMap<String, f64>,
    default_cost: f64,
    ttl_table: HashMap<String, Duration>,
}

impl HttpJsonProvider {
    /// Create an adapter for a vendor endpoint.
    ///
    /// Operations are POSTed as JSON to `{base_url}/{operation}`. Until
    /// configured otherwise, every operation costs `0.0` and nothing is
    /// cacheable.
    ///
    /// # Errors
    ///
    /// `Configuration` if the HTTP client cannot be initialised (e.g. the
    /// TLS backend fails to load).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        limits: RateLimits,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            GatewayError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into(),
            client,
            timeout: Duration::from_secs(30),
            limits,
            bearer_token: None,
            cost_table: HashMap::new(),
            default_cost: 0.0,
            ttl_table: HashMap::new(),
        })
    }

    /// Set the request timeout (default: 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Authenticate requests with a bearer token.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the cost of one invocation of `operation`.
    pub fn cost_per_call(mut self, operation: impl Into<String>, usd: f64) -> Self {
        self.cost_table.insert(operation.into(), usd);
        self
    }

    /// Set the cost for operations missing from the table.
    pub fn default_cost(mut self, usd: f64) -> Self {
        self.default_cost = usd;
        self
    }

    /// Mark `operation` cacheable with the given TTL.
    ///
    /// Operations not marked stay non-cacheable and bypass the cache.
    pub fn cacheable(mut self, operation: impl Into<String>, ttl: Duration) -> Self {
        self.ttl_table.insert(operation.into(), ttl);
        self
    }

    fn classify(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                provider: self.name.clone(),
            }
        } else if err.is_connect() {
            GatewayError::Connection {
                provider: self.name.clone(),
                message: err.to_string(),
            }
        } else {
            // Unclassified transport failure; treat like a connection
            // fault so it counts toward provider unhealthiness.
            GatewayError::Connection {
                provider: self.name.clone(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Provider for HttpJsonProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate_limits(&self) -> RateLimits {
        self.limits
    }

    fn cost(&self, operation: &str) -> f64 {
        self.cost_table
            .get(operation)
            .copied()
            .unwrap_or(self.default_cost)
    }

    fn cache_ttl(&self, operation: &str) -> Option<Duration> {
        self.ttl_table.get(operation).copied()
    }

    async fn execute(
        &self,
        operation: &str,
        params: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{operation}", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).timeout(self.timeout).json(params);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::ServerError {
                provider: self.name.clone(),
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::ClientError {
                provider: self.name.clone(),
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }
        response.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout {
                    provider: self.name.clone(),
                }
            } else {
                // Body arrived but wasn't valid JSON.
                GatewayError::ServerError {
                    provider: self.name.clone(),
                    status: status.as_u16(),
                    message: format!("invalid JSON response: {e}"),
                }
            }
        })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_owned()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_falls_back_to_default() {
        let provider = HttpJsonProvider::new(
            "places",
            "http://localhost",
            RateLimits {
                daily_quota: 100,
                burst_per_second: 5,
            },
        )
        .unwrap()
        .cost_per_call("search", 0.017)
        .default_cost(0.002);
        assert_eq!(provider.cost("search"), 0.017);
        assert_eq!(provider.cost("details"), 0.002);
    }

    #[test]
    fn unlisted_operations_are_not_cacheable() {
        let provider = HttpJsonProvider::new(
            "pagespeed",
            "http://localhost",
            RateLimits {
                daily_quota: 100,
                burst_per_second: 5,
            },
        )
        .unwrap()
        .cacheable("analyze", Duration::from_secs(86_400));
        assert_eq!(
            provider.cache_ttl("analyze"),
            Some(Duration::from_secs(86_400))
        );
        assert_eq!(provider.cache_ttl("session_status"), None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.starts_with('h'));
    }
}
