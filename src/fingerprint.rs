//! Deterministic request fingerprints.
//!
//! A [`Fingerprint`] identifies one logical outbound request: provider,
//! operation, and a content hash of the canonicalized parameter set. It is
//! the response-cache key and doubles as a correlation id for logging.
//! Immutable once computed.
//!
//! Canonicalization relies on `serde_json`'s default map representation
//! (BTreeMap), which serializes object keys in sorted order. Two parameter
//! maps that differ only in key order therefore produce the same hash.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Deterministic identifier for one logical outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    provider: String,
    operation: String,
    hash: u64,
}

impl Fingerprint {
    /// Compute a fingerprint from provider, operation, and parameters.
    pub fn compute(provider: &str, operation: &str, params: &serde_json::Value) -> Self {
        // Compact serialization of a BTreeMap-backed Value is canonical.
        let canonical = params.to_string();
        let mut hasher = DefaultHasher::new();
        provider.hash(&mut hasher);
        operation.hash(&mut hasher);
        canonical.hash(&mut hasher);
        Self {
            provider: provider.to_owned(),
            operation: operation.to_owned(),
            hash: hasher.finish(),
        }
    }

    /// The provider this request targets.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The operation being invoked.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// 64-bit cache key.
    ///
    /// Deterministic within a process lifetime, which is sufficient for an
    /// in-memory cache. A shared backend would want a stable cross-process
    /// hash (e.g. xxhash) instead.
    pub fn key(&self) -> u64 {
        self.hash
    }

    /// Correlation id for log lines and usage records.
    pub fn correlation_id(&self) -> String {
        format!("{}:{}:{:016x}", self.provider, self.operation, self.hash)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{:016x}", self.provider, self.operation, self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_deterministic() {
        let a = Fingerprint::compute("places", "search", &json!({"q": "plumber"}));
        let b = Fingerprint::compute("places", "search", &json!({"q": "plumber"}));
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn fingerprint_ignores_key_order() {
        let a = Fingerprint::compute("places", "search", &json!({"a": 1, "b": 2}));
        let b = Fingerprint::compute("places", "search", &json!({"b": 2, "a": 1}));
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn fingerprint_differs_on_provider() {
        let a = Fingerprint::compute("places", "search", &json!({"q": "x"}));
        let b = Fingerprint::compute("pagespeed", "search", &json!({"q": "x"}));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn fingerprint_differs_on_operation() {
        let a = Fingerprint::compute("places", "search", &json!({"q": "x"}));
        let b = Fingerprint::compute("places", "details", &json!({"q": "x"}));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn fingerprint_differs_on_params() {
        let a = Fingerprint::compute("places", "search", &json!({"q": "x"}));
        let b = Fingerprint::compute("places", "search", &json!({"q": "y"}));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn correlation_id_names_provider_and_operation() {
        let fp = Fingerprint::compute("mailer", "send", &json!({}));
        let id = fp.correlation_id();
        assert!(id.starts_with("mailer:send:"));
        assert_eq!(id, fp.to_string());
    }
}
