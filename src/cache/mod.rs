//! Response cache keyed by request fingerprint.
//!
//! A cache hit is resolved *before* rate-limit admission, circuit checks,
//! and budget reservation, so it costs nothing against quota or spend —
//! this is the primary cost-control lever. Entries are immutable once
//! written; identical fingerprints are expected to carry equivalent
//! content, so concurrent writers are last-writer-wins.
//!
//! TTL is per entry: each provider declares a TTL per operation (page
//! performance results keep for days; payment-session status is never
//! cached). Operations with no TTL bypass the cache entirely — the
//! gateway never consults or populates it for them.
//!
//! Eviction is TTL-driven via moka's per-entry expiry; the cache is also
//! size-capped, so switching on LRU pressure later is a config change,
//! not a redesign.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;

use crate::fingerprint::Fingerprint;
use crate::telemetry;

/// Configuration for the response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 10_000 }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }
}

/// One cached response. Never mutated after creation — replaced, not updated.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    /// The provider response payload.
    pub payload: serde_json::Value,
    /// When the entry was stored.
    pub stored_at: Instant,
    /// How long the entry stays valid.
    pub ttl: Duration,
}

impl CachedEntry {
    /// Whether the entry has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Per-entry expiry policy: each entry carries its own TTL.
struct PerEntryTtl;

impl Expiry<u64, CachedEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &u64,
        value: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory response cache keyed by [`Fingerprint`].
pub struct ResponseCache {
    cache: Cache<u64, CachedEntry>,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Look up a cached response.
    ///
    /// Returns `None` on miss or when the stored entry has expired —
    /// expiry is double-checked here so TTL semantics are exact
    /// regardless of the eviction timer's granularity. Emits hit/miss
    /// metrics labelled by provider and operation.
    pub async fn get(&self, fp: &Fingerprint) -> Option<CachedEntry> {
        match self.cache.get(&fp.key()).await {
            Some(entry) if !entry.is_expired() => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL,
                    "provider" => fp.provider().to_owned(),
                    "operation" => fp.operation().to_owned(),
                )
                .increment(1);
                Some(entry)
            }
            stale => {
                if stale.is_some() {
                    self.cache.invalidate(&fp.key()).await;
                }
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL,
                    "provider" => fp.provider().to_owned(),
                    "operation" => fp.operation().to_owned(),
                )
                .increment(1);
                None
            }
        }
    }

    /// Store a response under the fingerprint with the given TTL.
    pub async fn put(&self, fp: &Fingerprint, payload: serde_json::Value, ttl: Duration) {
        let entry = CachedEntry {
            payload,
            stored_at: Instant::now(),
            ttl,
        };
        self.cache.insert(fp.key(), entry).await;
    }

    /// Drop the entry for a fingerprint, if present.
    pub async fn invalidate(&self, fp: &Fingerprint) {
        self.cache.invalidate(&fp.key()).await;
    }

    /// Number of entries currently held (approximate, per moka semantics).
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Whether the cache is empty (approximate, per moka semantics).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
