//! Token-bucket admission control, two buckets per provider.
//!
//! Every provider gets a **daily** bucket (capacity = daily quota,
//! refilling at quota/86400 per second — a slow leak) and a **burst**
//! bucket (capacity = burst-per-second, refilling once per second).
//! Admission requires both, checked and decremented under one lock so a
//! daily token is never consumed when the burst check would fail.
//!
//! Refill is computed lazily at acquisition time (`elapsed * rate`,
//! saturating at capacity), so no background timer runs. Time comes from
//! `tokio::time::Instant`, which makes the refill clock pausable in
//! tests (`#[tokio::test(start_paused = true)]`).

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Vendor-imposed quota ceilings for one provider.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Calls allowed per calendar day.
    pub daily_quota: u64,
    /// Calls allowed in any one-second burst.
    pub burst_per_second: u64,
}

/// Tokens currently available, for health reporting.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRemaining {
    /// Tokens left in the daily bucket.
    pub daily: f64,
    /// Tokens left in the burst bucket.
    pub burst: f64,
}

/// One token bucket with lazy refill.
#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// Apply elapsed-time refill, saturating at capacity.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec)
            .min(self.capacity);
        self.last_refill = now;
    }

    fn available(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill);
        (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity)
    }

    /// Seconds until `needed` tokens will be available.
    fn time_until(&self, needed: f64, now: Instant) -> Duration {
        let deficit = needed - self.available(now);
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        if self.refill_per_sec <= 0.0 {
            return Duration::from_secs(86_400);
        }
        Duration::from_secs_f64(deficit / self.refill_per_sec)
    }
}

struct Buckets {
    daily: TokenBucket,
    burst: TokenBucket,
}

/// Per-provider admission limiter combining daily and burst buckets.
///
/// The read-modify-write is a single critical section, so concurrent
/// callers against the same provider observe serializable updates — no
/// lost decrements, and `tokens` never goes negative.
pub struct ProviderLimiter {
    inner: Mutex<Buckets>,
}

impl ProviderLimiter {
    /// Create a limiter from a provider's declared quota ceilings.
    pub fn new(limits: &RateLimits) -> Self {
        let daily = TokenBucket::new(
            limits.daily_quota as f64,
            limits.daily_quota as f64 / 86_400.0,
        );
        let burst = TokenBucket::new(
            limits.burst_per_second as f64,
            limits.burst_per_second as f64,
        );
        Self {
            inner: Mutex::new(Buckets { daily, burst }),
        }
    }

    /// Try to acquire `tokens` from both buckets atomically.
    ///
    /// Returns `false` without mutating state when either bucket lacks
    /// tokens. A consumed token stays consumed even if the caller is
    /// later cancelled — quota is spent at admission, not at completion.
    pub fn try_acquire(&self, tokens: u64) -> bool {
        let now = Instant::now();
        let needed = tokens as f64;
        let mut buckets = self.inner.lock().expect("limiter lock poisoned");
        buckets.daily.refill(now);
        buckets.burst.refill(now);
        if buckets.daily.tokens >= needed && buckets.burst.tokens >= needed {
            buckets.daily.tokens -= needed;
            buckets.burst.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// Estimate how long until `tokens` could be admitted.
    ///
    /// The bound is whichever bucket recovers last.
    pub fn retry_after(&self, tokens: u64) -> Duration {
        let now = Instant::now();
        let needed = tokens as f64;
        let buckets = self.inner.lock().expect("limiter lock poisoned");
        buckets
            .daily
            .time_until(needed, now)
            .max(buckets.burst.time_until(needed, now))
    }

    /// Tokens currently available in each bucket.
    pub fn remaining(&self) -> RateLimitRemaining {
        let now = Instant::now();
        let buckets = self.inner.lock().expect("limiter lock poisoned");
        RateLimitRemaining {
            daily: buckets.daily.available(now),
            burst: buckets.burst.available(now),
        }
    }
}
