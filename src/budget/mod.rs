//! Cost ledger and budget guardrail.
//!
//! Three enforcement tiers, evaluated tightest-window first before a
//! call is admitted:
//!
//! 1. **Hourly spike limit** — catches a runaway loop.
//! 2. **Per-provider daily limit** — stops one vendor draining the budget.
//! 3. **Global daily limit** — hard backstop.
//!
//! A soft breach (>80% of a limit) logs a warning but allows the call; a
//! hard breach (≥100%, or a projection past 100%) blocks without
//! contacting the provider.
//!
//! Concurrency is handled with estimated-cost reservations: the check
//! adds the estimate to a pending pool, so concurrent in-flight calls
//! cannot collectively overshoot a limit by more than one call's slack.
//! After the call, the reservation is settled with the actual cost, or
//! released on failure/cancellation (the [`Reservation`] drop guard).
//!
//! Windows are UTC: the hour bucket and the calendar day. Materialized
//! totals here are a fast path; the append-only [`ledger`] remains the
//! source of truth they reconcile against.

pub mod ledger;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::telemetry;
use crate::{GatewayError, Result};

pub use ledger::{UsageLedger, UsageRecord};

const EPS: f64 = 1e-9;
const SOFT_BREACH_FRACTION: f64 = 0.8;

/// Spend ceilings for one provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetLimits {
    /// Ceiling for any one UTC hour.
    pub hourly_spike: Option<f64>,
    /// Ceiling for one UTC day.
    pub daily: Option<f64>,
}

/// Budget headroom for health reporting. `None` means no limit configured.
#[derive(Debug, Clone, Copy)]
pub struct BudgetRemaining {
    /// Dollars left under the provider's hourly spike limit.
    pub hourly: Option<f64>,
    /// Dollars left under the provider's daily limit.
    pub provider_daily: Option<f64>,
    /// Dollars left under the global daily limit.
    pub global_daily: Option<f64>,
}

/// One rolling window's materialized totals.
#[derive(Debug, Default, Clone, Copy)]
struct Window {
    key: i64,
    spent: f64,
    pending: f64,
}

impl Window {
    /// Reset totals when the window key has rolled over.
    fn roll(&mut self, key: i64) {
        if self.key != key {
            self.key = key;
            self.spent = 0.0;
            self.pending = 0.0;
        }
    }

    fn used(&self) -> f64 {
        self.spent + self.pending
    }
}

#[derive(Debug, Default)]
struct ProviderSpend {
    hour: Window,
    day: Window,
}

#[derive(Debug, Default)]
struct BudgetBook {
    global_day: Window,
    providers: HashMap<String, ProviderSpend>,
}

/// Spend-ceiling enforcement, independent of rate limiting.
pub struct BudgetGuard {
    global_daily_limit: Option<f64>,
    provider_limits: HashMap<String, BudgetLimits>,
    book: Arc<Mutex<BudgetBook>>,
}

impl BudgetGuard {
    /// Create a guard with a global daily limit and per-provider limits.
    pub fn new(
        global_daily_limit: Option<f64>,
        provider_limits: HashMap<String, BudgetLimits>,
    ) -> Self {
        Self {
            global_daily_limit,
            provider_limits,
            book: Arc::new(Mutex::new(BudgetBook::default())),
        }
    }

    /// Check all tiers and reserve `estimate` dollars for an in-flight call.
    ///
    /// Returns `BudgetExceeded` on a hard breach. On success the returned
    /// [`Reservation`] carries any soft-breach warnings and must be
    /// settled with the actual cost once the call completes; dropping it
    /// unsettled releases the pending amount.
    pub fn try_reserve(&self, provider: &str, estimate: f64) -> Result<Reservation> {
        self.try_reserve_at(provider, estimate, Utc::now())
    }

    /// Deterministic-time variant of [`try_reserve`](Self::try_reserve).
    pub fn try_reserve_at(
        &self,
        provider: &str,
        estimate: f64,
        now: DateTime<Utc>,
    ) -> Result<Reservation> {
        let hour_key = now.timestamp().div_euclid(3600);
        let day_key = now.timestamp().div_euclid(86_400);
        let limits = self
            .provider_limits
            .get(provider)
            .copied()
            .unwrap_or_default();

        let mut warnings = Vec::new();
        let mut book = self.book.lock().expect("budget lock poisoned");
        book.global_day.roll(day_key);
        let (hour_used, day_used) = {
            let entry = book.providers.entry(provider.to_owned()).or_default();
            entry.hour.roll(hour_key);
            entry.day.roll(day_key);
            (entry.hour.used(), entry.day.used())
        };
        let global_used = book.global_day.used();

        // Tightest window first: hourly spike, provider daily, global daily.
        let tiers = [
            ("hourly_spike", limits.hourly_spike, hour_used, seconds_until_hour_reset(now)),
            ("provider_daily", limits.daily, day_used, seconds_until_day_reset(now)),
            ("global_daily", self.global_daily_limit, global_used, seconds_until_day_reset(now)),
        ];
        for (scope, limit, used, reset) in tiers {
            let Some(limit) = limit else { continue };
            let projected = used + estimate;
            if used >= limit - EPS || projected > limit + EPS {
                drop(book);
                metrics::counter!(telemetry::BUDGET_REJECTIONS_TOTAL,
                    "provider" => provider.to_owned(),
                    "scope" => scope,
                )
                .increment(1);
                warn!(
                    provider,
                    scope,
                    spent = used,
                    limit,
                    "budget limit reached, blocking call"
                );
                return Err(GatewayError::BudgetExceeded {
                    scope: format!("{scope}({provider})"),
                    spent: used,
                    limit,
                    retry_after: Some(Duration::from_secs(reset)),
                });
            }
            // Strictly above 80%; landing exactly on the line is quiet.
            if projected > SOFT_BREACH_FRACTION * limit + EPS {
                warnings.push(format!(
                    "{scope} at {:.0}% of ${limit:.2} limit",
                    projected / limit * 100.0
                ));
            }
        }

        let entry = book.providers.entry(provider.to_owned()).or_default();
        entry.hour.pending += estimate;
        entry.day.pending += estimate;
        book.global_day.pending += estimate;
        drop(book);

        for w in &warnings {
            warn!(provider, warning = %w, "budget soft breach");
        }
        Ok(Reservation {
            book: Arc::clone(&self.book),
            provider: provider.to_owned(),
            estimate,
            hour_key,
            day_key,
            warnings,
            resolved: false,
        })
    }

    /// Current headroom for a provider, for health reporting.
    pub fn remaining(&self, provider: &str) -> BudgetRemaining {
        self.remaining_at(provider, Utc::now())
    }

    /// Deterministic-time variant of [`remaining`](Self::remaining).
    pub fn remaining_at(&self, provider: &str, now: DateTime<Utc>) -> BudgetRemaining {
        let hour_key = now.timestamp().div_euclid(3600);
        let day_key = now.timestamp().div_euclid(86_400);
        let limits = self
            .provider_limits
            .get(provider)
            .copied()
            .unwrap_or_default();

        let mut book = self.book.lock().expect("budget lock poisoned");
        book.global_day.roll(day_key);
        let (hour_used, day_used) = {
            let entry = book.providers.entry(provider.to_owned()).or_default();
            entry.hour.roll(hour_key);
            entry.day.roll(day_key);
            (entry.hour.used(), entry.day.used())
        };

        let headroom = |limit: Option<f64>, used: f64| limit.map(|l| (l - used).max(0.0));
        BudgetRemaining {
            hourly: headroom(limits.hourly_spike, hour_used),
            provider_daily: headroom(limits.daily, day_used),
            global_daily: headroom(self.global_daily_limit, book.global_day.used()),
        }
    }

    /// Dollars actually spent by a provider today (excludes pending).
    ///
    /// Exposed so the materialized totals can be reconciled against
    /// [`UsageLedger::total_cost_since`].
    pub fn spent_today(&self, provider: &str) -> f64 {
        let day_key = Utc::now().timestamp().div_euclid(86_400);
        let mut book = self.book.lock().expect("budget lock poisoned");
        let entry = book.providers.entry(provider.to_owned()).or_default();
        entry.day.roll(day_key);
        entry.day.spent
    }
}

/// An in-flight estimated-cost reservation.
///
/// Settle with the actual cost on completion, or drop to release. A
/// cancelled caller therefore never records spend for work that did not
/// execute, while in-flight calls still count against the limits.
#[derive(Debug)]
pub struct Reservation {
    book: Arc<Mutex<BudgetBook>>,
    provider: String,
    estimate: f64,
    hour_key: i64,
    day_key: i64,
    warnings: Vec<String>,
    resolved: bool,
}

impl Reservation {
    /// Soft-breach warnings raised at check time.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Replace the pending estimate with the actual cost.
    pub fn settle(mut self, actual: f64) {
        self.resolve(Some(actual));
    }

    /// Release the reservation without recording spend.
    pub fn release(mut self) {
        self.resolve(None);
    }

    fn resolve(&mut self, actual: Option<f64>) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        let mut book = self.book.lock().expect("budget lock poisoned");
        if book.global_day.key == self.day_key {
            book.global_day.pending = (book.global_day.pending - self.estimate).max(0.0);
            if let Some(actual) = actual {
                book.global_day.spent += actual;
            }
        }
        if let Some(entry) = book.providers.get_mut(&self.provider) {
            if entry.hour.key == self.hour_key {
                entry.hour.pending = (entry.hour.pending - self.estimate).max(0.0);
                if let Some(actual) = actual {
                    entry.hour.spent += actual;
                }
            }
            if entry.day.key == self.day_key {
                entry.day.pending = (entry.day.pending - self.estimate).max(0.0);
                if let Some(actual) = actual {
                    entry.day.spent += actual;
                }
            }
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.resolve(None);
    }
}

fn seconds_until_hour_reset(now: DateTime<Utc>) -> u64 {
    (3600 - now.timestamp().rem_euclid(3600)) as u64
}

fn seconds_until_day_reset(now: DateTime<Utc>) -> u64 {
    (86_400 - now.timestamp().rem_euclid(86_400)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_roll_resets_totals() {
        let mut w = Window {
            key: 1,
            spent: 5.0,
            pending: 1.0,
        };
        w.roll(2);
        assert_eq!(w.spent, 0.0);
        assert_eq!(w.pending, 0.0);
        assert_eq!(w.key, 2);
    }

    #[test]
    fn reset_seconds_are_within_window() {
        let now = Utc::now();
        assert!(seconds_until_hour_reset(now) <= 3600);
        assert!(seconds_until_day_reset(now) <= 86_400);
    }
}
