//! When to refresh: lead time before expiry, with jitter.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::RefreshConfig;

/// Outcome of a delay computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDelay {
    /// Due now (or within the immediate threshold): refresh without a timer.
    Immediate,
    /// Arm a timer for this long.
    After(Duration),
}

/// Computes the delay until a proactive refresh.
///
/// `delay = max(0, expire_at - now - lead_time - jitter)`, where jitter is
/// drawn uniformly from `[-jitter_ms / 2, +jitter_ms / 2)`. Jitter spreads out
/// refreshes requested by several independent consumers of the same tokens.
#[derive(Debug, Clone, Copy)]
pub struct DelayCalculator {
    lead_time_ms: i64,
    jitter_ms: u64,
    immediate_threshold_ms: i64,
}

impl DelayCalculator {
    pub fn new(config: &RefreshConfig) -> Self {
        Self {
            lead_time_ms: saturating_i64(config.lead_time_ms),
            jitter_ms: config.jitter_ms,
            immediate_threshold_ms: saturating_i64(config.immediate_threshold_ms),
        }
    }

    /// Delay before jitter is applied, clamped at zero.
    pub fn base_delay_ms(&self, expire_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        self.delay_with_jitter_ms(expire_at, now, 0)
    }

    /// Delay for a given jitter sample, clamped at zero.
    pub fn delay_with_jitter_ms(
        &self,
        expire_at: DateTime<Utc>,
        now: DateTime<Utc>,
        jitter_ms: i64,
    ) -> i64 {
        let until_expiry = (expire_at - now).num_milliseconds();
        until_expiry
            .saturating_sub(self.lead_time_ms)
            .saturating_sub(jitter_ms)
            .max(0)
    }

    /// Draw a jitter sample from the configured window.
    pub fn sample_jitter_ms(&self) -> i64 {
        let half = saturating_i64(self.jitter_ms / 2);
        if half == 0 {
            return 0;
        }
        rand::rng().random_range(-half..half)
    }

    /// Classify a computed delay.
    pub fn classify(&self, delay_ms: i64) -> RefreshDelay {
        if delay_ms < self.immediate_threshold_ms {
            RefreshDelay::Immediate
        } else {
            RefreshDelay::After(Duration::from_millis(delay_ms as u64))
        }
    }

    /// Delay until refresh for tokens expiring at `expire_at`; a missing
    /// expiry counts as expiring now.
    pub fn compute(&self, expire_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> RefreshDelay {
        let expire_at = expire_at.unwrap_or(now);
        let delay_ms = self.delay_with_jitter_ms(expire_at, now, self.sample_jitter_ms());
        self.classify(delay_ms)
    }
}

impl Default for DelayCalculator {
    fn default() -> Self {
        Self::new(&RefreshConfig::default())
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
