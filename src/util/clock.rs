//! Wall-clock time source.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
///
/// Refresh scheduling reads this instead of a monotonic clock: after a
/// suspend/resume the wall clock has moved on, a monotonic counter may not.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn default_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}


#[cfg(test)]
mod tests {
    use super::test_support::TokioClock;
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time_and_jumps() {
        let base = Utc::now();
        let clock = TokioClock::new(base);
        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        assert_eq!(clock.now(), base + chrono::Duration::seconds(5));

        clock.jump(chrono::Duration::minutes(10));
        assert_eq!(clock.now(), base + chrono::Duration::seconds(605));
    }

    #[test]
    fn system_clock_is_close_to_utc_now() {
        let drift = (SystemClock.now() - Utc::now()).num_seconds().abs();
        assert!(drift < 5);
    }
}
