//! Wall-clock timers with a single pending slot.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::util::clock::Clock;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Lifecycle of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Pending,
    Fired,
    Cancelled,
}

/// Cancel handle for one armed timer.
///
/// Clones refer to the same timer. [`TimerHandle::cancel`] is idempotent and
/// has no effect once the timer has fired.
#[derive(Clone)]
pub struct TimerHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: u64,
    deadline: DateTime<Utc>,
    cancel: CancellationToken,
    state: AtomicU8,
}

impl TimerHandle {
    fn new(id: u64, deadline: DateTime<Utc>, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                deadline,
                cancel,
                state: AtomicU8::new(PENDING),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Wall-clock time at which the timer fires.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.inner.deadline
    }

    pub fn cancel(&self) {
        if self.transition(CANCELLED) {
            self.inner.cancel.cancel();
        }
    }

    pub fn state(&self) -> TimerState {
        match self.inner.state.load(Ordering::Acquire) {
            FIRED => TimerState::Fired,
            CANCELLED => TimerState::Cancelled,
            // A cancelled parent token wins even before the timer task notices.
            _ if self.inner.cancel.is_cancelled() => TimerState::Cancelled,
            _ => TimerState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == TimerState::Pending
    }

    fn transition(&self, to: u8) -> bool {
        self.inner
            .state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn fire(&self) -> bool {
        !self.inner.cancel.is_cancelled() && self.transition(FIRED)
    }
}

impl PartialEq for TimerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for TimerHandle {}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.inner.id)
            .field("deadline", &self.inner.deadline)
            .field("state", &self.state())
            .finish()
    }
}

/// Keeps at most one pending timer.
///
/// Arming a timer cancels whichever timer was pending before. A fired or
/// cancelled timer leaves the slot.
pub struct TimerManager {
    current: Arc<Mutex<Option<TimerHandle>>>,
    next_id: AtomicU64,
}

impl Default for TimerManager {
    fn default() -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` once the wall clock reaches `deadline`.
    ///
    /// The timer is linked to `cancel`: cancelling it before the deadline
    /// cancels the timer and `job` never runs. Sleeps last at most `tick`
    /// before the clock is read again, so time spent suspended still counts.
    pub fn arm<F, Fut>(
        &self,
        clock: Arc<dyn Clock>,
        deadline: DateTime<Utc>,
        tick: Duration,
        cancel: Option<&CancellationToken>,
        job: F,
    ) -> TimerHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = cancel
            .map(CancellationToken::child_token)
            .unwrap_or_else(CancellationToken::new);
        let handle = TimerHandle::new(id, deadline, token.clone());

        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle.clone());
        if let Some(previous) = previous {
            previous.cancel();
            tracing::debug!(id = previous.id(), "cancelled previously armed timer");
        }

        let slot = Arc::clone(&self.current);
        let timer = handle.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    timer.transition(CANCELLED);
                    release(&slot, &timer);
                    tracing::debug!(id = timer.id(), "timer cancelled before firing");
                }
                _ = sleep_until_wall_clock(clock.as_ref(), deadline, tick) => {
                    release(&slot, &timer);
                    if timer.fire() {
                        job().await;
                    }
                }
            }
        });
        handle
    }

    /// Cancel the pending timer, if any. Returns whether one was cancelled.
    pub fn cancel_current(&self) -> bool {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match current {
            Some(handle) if handle.is_pending() => {
                handle.cancel();
                true
            }
            _ => false,
        }
    }

    /// The pending timer, if one is armed.
    pub fn current(&self) -> Option<TimerHandle> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|handle| handle.is_pending())
            .cloned()
    }
}

fn release(slot: &Mutex<Option<TimerHandle>>, timer: &TimerHandle) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.as_ref() == Some(timer) {
        *slot = None;
    }
}

/// Sleep until `clock` reads at least `deadline`.
pub async fn sleep_until_wall_clock(clock: &dyn Clock, deadline: DateTime<Utc>, tick: Duration) {
    loop {
        let Ok(remaining) = (deadline - clock.now()).to_std() else {
            return;
        };
        if remaining.is_zero() {
            return;
        }
        tokio::time::sleep(remaining.min(tick)).await;
    }
}
