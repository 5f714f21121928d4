//! At-most-one-in-flight execution with a shared outcome.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::RefreshError;

/// Settle-once outcome shared by every caller of one in-flight operation.
pub type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T, RefreshError>>>;

type Slot<T> = Arc<Mutex<Option<InFlight<T>>>>;

struct InFlight<T> {
    id: u64,
    outcome: SharedOutcome<T>,
}

/// Guard against overlapping runs of one operation family.
///
/// The first caller starts the operation on its own tokio task; callers that
/// arrive before it settles get a clone of the same [`SharedOutcome`] and
/// their own arguments are discarded. The slot is emptied when the operation
/// settles, whether it succeeded, failed, panicked, or was aborted.
///
/// Must be used from within a tokio runtime.
pub struct SingleFlight<T> {
    family: &'static str,
    slot: Slot<T>,
    next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Join the in-flight operation, or start one with `start`.
    ///
    /// `start` is only called when nothing is in flight.
    pub fn run<F, Fut>(&self, start: F) -> SharedOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RefreshError>> + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(in_flight) = slot.as_ref() {
            tracing::trace!(family = self.family, id = in_flight.id, "joining in-flight operation");
            return in_flight.outcome.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let clear = ClearOnSettle {
            slot: Arc::clone(&self.slot),
            id,
        };
        let operation = start();
        let task = tokio::spawn(async move {
            let _clear = clear;
            operation.await
        });
        let outcome = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => Err(RefreshError::from(err)),
            }
        }
        .boxed()
        .shared();

        tracing::trace!(family = self.family, id, "started operation");
        *slot = Some(InFlight {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }

    pub fn is_in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn family(&self) -> &'static str {
        self.family
    }
}

/// Empties the slot when the owning task finishes or unwinds.
struct ClearOnSettle<T> {
    slot: Slot<T>,
    id: u64,
}

impl<T> Drop for ClearOnSettle<T> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().map(|in_flight| in_flight.id) == Some(self.id) {
            *slot = None;
        }
    }
}
