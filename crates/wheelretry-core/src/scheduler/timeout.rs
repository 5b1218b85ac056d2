//! Handles to registered timer tasks

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::TimerTask;

const STATE_INIT: u8 = 0;
const STATE_CANCELLED: u8 = 1;
const STATE_EXPIRED: u8 = 2;

/// Handle to a task registered with a [`Scheduler`](super::Scheduler)
///
/// A timeout ends in exactly one of two states: expired (the task ran) or
/// cancelled (the task was dropped without running). Both transitions are
/// compare-and-set guarded, so a racing `cancel` and expiry have one winner.
#[derive(Clone)]
pub struct Timeout {
    inner: Arc<TimeoutInner>,
}

struct TimeoutInner {
    state: AtomicU8,
    deadline: Duration,
    task: Mutex<Option<TimerTask>>,
    pending: Option<Arc<AtomicUsize>>,
}

impl Timeout {
    /// `deadline` is measured from the owning timer's start time.
    pub(crate) fn new(
        task: TimerTask,
        deadline: Duration,
        pending: Option<Arc<AtomicUsize>>,
    ) -> Self {
        Self {
            inner: Arc::new(TimeoutInner {
                state: AtomicU8::new(STATE_INIT),
                deadline,
                task: Mutex::new(Some(task)),
                pending,
            }),
        }
    }

    /// Cancel the timeout
    ///
    /// Returns `true` if this call cancelled it. Returns `false` if it had
    /// already expired or been cancelled. The task is dropped without running.
    pub fn cancel(&self) -> bool {
        if !self.transition(STATE_CANCELLED) {
            return false;
        }
        // Dropped outside the lock: a task's destructor may schedule or cancel.
        let task = self.inner.task.lock().take();
        drop(task);
        true
    }

    /// Whether the timeout was cancelled before it fired
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == STATE_CANCELLED
    }

    /// Whether the timeout has fired
    pub fn is_expired(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == STATE_EXPIRED
    }

    /// Deadline relative to the owning timer's start time
    pub fn deadline(&self) -> Duration {
        self.inner.deadline
    }

    /// Run the task if the timeout is still live
    ///
    /// A panicking task is caught and logged; it never unwinds into the caller.
    pub(crate) fn expire(&self) {
        if !self.transition(STATE_EXPIRED) {
            return;
        }
        let Some(task) = self.inner.task.lock().take() else {
            return;
        };
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
            tracing::warn!(
                deadline_ms = self.inner.deadline.as_millis() as u64,
                panic = %panic_message(panic.as_ref()),
                "timer task panicked"
            );
        }
    }

    fn transition(&self, to: u8) -> bool {
        let won = self
            .inner
            .state
            .compare_exchange(STATE_INIT, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            if let Some(pending) = &self.inner.pending {
                pending.fetch_sub(1, Ordering::AcqRel);
            }
        }
        won
    }
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.state.load(Ordering::Acquire) {
            STATE_CANCELLED => "cancelled",
            STATE_EXPIRED => "expired",
            _ => "pending",
        };
        f.debug_struct("Timeout")
            .field("deadline", &self.inner.deadline)
            .field("state", &state)
            .finish()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
