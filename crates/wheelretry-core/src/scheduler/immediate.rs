//! Deterministic scheduler that runs tasks inline

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::timeout::Timeout;
use super::{Scheduler, TimerTask};
use crate::error::Result;

thread_local! {
    static QUEUED: RefCell<VecDeque<Timeout>> = const { RefCell::new(VecDeque::new()) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// A scheduler that ignores delays and runs every task on the calling thread
///
/// Meant for tests: a retry task driven by it completes without sleeping and
/// before `schedule` returns. It still reports a tick duration so configuration
/// validation behaves as it does against a real timer.
///
/// A task that schedules another task from inside its own run is queued and
/// run after it returns, by the outermost `schedule` call. Long retry chains
/// therefore run in a loop and never deepen the stack.
#[derive(Debug)]
pub struct ImmediateScheduler {
    tick: Duration,
    scheduled: AtomicUsize,
}

impl ImmediateScheduler {
    /// Create a scheduler reporting the default 100ms tick
    pub fn new() -> Self {
        Self::with_tick(Duration::from_millis(100))
    }

    /// Create a scheduler reporting the given tick
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick,
            scheduled: AtomicUsize::new(0),
        }
    }

    /// Number of tasks registered so far
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }
}

impl Default for ImmediateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, task: TimerTask, delay: Duration) -> Result<Timeout> {
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        let timeout = Timeout::new(task, delay, None);
        QUEUED.with(|queue| queue.borrow_mut().push_back(timeout.clone()));

        if !DRAINING.with(|draining| draining.replace(true)) {
            while let Some(next) = QUEUED.with(|queue| queue.borrow_mut().pop_front()) {
                next.expire();
            }
            DRAINING.with(|draining| draining.set(false));
        }
        Ok(timeout)
    }

    fn tick_duration(&self) -> Duration {
        self.tick
    }
}
