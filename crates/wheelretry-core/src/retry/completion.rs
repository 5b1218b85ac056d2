//! One-shot completion signal between the scheduler worker and the caller

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

/// How a retry task finished
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Terminal<T> {
    /// An attempt produced a value
    Succeeded(T),
    /// No attempt succeeded; `attempts` counts every invocation made
    Exhausted { attempts: u32 },
}

/// Write-once slot with a blocking wait
///
/// The first `complete` wins: it flips the terminal flag with compare-and-set,
/// stores the value and wakes the waiter under the slot lock, so a waiter that
/// has checked the slot cannot miss the notification. Later calls return
/// `false` and leave the stored value untouched.
pub(crate) struct Completion<T> {
    terminal: AtomicBool,
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Completion<T> {
    pub(crate) fn new() -> Self {
        Self {
            terminal: AtomicBool::new(false),
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store `value` and wake the waiter; `false` if already completed
    pub(crate) fn complete(&self, value: T) -> bool {
        if self
            .terminal
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let mut slot = self.slot.lock();
        *slot = Some(value);
        self.ready.notify_all();
        true
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    /// Block until completed, then take the value
    ///
    /// Loops on the slot, so spurious wakeups are harmless. There is no
    /// timeout: the caller relies on the retry budget to force completion.
    pub(crate) fn wait(&self) -> T {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            self.ready.wait(&mut slot);
        }
    }
}
