//! Hashed timing wheel
//!
//! Timeouts are bucketed by the tick in which they fall due. Registration and
//! cancellation are O(1) regardless of how many timeouts are pending; the price
//! is that a timeout fires on the first tick boundary after its deadline, never
//! earlier, and up to one tick late.
//!
//! `schedule` only appends to a short-locked pending queue. One worker thread
//! owns the buckets: each tick it moves pending timeouts into their buckets and
//! fires the due ones sequentially, with no shared lock held while a task runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::thread_factory::NamedThreadFactory;
use super::timeout::Timeout;
use super::{Scheduler, TimerTask};
use crate::error::{Error, Result};
use crate::types::SchedulerConfig;

const WORKER_INIT: u8 = 0;
const WORKER_STARTED: u8 = 1;
const WORKER_SHUTDOWN: u8 = 2;

/// Upper bound on pending timeouts moved into buckets per tick, so a burst of
/// registrations cannot starve expiry.
const MAX_TRANSFER_PER_TICK: usize = 100_000;

/// A shared timer backed by a hashed timing wheel and one worker thread
///
/// The worker is spawned on the first `schedule` (or an explicit `start`) and
/// runs until `stop` or until the timer is dropped. Share one timer between
/// any number of retry tasks with `Arc<HashedWheelTimer>`.
///
/// # Example
///
/// ```rust
/// use std::sync::mpsc;
/// use std::time::Duration;
/// use wheelretry_core::scheduler::{HashedWheelTimer, Scheduler};
///
/// let timer = HashedWheelTimer::new();
/// let (tx, rx) = mpsc::channel();
/// timer
///     .schedule(Box::new(move || tx.send("fired").unwrap()), Duration::from_millis(150))
///     .unwrap();
/// assert_eq!(rx.recv().unwrap(), "fired");
/// timer.stop().unwrap();
/// ```
pub struct HashedWheelTimer {
    shared: Arc<WheelShared>,
    factory: NamedThreadFactory,
    worker: Mutex<Option<JoinHandle<Vec<Timeout>>>>,
}

struct WheelShared {
    tick: Duration,
    wheel_len: u64,
    max_pending: Option<usize>,
    state: AtomicU8,
    start_time: OnceLock<Instant>,
    worker_thread: OnceLock<ThreadId>,
    pending: Mutex<VecDeque<Timeout>>,
    pending_count: Arc<AtomicUsize>,
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl HashedWheelTimer {
    /// Create a timer with the default configuration (100ms tick, 512 buckets)
    pub fn new() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }

    /// Create a timer from a validated configuration
    pub fn with_config(config: &SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: &SchedulerConfig) -> Self {
        let wheel_len = u64::from(config.ticks_per_wheel.max(1)).next_power_of_two();
        Self {
            shared: Arc::new(WheelShared {
                tick: config.tick_duration().max(Duration::from_millis(1)),
                wheel_len,
                max_pending: config.max_pending_timeouts,
                state: AtomicU8::new(WORKER_INIT),
                start_time: OnceLock::new(),
                worker_thread: OnceLock::new(),
                pending: Mutex::new(VecDeque::new()),
                pending_count: Arc::new(AtomicUsize::new(0)),
                stopped: Mutex::new(false),
                wake: Condvar::new(),
            }),
            factory: NamedThreadFactory::new(config.thread_name_prefix.clone()),
            worker: Mutex::new(None),
        }
    }

    /// Start the worker thread if it is not running yet
    pub fn start(&self) -> Result<()> {
        match self.shared.state.compare_exchange(
            WORKER_INIT,
            WORKER_STARTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.shared.start_time.get_or_init(Instant::now);
                let worker = Worker::new(self.shared.clone());
                match self.factory.spawn(move || worker.run()) {
                    Ok(handle) => {
                        *self.worker.lock() = Some(handle);
                        Ok(())
                    }
                    Err(e) => {
                        self.shared.state.store(WORKER_SHUTDOWN, Ordering::Release);
                        Err(e)
                    }
                }
            }
            Err(WORKER_STARTED) => Ok(()),
            Err(_) => Err(Error::SchedulerStopped),
        }
    }

    /// Stop the worker and return the timeouts that never fired
    ///
    /// Must not be called from a timer task: the worker cannot join itself.
    /// Dropping the returned timeouts drops their tasks without running them.
    pub fn stop(&self) -> Result<Vec<Timeout>> {
        if self.is_worker_thread() {
            return Err(Error::invalid_state(
                "stop() cannot be called from the timer worker thread",
            ));
        }

        if self.shared.state.swap(WORKER_SHUTDOWN, Ordering::AcqRel) != WORKER_STARTED {
            return Ok(Vec::new());
        }
        self.shared.signal_stop();

        let handle = self.worker.lock().take();
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::invalid_state("timer worker thread panicked")),
            None => Ok(Vec::new()),
        }
    }

    /// Number of timeouts scheduled but neither fired nor cancelled
    pub fn pending_timeouts(&self) -> usize {
        self.shared.pending_count.load(Ordering::Acquire)
    }

    /// Whether `stop` has been called
    pub fn is_stopped(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == WORKER_SHUTDOWN
    }

    /// Number of buckets in the wheel
    pub fn wheel_len(&self) -> u64 {
        self.shared.wheel_len
    }

    fn is_worker_thread(&self) -> bool {
        self.shared.worker_thread.get() == Some(&thread::current().id())
    }

    fn reserve_pending_slot(&self) -> Result<()> {
        let pending = self.shared.pending_count.fetch_add(1, Ordering::AcqRel) + 1;
        match self.shared.max_pending {
            Some(max) if pending > max => {
                self.shared.pending_count.fetch_sub(1, Ordering::AcqRel);
                Err(Error::TooManyPendingTimeouts {
                    pending: pending - 1,
                    max,
                })
            }
            _ => Ok(()),
        }
    }
}

impl Default for HashedWheelTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for HashedWheelTimer {
    fn schedule(&self, task: TimerTask, delay: Duration) -> Result<Timeout> {
        self.reserve_pending_slot()?;
        if let Err(e) = self.start() {
            self.shared.pending_count.fetch_sub(1, Ordering::AcqRel);
            return Err(e);
        }

        let start = *self.shared.start_time.get_or_init(Instant::now);
        let deadline = start.elapsed().saturating_add(delay);
        let timeout = Timeout::new(task, deadline, Some(self.shared.pending_count.clone()));
        self.shared.pending.lock().push_back(timeout.clone());

        // Lost a race with stop(): the worker may already have drained the queue.
        if self.is_stopped() {
            timeout.cancel();
            return Err(Error::SchedulerStopped);
        }

        trace!(delay = ?delay, deadline = ?deadline, "timeout scheduled");
        Ok(timeout)
    }

    fn tick_duration(&self) -> Duration {
        self.shared.tick
    }
}

impl Drop for HashedWheelTimer {
    fn drop(&mut self) {
        if self.is_worker_thread() {
            // Last handle released by a task: the worker exits after it returns.
            self.shared.state.store(WORKER_SHUTDOWN, Ordering::Release);
            self.shared.signal_stop();
            return;
        }
        let _ = self.stop();
    }
}

impl WheelShared {
    fn signal_stop(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.wake.notify_all();
    }
}

struct Bucketed {
    timeout: Timeout,
    remaining_rounds: u64,
}

struct Worker {
    shared: Arc<WheelShared>,
    buckets: Vec<Vec<Bucketed>>,
    mask: u64,
    tick: u64,
}

impl Worker {
    fn new(shared: Arc<WheelShared>) -> Self {
        let wheel_len = shared.wheel_len;
        Self {
            buckets: (0..wheel_len).map(|_| Vec::new()).collect(),
            mask: wheel_len - 1,
            tick: 0,
            shared,
        }
    }

    fn run(mut self) -> Vec<Timeout> {
        let _ = self.shared.worker_thread.set(thread::current().id());
        debug!(
            tick_ms = self.shared.tick.as_millis() as u64,
            wheel_len = self.shared.wheel_len,
            "timing wheel worker started"
        );

        while self.wait_for_next_tick() {
            let idx = (self.tick & self.mask) as usize;
            self.transfer_pending();
            self.expire_bucket(idx);
            self.tick = self.tick.wrapping_add(1);
        }

        let unprocessed = self.drain_unprocessed();
        debug!(
            unprocessed = unprocessed.len(),
            "timing wheel worker stopped"
        );
        unprocessed
    }

    /// Sleep until the current tick's deadline; `false` once stopped
    fn wait_for_next_tick(&self) -> bool {
        let tick_nanos = saturating_nanos(self.shared.tick);
        let deadline = Duration::from_nanos(tick_nanos.saturating_mul(self.tick + 1));
        let start = *self.shared.start_time.get_or_init(Instant::now);

        let mut stopped = self.shared.stopped.lock();
        loop {
            if *stopped {
                return false;
            }
            let now = start.elapsed();
            if now >= deadline {
                return true;
            }
            self.shared.wake.wait_for(&mut stopped, deadline - now);
        }
    }

    fn transfer_pending(&mut self) {
        let batch: Vec<Timeout> = {
            let mut pending = self.shared.pending.lock();
            let n = pending.len().min(MAX_TRANSFER_PER_TICK);
            pending.drain(..n).collect()
        };

        let tick_nanos = saturating_nanos(self.shared.tick);
        for timeout in batch {
            if timeout.is_cancelled() {
                continue;
            }
            let calculated = saturating_nanos(timeout.deadline()) / tick_nanos;
            let remaining_rounds = calculated.saturating_sub(self.tick) / self.shared.wheel_len;
            // Overdue timeouts land in the current bucket.
            let idx = (calculated.max(self.tick) & self.mask) as usize;
            self.buckets[idx].push(Bucketed {
                timeout,
                remaining_rounds,
            });
        }
    }

    fn expire_bucket(&mut self, idx: usize) {
        let entries = std::mem::take(&mut self.buckets[idx]);
        let mut kept = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if entry.timeout.is_cancelled() {
                continue;
            }
            if entry.remaining_rounds == 0 {
                entry.timeout.expire();
            } else {
                entry.remaining_rounds -= 1;
                kept.push(entry);
            }
        }
        self.buckets[idx] = kept;
    }

    fn drain_unprocessed(&mut self) -> Vec<Timeout> {
        let mut unprocessed: Vec<Timeout> = self
            .buckets
            .iter_mut()
            .flat_map(|bucket| bucket.drain(..))
            .map(|entry| entry.timeout)
            .collect();
        unprocessed.extend(self.shared.pending.lock().drain(..));
        unprocessed.retain(|timeout| !timeout.is_cancelled() && !timeout.is_expired());
        unprocessed
    }
}

/// Nanoseconds in `d`, capped at `u64::MAX` (about 584 years)
///
/// A capped deadline lands in the last reachable tick instead of wrapping
/// into a near one.
fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
