//! Blocking retry task driven by a shared scheduler
//!
//! A task makes its first attempt on the caller's thread. If that fails, the
//! task hands itself to the scheduler and the caller blocks; every later
//! attempt runs on the scheduler's worker, one delay apart, until an attempt
//! succeeds or the retry budget is spent. The caller then wakes with the value
//! or with the first error.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::completion::{Completion, Terminal};
use super::error::RetryError;
use super::observer::{RetryObserver, TracingObserver};
use super::operation::Retryable;
use crate::error::Result;
use crate::scheduler::{panic_message, Scheduler};
use crate::types::{RetryConfig, TimeUnit};

/// A retryable operation bound to a scheduler
///
/// Configure the task, then call [`execute`](Self::execute), which consumes it:
/// a task runs to a terminal state once and is never reused.
///
/// The first attempt is free. With `max_attempts = n`, an operation that never
/// succeeds is invoked `n + 1` times.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use wheelretry_core::retry::RetryTask;
/// use wheelretry_core::scheduler::{HashedWheelTimer, Scheduler};
/// use wheelretry_core::types::TimeUnit;
///
/// let timer: Arc<dyn Scheduler> = Arc::new(HashedWheelTimer::new());
///
/// let mut calls = 0;
/// let value = RetryTask::new(
///     "flaky",
///     move || {
///         calls += 1;
///         if calls < 2 { Err("not yet") } else { Ok(calls) }
///     },
///     timer,
/// )
/// .with_delay(150, TimeUnit::Milliseconds)
/// .with_max_attempts(3)
/// .execute()
/// .unwrap();
///
/// assert_eq!(value, 2);
/// ```
pub struct RetryTask<O, Obs = TracingObserver> {
    name: String,
    operation: O,
    scheduler: Arc<dyn Scheduler>,
    config: RetryConfig,
    observer: Obs,
}

impl<O> RetryTask<O, TracingObserver> {
    /// Create a task with the default policy and a tracing observer
    pub fn new(name: impl Into<String>, operation: O, scheduler: Arc<dyn Scheduler>) -> Self {
        let name = name.into();
        Self {
            observer: TracingObserver::new(name.clone()),
            name,
            operation,
            scheduler,
            config: RetryConfig::default(),
        }
    }
}

impl<O, Obs> RetryTask<O, Obs> {
    /// Set the fixed delay between attempts
    pub fn with_delay(mut self, delay: u64, unit: TimeUnit) -> Self {
        self.config.delay = delay;
        self.config.delay_unit = unit;
        self
    }

    /// Set the number of scheduled retries after the first attempt
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Replace the whole retry policy
    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the observer
    pub fn with_observer<Obs2>(self, observer: Obs2) -> RetryTask<O, Obs2> {
        RetryTask {
            name: self.name,
            operation: self.operation,
            scheduler: self.scheduler,
            config: self.config,
            observer,
        }
    }

    /// The task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The retry policy
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl<O, Obs> RetryTask<O, Obs>
where
    O: Retryable + Send + 'static,
    O::Output: Send + 'static,
    O::Error: fmt::Display,
    Obs: RetryObserver + 'static,
{
    /// Run the operation until it succeeds or the retry budget is spent
    ///
    /// Blocks the calling thread after a failed first attempt. Returns the
    /// first successful value, `RetryError::Config` if the policy is invalid
    /// for the scheduler (no attempt is made), or `RetryError::Failed` with
    /// the first attempt's error.
    ///
    /// Do not call this on an async runtime thread; use
    /// [`execute_async`](Self::execute_async) there.
    pub fn execute(mut self) -> std::result::Result<O::Output, RetryError<O::Error>> {
        self.config
            .validate(self.scheduler.tick_duration())
            .map_err(RetryError::Config)?;

        let total = total_attempts(self.config.max_attempts);
        let delay = self.config.delay_duration();
        let started = Instant::now();

        self.observer.on_attempt_start(1, total);
        let first_error = match self.operation.attempt() {
            Ok(value) => {
                self.observer.on_success(1, started.elapsed());
                return Ok(value);
            }
            Err(err) => err,
        };
        self.observer.on_attempt_failed(1, &first_error, delay);

        let shared = Arc::new(Shared {
            name: self.name,
            operation: Mutex::new(self.operation),
            observer: self.observer,
            scheduler: self.scheduler,
            delay,
            max_retries: self.config.max_attempts,
            retries: AtomicU32::new(0),
            completion: Completion::new(),
            started,
        });

        let terminal = match shared.schedule_next() {
            Ok(()) => shared.completion.wait(),
            Err(e) => {
                warn!(task = %shared.name, error = %e, "failed to schedule first retry");
                Terminal::Exhausted { attempts: 1 }
            }
        };

        match terminal {
            Terminal::Succeeded(value) => Ok(value),
            Terminal::Exhausted { attempts } => {
                shared.observer.on_exhausted(attempts, &first_error);
                Err(RetryError::failed(attempts, first_error))
            }
        }
    }
}

impl<O, Obs> RetryTask<O, Obs>
where
    O: Retryable + Send + 'static,
    O::Output: Send + 'static,
    O::Error: fmt::Display + Send + 'static,
    Obs: RetryObserver + 'static,
{
    /// Run [`execute`](Self::execute) on the tokio blocking pool
    ///
    /// A panic in the first attempt is resumed on the awaiting task.
    pub async fn execute_async(self) -> std::result::Result<O::Output, RetryError<O::Error>> {
        match tokio::task::spawn_blocking(move || self.execute()).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
            Err(e) => Err(RetryError::Interrupted(e.to_string())),
        }
    }
}

fn total_attempts(max_retries: u32) -> u32 {
    max_retries.saturating_add(1)
}

/// State shared between the blocked caller and scheduled attempts
struct Shared<O: Retryable, Obs: RetryObserver> {
    name: String,
    operation: Mutex<O>,
    observer: Obs,
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
    max_retries: u32,
    retries: AtomicU32,
    completion: Completion<Terminal<O::Output>>,
    started: Instant,
}

impl<O, Obs> Shared<O, Obs>
where
    O: Retryable + Send + 'static,
    O::Output: Send + 'static,
    O::Error: fmt::Display,
    Obs: RetryObserver + 'static,
{
    fn schedule_next(self: &Arc<Self>) -> Result<()> {
        let pending = PendingRetry {
            shared: Some(Arc::clone(self)),
        };
        self.scheduler
            .schedule(Box::new(move || pending.fire()), self.delay)
            .map(|_| ())
    }

    /// One fired timeout: a single scheduled attempt
    fn run_scheduled(self: &Arc<Self>) {
        if self.completion.is_complete() {
            debug!(task = %self.name, "ignoring timeout for a finished task");
            return;
        }

        let consumed = self.retries.load(Ordering::Acquire);
        if consumed >= self.max_retries {
            self.finish(Terminal::Exhausted {
                attempts: total_attempts(consumed),
            });
            return;
        }

        let retry = self.retries.fetch_add(1, Ordering::AcqRel) + 1;
        let attempt = total_attempts(retry);
        let total = total_attempts(self.max_retries);
        self.notify(|observer| observer.on_attempt_start(attempt, total));

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.operation.lock().attempt()));
        match outcome {
            Ok(Ok(value)) => {
                self.notify(|observer| observer.on_success(attempt, self.started.elapsed()));
                self.finish(Terminal::Succeeded(value));
            }
            Ok(Err(err)) => self.after_failure(retry, &err),
            Err(payload) => {
                let message = format!("operation panicked: {}", panic_message(payload.as_ref()));
                self.after_failure(retry, &message);
            }
        }
    }

    fn after_failure(self: &Arc<Self>, retry: u32, error: &dyn fmt::Display) {
        let attempt = total_attempts(retry);
        if retry >= self.max_retries {
            debug!(task = %self.name, attempt, error = %error, "final attempt failed");
            self.finish(Terminal::Exhausted { attempts: attempt });
            return;
        }

        self.notify(|observer| observer.on_attempt_failed(attempt, error, self.delay));
        if let Err(e) = self.schedule_next() {
            warn!(task = %self.name, attempt, error = %e, "failed to schedule retry");
            self.finish(Terminal::Exhausted { attempts: attempt });
        }
    }
}

impl<O: Retryable, Obs: RetryObserver> Shared<O, Obs> {
    fn finish(&self, terminal: Terminal<O::Output>) -> bool {
        let finished = self.completion.complete(terminal);
        if !finished {
            debug!(task = %self.name, "task already finished");
        }
        finished
    }

    /// The scheduler dropped a pending retry without running it
    fn abandon(&self) {
        let attempts = total_attempts(self.retries.load(Ordering::Acquire));
        if self.finish(Terminal::Exhausted { attempts }) {
            self.notify(|observer| observer.on_abandoned(attempts));
        }
    }

    /// Deliver an observer event off the caller's thread
    ///
    /// A panicking observer is logged and ignored; it must not stop the task
    /// from reaching a terminal state.
    fn notify(&self, event: impl FnOnce(&Obs)) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| event(&self.observer))) {
            warn!(
                task = %self.name,
                panic = %panic_message(payload.as_ref()),
                "retry observer panicked"
            );
        }
    }
}

/// The task registered with the scheduler for one retry
///
/// Dropping it without firing (cancelled timeout, stopped or refusing
/// scheduler) ends the task as exhausted, so the caller never waits on a
/// retry that can no longer run.
struct PendingRetry<O: Retryable, Obs: RetryObserver> {
    shared: Option<Arc<Shared<O, Obs>>>,
}

impl<O, Obs> PendingRetry<O, Obs>
where
    O: Retryable + Send + 'static,
    O::Output: Send + 'static,
    O::Error: fmt::Display,
    Obs: RetryObserver + 'static,
{
    fn fire(mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        // Nothing is pending once run_scheduled unwinds, so end the task here.
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| shared.run_scheduled())) {
            warn!(
                task = %shared.name,
                panic = %panic_message(payload.as_ref()),
                "scheduled attempt panicked"
            );
            shared.abandon();
        }
    }
}

impl<O: Retryable, Obs: RetryObserver> Drop for PendingRetry<O, Obs> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.abandon();
        }
    }
}
