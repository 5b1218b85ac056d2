//! Retry observation and logging
//!
//! This module provides the `RetryObserver` trait for monitoring retry attempts
//! and a `TracingObserver` implementation that logs using the `tracing` crate.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Observer trait for retry task events
///
/// Attempts are numbered from 1, where attempt 1 is the synchronous first try
/// on the caller's thread and later attempts run on the scheduler's worker.
/// `total` is the largest attempt number the task can reach.
///
/// Callbacks are fire-and-forget. They cannot return errors into the retry
/// path and should not block: scheduled attempts share one worker thread.
///
/// # Example
///
/// ```rust
/// use std::fmt::Display;
/// use std::time::Duration;
/// use wheelretry_core::retry::RetryObserver;
///
/// struct MetricsObserver {
///     // Your metrics client here
/// }
///
/// impl RetryObserver for MetricsObserver {
///     fn on_attempt_start(&self, attempt: u32, total: u32) {
///         // Record attempt start metric
///     }
///
///     fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
///         // Record failure metric
///     }
///
///     fn on_success(&self, attempt: u32, total_duration: Duration) {
///         // Record success metric with latency
///     }
///
///     fn on_exhausted(&self, attempts: u32, first_error: &dyn Display) {
///         // Record exhaustion metric
///     }
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// Called when an attempt is about to start
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number (1-indexed)
    /// * `total` - The largest attempt number the task can reach
    fn on_attempt_start(&self, attempt: u32, total: u32);

    /// Called when an attempt fails and another attempt has been planned
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number that failed (1-indexed)
    /// * `error` - The error that caused the failure
    /// * `delay` - The delay before the next attempt
    fn on_attempt_failed(&self, attempt: u32, error: &dyn fmt::Display, delay: Duration);

    /// Called when the operation succeeds
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number that succeeded (1-indexed)
    /// * `total_duration` - Time since the first attempt started
    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// Called once on the caller's thread when the task ends without success
    ///
    /// # Arguments
    ///
    /// * `attempts` - Total number of attempts made
    /// * `first_error` - The error from the first attempt, which is what the
    ///   caller receives
    fn on_exhausted(&self, attempts: u32, first_error: &dyn fmt::Display);

    /// Called when a pending retry is dropped by its scheduler without running
    ///
    /// This happens when the scheduler is stopped, refuses the registration,
    /// or the timeout is cancelled. The task then ends as exhausted.
    fn on_abandoned(&self, attempts: u32) {
        let _ = attempts;
    }
}

/// A no-op observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _total: u32) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn fmt::Display, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _first_error: &dyn fmt::Display) {}
}

/// An observer that logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_attempt_failed`: WARN
/// - `on_success`: INFO (after a retry) or DEBUG (first attempt)
/// - `on_exhausted`: ERROR
/// - `on_abandoned`: WARN
///
/// # Example
///
/// ```rust
/// use wheelretry_core::retry::TracingObserver;
///
/// // Create with the task name for log context
/// let observer = TracingObserver::new("fetch-manifest");
/// assert_eq!(observer.task(), "fetch-manifest");
/// ```
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the task being retried (for log context)
    task: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into() }
    }

    /// Get the task name
    pub fn task(&self) -> &str {
        &self.task
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, total: u32) {
        tracing::debug!(
            task = %self.task,
            attempt = attempt,
            total = total,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn fmt::Display, delay: Duration) {
        tracing::warn!(
            task = %self.task,
            attempt = attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                task = %self.task,
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                task = %self.task,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, first_error: &dyn fmt::Display) {
        tracing::error!(
            task = %self.task,
            attempts = attempts,
            error = %first_error,
            "all retry attempts exhausted"
        );
    }

    fn on_abandoned(&self, attempts: u32) {
        tracing::warn!(
            task = %self.task,
            attempts = attempts,
            "pending retry dropped by the scheduler"
        );
    }
}

/// An observer that counts retry events
///
/// Useful for testing and metrics collection.
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    failures: AtomicU32,
    successes: AtomicU32,
    exhaustions: AtomicU32,
    abandonments: AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of attempt starts
    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    /// Get the number of retried failures
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Get the number of successes
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Get the number of exhaustions
    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    /// Get the number of abandoned retries
    pub fn abandonments(&self) -> u32 {
        self.abandonments.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _attempt: u32, _total: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn fmt::Display, _delay: Duration) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _attempts: u32, _first_error: &dyn fmt::Display) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_abandoned(&self, _attempts: u32) {
        self.abandonments.fetch_add(1, Ordering::SeqCst);
    }
}

/// Implement RetryObserver for Arc<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, attempt: u32, total: u32) {
        (**self).on_attempt_start(attempt, total)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn fmt::Display, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, first_error: &dyn fmt::Display) {
        (**self).on_exhausted(attempts, first_error)
    }

    fn on_abandoned(&self, attempts: u32) {
        (**self).on_abandoned(attempts)
    }
}

/// Implement RetryObserver for Box<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_attempt_start(&self, attempt: u32, total: u32) {
        (**self).on_attempt_start(attempt, total)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn fmt::Display, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, first_error: &dyn fmt::Display) {
        (**self).on_exhausted(attempts, first_error)
    }

    fn on_abandoned(&self, attempts: u32) {
        (**self).on_abandoned(attempts)
    }
}
