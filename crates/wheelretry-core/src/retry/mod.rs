//! Fixed-delay retry tasks on a shared scheduler
//!
//! A [`RetryTask`] wraps a fallible operation and retries it at a fixed delay
//! until it succeeds or a maximum number of scheduled retries is spent. The
//! first attempt runs synchronously on the caller's thread; retries are
//! registered with a [`Scheduler`](crate::scheduler::Scheduler) so that many
//! tasks share one timer thread instead of sleeping their own.
//!
//! # Features
//!
//! - Blocking `execute` and a tokio `execute_async` adapter
//! - The first attempt's error is what the caller gets back on exhaustion
//! - Observable attempts via the `RetryObserver` trait
//! - Built-in `TracingObserver` for logging
//! - A task whose pending retry is dropped by a stopped scheduler still
//!   completes instead of blocking forever
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wheelretry_core::retry::{RetryError, RetryTask};
//! use wheelretry_core::scheduler::HashedWheelTimer;
//! use wheelretry_core::types::TimeUnit;
//!
//! fn fetch() -> Result<String, RetryError<std::io::Error>> {
//!     let timer = Arc::new(HashedWheelTimer::new());
//!
//!     RetryTask::new("fetch", || std::fs::read_to_string("/tmp/flag"), timer)
//!         .with_delay(10, TimeUnit::Seconds)
//!         .with_max_attempts(3)
//!         .execute()
//! }
//! ```

mod completion;
mod error;
mod observer;
mod operation;
mod task;

pub use error::RetryError;
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use operation::Retryable;
pub use task::RetryTask;

#[cfg(test)]
mod tests;
