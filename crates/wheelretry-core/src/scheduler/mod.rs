//! Delayed task scheduling
//!
//! The [`Scheduler`] trait is the seam between retry tasks and whatever fires
//! their delayed attempts:
//!
//! - [`HashedWheelTimer`]: the production scheduler, a hashed timing wheel with
//!   one named worker thread, meant to be shared by every retry task
//! - [`ImmediateScheduler`]: runs tasks inline, for deterministic tests
//!
//! Schedulers are passed explicitly (usually as `Arc<dyn Scheduler>`); there is
//! no process-wide instance.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

mod immediate;
mod thread_factory;
mod timeout;
mod wheel;

pub use immediate::ImmediateScheduler;
pub use thread_factory::NamedThreadFactory;
pub use timeout::Timeout;
pub use wheel::HashedWheelTimer;

pub(crate) use timeout::panic_message;

/// A one-shot task run by a scheduler
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Registers one-shot tasks to run after a delay
pub trait Scheduler: Send + Sync {
    /// Run `task` once, no earlier than `delay` from now
    ///
    /// The delay is rounded up to the scheduler's tick resolution. A task that
    /// panics is contained by the scheduler and does not affect other tasks.
    fn schedule(&self, task: TimerTask, delay: Duration) -> Result<Timeout>;

    /// Smallest delay the scheduler can distinguish
    fn tick_duration(&self) -> Duration;
}

impl<T: Scheduler + ?Sized> Scheduler for Arc<T> {
    fn schedule(&self, task: TimerTask, delay: Duration) -> Result<Timeout> {
        (**self).schedule(task, delay)
    }

    fn tick_duration(&self) -> Duration {
        (**self).tick_duration()
    }
}
