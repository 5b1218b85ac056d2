//! # wheelretry-core
//!
//! Core library for wheelretry providing:
//! - A hashed timing wheel scheduler with one named worker thread
//! - Blocking fixed-delay retry tasks that share one scheduler
//! - Configuration types and a layered loader (wheelretry.yaml, env vars)
//!
//! ```rust
//! use std::sync::Arc;
//! use wheelretry_core::{HashedWheelTimer, RetryTask, TimeUnit};
//!
//! let timer = Arc::new(HashedWheelTimer::new());
//! let value = RetryTask::new("answer", || Ok::<_, String>(42), timer)
//!     .with_delay(1, TimeUnit::Seconds)
//!     .execute()
//!     .unwrap();
//! assert_eq!(value, 42);
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod scheduler;
pub mod types;
pub mod utils;

pub use config::ConfigLoader;
pub use error::{Error, Result};
pub use retry::{RetryError, RetryObserver, RetryTask, Retryable};
pub use scheduler::{HashedWheelTimer, Scheduler};
pub use types::{RetryConfig, SchedulerConfig, TimeUnit, WheelRetryConfig};
pub use utils::get_home_dir;
