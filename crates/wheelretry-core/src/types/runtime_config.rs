//! Runtime configuration types for the scheduler and retry tasks
//!
//! These types define the operational parameters of the timing wheel and the
//! default policy applied to every retry task.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WheelRetryConfig {
    /// Timing wheel configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Default retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl WheelRetryConfig {
    /// Validate the configuration as a whole
    ///
    /// Applies the same rules the timer enforces at construction and the retry
    /// task enforces at start, and reports every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = self.scheduler.problems();
        problems.extend(self.retry.problems(self.scheduler.tick_duration()));

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_config_list(problems))
        }
    }
}

/// Hashed timing wheel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Duration of one tick in milliseconds
    #[serde(default = "default_tick_duration_ms")]
    pub tick_duration_ms: u64,

    /// Number of buckets in the wheel (rounded up to a power of two)
    #[serde(default = "default_ticks_per_wheel")]
    pub ticks_per_wheel: u32,

    /// Maximum number of pending timeouts (unbounded when absent)
    #[serde(default)]
    pub max_pending_timeouts: Option<usize>,

    /// Prefix for the worker thread name
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_duration_ms: default_tick_duration_ms(),
            ticks_per_wheel: default_ticks_per_wheel(),
            max_pending_timeouts: None,
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl SchedulerConfig {
    /// Largest supported wheel size
    pub const MAX_TICKS_PER_WHEEL: u32 = 1 << 30;

    /// Tick duration as a `Duration`
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_duration_ms)
    }

    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_config_list(problems))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.tick_duration_ms == 0 {
            problems.push("tick-duration-ms must be greater than 0".to_string());
        }
        if self.ticks_per_wheel == 0 {
            problems.push("ticks-per-wheel must be greater than 0".to_string());
        }
        if self.ticks_per_wheel > Self::MAX_TICKS_PER_WHEEL {
            problems.push(format!(
                "ticks-per-wheel may not be greater than {}",
                Self::MAX_TICKS_PER_WHEEL
            ));
        }
        if self.max_pending_timeouts == Some(0) {
            problems.push("max-pending-timeouts must be greater than 0 when set".to_string());
        }
        if self.thread_name_prefix.trim().is_empty() {
            problems.push("thread-name-prefix must not be empty".to_string());
        }
        problems
    }
}

fn default_tick_duration_ms() -> u64 {
    100
}
fn default_ticks_per_wheel() -> u32 {
    512
}
fn default_thread_name_prefix() -> String {
    "retry-task".to_string()
}

/// Retry policy for a task
///
/// The synchronous first attempt does not count against `max_attempts`: a task
/// that keeps failing invokes its operation `1 + max_attempts` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Maximum number of scheduled retries after the first attempt
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts, in `delay_unit`
    #[serde(default = "default_delay")]
    pub delay: u64,

    /// Unit of `delay`
    #[serde(default)]
    pub delay_unit: TimeUnit,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_delay(),
            delay_unit: TimeUnit::default(),
        }
    }
}

impl RetryConfig {
    /// The configured delay as a `Duration`
    pub fn delay_duration(&self) -> Duration {
        self.delay_unit.to_duration(self.delay)
    }

    /// Number of operation invocations when every attempt fails
    pub fn total_invocations(&self) -> u64 {
        1 + u64::from(self.max_attempts)
    }

    /// Validate the policy against a scheduler tick
    pub fn validate(&self, tick: Duration) -> Result<()> {
        let problems = self.problems(tick);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_config_list(problems))
        }
    }

    fn problems(&self, tick: Duration) -> Vec<String> {
        let mut problems = Vec::new();
        // Compared in whole milliseconds: sub-millisecond remainders are dropped.
        let delay_ms = self.delay_unit.to_millis(self.delay);
        if delay_ms <= tick.as_millis() {
            problems.push(format!(
                "delay of {} {} ({}ms) must be greater than the scheduler tick duration ({}ms)",
                self.delay,
                self.delay_unit,
                delay_ms,
                tick.as_millis()
            ));
        }
        if self.max_attempts < 1 {
            problems.push("max-attempts must be at least 1".to_string());
        }
        problems
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay() -> u64 {
    150
}

/// Time unit for configured delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert an amount in this unit to a `Duration`, saturating on overflow
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }

    /// Convert an amount in this unit to whole milliseconds
    pub fn to_millis(self, amount: u64) -> u128 {
        self.to_duration(amount).as_millis()
    }

    fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ns" | "nanos" | "nanoseconds" => Ok(TimeUnit::Nanoseconds),
            "us" | "micros" | "microseconds" => Ok(TimeUnit::Microseconds),
            "ms" | "millis" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "secs" | "seconds" => Ok(TimeUnit::Seconds),
            "m" | "min" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hours" => Ok(TimeUnit::Hours),
            "d" | "days" => Ok(TimeUnit::Days),
            other => Err(Error::invalid_config(format!("Unknown time unit: {}", other))),
        }
    }
}
