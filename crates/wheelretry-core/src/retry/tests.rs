//! Integration tests for the retry module
//!
//! These tests drive complete retry tasks through both schedulers: the inline
//! `ImmediateScheduler` for exact call accounting, and a fast-ticking
//! `HashedWheelTimer` for timing, threading and shutdown behavior.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::retry::error::RetryError;
use crate::retry::observer::{NoOpObserver, RetryObserver, StatsObserver};
use crate::retry::task::RetryTask;
use crate::scheduler::{HashedWheelTimer, ImmediateScheduler, Scheduler};
use crate::types::{RetryConfig, SchedulerConfig, TimeUnit};

/// A 10ms-tick timer so real-time tests stay short
fn fast_timer() -> Arc<HashedWheelTimer> {
    Arc::new(
        HashedWheelTimer::with_config(&SchedulerConfig {
            tick_duration_ms: 10,
            ticks_per_wheel: 64,
            ..Default::default()
        })
        .unwrap(),
    )
}

/// Operation failing `failures` times with numbered errors, then returning the call count
fn failing_then_ok(
    failures: u32,
    calls: Arc<AtomicU32>,
) -> impl FnMut() -> Result<u32, String> + Send + 'static {
    move || {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= failures {
            Err(format!("failure {}", call))
        } else {
            Ok(call)
        }
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

// ============================================================================
// Outcome Tests
// ============================================================================

#[test]
fn test_first_attempt_success_never_schedules() {
    let scheduler = Arc::new(ImmediateScheduler::new());
    let calls = Arc::new(AtomicU32::new(0));

    let result = RetryTask::new("first", failing_then_ok(0, calls.clone()), scheduler.clone())
        .with_observer(NoOpObserver)
        .execute();

    assert_eq!(result.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.scheduled(), 0);
}

#[test]
fn test_succeeds_after_failures() {
    let scheduler = Arc::new(ImmediateScheduler::new());
    let calls = Arc::new(AtomicU32::new(0));
    let stats = Arc::new(StatsObserver::new());

    let result = RetryTask::new("flaky", failing_then_ok(2, calls.clone()), scheduler.clone())
        .with_max_attempts(3)
        .with_observer(stats.clone())
        .execute();

    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(scheduler.scheduled(), 2);
    assert_eq!(stats.attempt_starts(), 3);
    assert_eq!(stats.failures(), 2);
    assert_eq!(stats.successes(), 1);
    assert_eq!(stats.exhaustions(), 0);
}

#[test]
fn test_success_on_last_allowed_attempt() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = RetryTask::new(
        "last-chance",
        failing_then_ok(3, calls.clone()),
        Arc::new(ImmediateScheduler::new()),
    )
    .with_max_attempts(3)
    .execute();

    assert_eq!(result.unwrap(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_exhausted_returns_first_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let stats = Arc::new(StatsObserver::new());

    let result = RetryTask::new(
        "always-fails",
        failing_then_ok(u32::MAX, calls.clone()),
        Arc::new(ImmediateScheduler::new()),
    )
    .with_max_attempts(3)
    .with_observer(stats.clone())
    .execute();

    let err = result.unwrap_err();
    assert_eq!(err.attempts(), 4);
    assert_eq!(err.into_source().as_deref(), Some("failure 1"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(stats.attempt_starts(), 4);
    assert_eq!(stats.failures(), 3);
    assert_eq!(stats.exhaustions(), 1);
    assert_eq!(stats.abandonments(), 0);
}

#[test]
fn test_ten_second_delay_succeeds_on_third_call() {
    let calls = Arc::new(AtomicU32::new(0));
    let op_calls = calls.clone();

    let result = RetryTask::new(
        "ten-seconds",
        move || {
            if op_calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("not ready")
            } else {
                Ok("ok")
            }
        },
        Arc::new(ImmediateScheduler::new()),
    )
    .with_delay(10, TimeUnit::Seconds)
    .with_max_attempts(3)
    .execute();

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_panicking_retry_counts_as_failed_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let op_calls = calls.clone();

    let result = RetryTask::new(
        "panics",
        move || -> Result<&'static str, String> {
            match op_calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err("first".to_string()),
                1 => panic!("boom"),
                _ => Ok("recovered"),
            }
        },
        Arc::new(ImmediateScheduler::new()),
    )
    .with_max_attempts(3)
    .with_observer(NoOpObserver)
    .execute();

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_delay_not_above_tick_is_rejected() {
    for delay_ms in [50, 100] {
        let calls = Arc::new(AtomicU32::new(0));

        let result = RetryTask::new(
            "too-fast",
            failing_then_ok(0, calls.clone()),
            Arc::new(ImmediateScheduler::new()),
        )
        .with_delay(delay_ms, TimeUnit::Milliseconds)
        .execute();

        let err = result.unwrap_err();
        assert!(err.is_config(), "delay {}ms should be rejected", delay_ms);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn test_zero_max_attempts_is_rejected() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = RetryTask::new(
        "no-retries",
        failing_then_ok(0, calls.clone()),
        Arc::new(ImmediateScheduler::new()),
    )
    .with_max_attempts(0)
    .execute();

    assert!(matches!(
        result,
        Err(RetryError::Config(Error::InvalidConfig { .. }))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_validation_uses_scheduler_tick() {
    let calls = Arc::new(AtomicU32::new(0));
    let config = RetryConfig {
        max_attempts: 2,
        delay: 20,
        delay_unit: TimeUnit::Milliseconds,
    };

    // 20ms is fine against a 10ms tick, not against the default 100ms
    let ok = RetryTask::new(
        "fine-tick",
        failing_then_ok(1, calls.clone()),
        Arc::new(ImmediateScheduler::with_tick(Duration::from_millis(10))),
    )
    .with_config(config.clone())
    .execute();
    assert_eq!(ok.unwrap(), 2);

    let rejected = RetryTask::new(
        "coarse-tick",
        failing_then_ok(1, calls.clone()),
        Arc::new(ImmediateScheduler::new()),
    )
    .with_config(config)
    .execute();
    assert!(rejected.unwrap_err().is_config());
}

// ============================================================================
// Hashed Wheel Tests
// ============================================================================

#[test]
fn test_retries_wait_for_delay() {
    let timer = fast_timer();
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();

    let result = RetryTask::new("timed", failing_then_ok(2, calls.clone()), timer.clone())
        .with_delay(30, TimeUnit::Milliseconds)
        .with_max_attempts(3)
        .execute();

    assert_eq!(result.unwrap(), 3);
    assert!(started.elapsed() >= Duration::from_millis(60));
    timer.stop().unwrap();
}

#[test]
fn test_retries_run_on_timer_thread() {
    let timer = fast_timer();
    let threads = Arc::new(Mutex::new(Vec::new()));
    let op_threads = threads.clone();

    let result = RetryTask::new(
        "threads",
        move || -> Result<(), String> {
            let mut seen = op_threads.lock().unwrap();
            seen.push(thread::current().name().map(String::from));
            if seen.len() < 3 {
                Err("again".to_string())
            } else {
                Ok(())
            }
        },
        timer.clone(),
    )
    .with_delay(20, TimeUnit::Milliseconds)
    .execute();

    assert!(result.is_ok());
    let seen = threads.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_ne!(seen[0].as_deref(), Some("retry-task-1"));
    assert_eq!(seen[1].as_deref(), Some("retry-task-1"));
    assert_eq!(seen[2].as_deref(), Some("retry-task-1"));
    drop(seen);
    timer.stop().unwrap();
}

#[test]
fn test_concurrent_tasks_share_one_timer() {
    let timer = fast_timer();

    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let scheduler: Arc<dyn Scheduler> = timer.clone();
            thread::spawn(move || {
                let calls = Arc::new(AtomicU32::new(0));
                let result = RetryTask::new(
                    format!("task-{}", i),
                    failing_then_ok(i % 3, calls.clone()),
                    scheduler,
                )
                .with_delay(20, TimeUnit::Milliseconds)
                .with_max_attempts(3)
                .with_observer(NoOpObserver)
                .execute();
                (i, result.map_err(|e| e.to_string()), calls.load(Ordering::SeqCst))
            })
        })
        .collect();

    for handle in handles {
        let (i, result, calls) = handle.join().unwrap();
        assert_eq!(result, Ok(i % 3 + 1));
        assert_eq!(calls, i % 3 + 1);
    }
    timer.stop().unwrap();
}

#[test]
fn test_stopped_timer_abandons_pending_retry() {
    let timer = fast_timer();
    let stats = Arc::new(StatsObserver::new());
    let calls = Arc::new(AtomicU32::new(0));

    let caller = {
        let scheduler: Arc<dyn Scheduler> = timer.clone();
        let stats = stats.clone();
        let calls = calls.clone();
        thread::spawn(move || {
            RetryTask::new("abandoned", failing_then_ok(u32::MAX, calls), scheduler)
                .with_delay(60, TimeUnit::Seconds)
                .with_observer(stats)
                .execute()
        })
    };

    wait_until(|| timer.pending_timeouts() == 1);
    drop(timer.stop().unwrap());

    let err = caller.join().unwrap().unwrap_err();
    assert_eq!(err.attempts(), 1);
    assert_eq!(err.into_source().as_deref(), Some("failure 1"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(stats.abandonments(), 1);
    assert_eq!(stats.exhaustions(), 1);
}

#[test]
fn test_schedule_refused_returns_first_error() {
    let timer = fast_timer();
    timer.start().unwrap();
    timer.stop().unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let result = RetryTask::new("refused", failing_then_ok(u32::MAX, calls.clone()), timer)
        .with_delay(20, TimeUnit::Milliseconds)
        .execute();

    let err = result.unwrap_err();
    assert!(err.is_failed());
    assert_eq!(err.attempts(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Observer and Limit Tests
// ============================================================================

/// Observer that panics on every event after the caller's first attempt
struct PanicsOnWorker {
    stats: StatsObserver,
}

impl PanicsOnWorker {
    fn new() -> Self {
        Self {
            stats: StatsObserver::new(),
        }
    }
}

impl RetryObserver for PanicsOnWorker {
    fn on_attempt_start(&self, attempt: u32, total: u32) {
        self.stats.on_attempt_start(attempt, total);
        if attempt > 1 {
            panic!("observer failed at start of attempt {}", attempt);
        }
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn fmt::Display, delay: Duration) {
        self.stats.on_attempt_failed(attempt, error, delay);
        if attempt > 1 {
            panic!("observer failed after attempt {}", attempt);
        }
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        self.stats.on_success(attempt, total_duration);
        if attempt > 1 {
            panic!("observer failed on success");
        }
    }

    fn on_exhausted(&self, attempts: u32, first_error: &dyn fmt::Display) {
        self.stats.on_exhausted(attempts, first_error);
    }
}

#[test]
fn test_panicking_observer_still_delivers_success() {
    let observer = Arc::new(PanicsOnWorker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let result = RetryTask::new("observed", failing_then_ok(1, calls.clone()), fast_timer())
        .with_delay(20, TimeUnit::Milliseconds)
        .with_max_attempts(3)
        .with_observer(observer.clone())
        .execute();

    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(observer.stats.successes(), 1);
}

#[test]
fn test_panicking_observer_still_exhausts() {
    let observer = Arc::new(PanicsOnWorker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let result = RetryTask::new("observed", failing_then_ok(u32::MAX, calls.clone()), fast_timer())
        .with_delay(20, TimeUnit::Milliseconds)
        .with_max_attempts(3)
        .with_observer(observer.clone())
        .execute();

    let err = result.unwrap_err();
    assert_eq!(err.attempts(), 4);
    assert_eq!(err.into_source().as_deref(), Some("failure 1"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(observer.stats.failures(), 3);
    assert_eq!(observer.stats.exhaustions(), 1);
}

#[test]
fn test_delay_at_duration_limit_waits() {
    let timer = fast_timer();
    let calls = Arc::new(AtomicU32::new(0));

    let caller = {
        let scheduler: Arc<dyn Scheduler> = timer.clone();
        let calls = calls.clone();
        thread::spawn(move || {
            RetryTask::new("far", failing_then_ok(u32::MAX, calls), scheduler)
                .with_delay(u64::MAX, TimeUnit::Days)
                .with_observer(NoOpObserver)
                .execute()
        })
    };

    wait_until(|| timer.pending_timeouts() == 1);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(timer.stop().unwrap().len(), 1);
    let err = caller.join().unwrap().unwrap_err();
    assert!(err.is_failed());
    assert_eq!(err.attempts(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_large_retry_budget_on_immediate_scheduler() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = RetryTask::new(
        "long",
        failing_then_ok(u32::MAX, calls.clone()),
        Arc::new(ImmediateScheduler::new()),
    )
    .with_max_attempts(100_000)
    .with_observer(NoOpObserver)
    .execute();

    let err = result.unwrap_err();
    assert_eq!(err.attempts(), 100_001);
    assert_eq!(err.into_source().as_deref(), Some("failure 1"));
    assert_eq!(calls.load(Ordering::SeqCst), 100_001);
}

// ============================================================================
// Async Adapter Tests
// ============================================================================

#[tokio::test]
async fn test_execute_async_succeeds() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = RetryTask::new("async", failing_then_ok(1, calls.clone()), fast_timer())
        .with_delay(20, TimeUnit::Milliseconds)
        .execute_async()
        .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_execute_async_reports_exhaustion() {
    let result = RetryTask::new(
        "async-fails",
        failing_then_ok(u32::MAX, Arc::new(AtomicU32::new(0))),
        Arc::new(ImmediateScheduler::new()),
    )
    .with_max_attempts(2)
    .execute_async()
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.attempts(), 3);
    assert_eq!(err.source_ref().map(String::as_str), Some("failure 1"));
}
