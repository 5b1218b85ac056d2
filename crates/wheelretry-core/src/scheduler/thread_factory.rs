//! Named worker threads for scheduler drivers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};

/// Spawns threads named `{prefix}-{n}`, with `n` counting up from 1
///
/// Threads are spawned joinable. Rust has no daemon threads, so an owner that
/// must keep the process alive joins the handle when it shuts down.
#[derive(Debug)]
pub struct NamedThreadFactory {
    prefix: String,
    next_number: AtomicUsize,
}

impl NamedThreadFactory {
    /// Create a factory for the given name prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_number: AtomicUsize::new(1),
        }
    }

    /// The name prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Reserve the next thread name
    pub fn next_name(&self) -> String {
        let number = self.next_number.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, number)
    }

    /// Spawn a new named thread running `f`
    pub fn spawn<F, T>(&self, f: F) -> Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let name = self.next_name();
        thread::Builder::new()
            .name(name.clone())
            .spawn(f)
            .map_err(|e| Error::thread_spawn(name, e))
    }
}

impl Default for NamedThreadFactory {
    fn default() -> Self {
        Self::new("retry-task")
    }
}
