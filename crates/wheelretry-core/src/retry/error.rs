//! Error types for retry tasks
//!
//! A retry task ends in one of three ways for the caller: the operation's
//! value, a configuration error raised before any attempt, or the error of the
//! first failed attempt once every retry is spent. There is no separate
//! "budget exceeded" error: exhaustion is reported through the first error.

use std::error::Error;
use std::fmt;

use crate::error::Error as CoreError;

/// Errors returned by [`RetryTask::execute`](super::RetryTask::execute)
///
/// The error type is generic over `E`, the error type of the operation being
/// retried.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The task configuration was rejected; the operation never ran
    Config(CoreError),

    /// Every attempt failed
    Failed {
        /// Number of attempts made, including the first synchronous one
        attempts: u32,
        /// The error from the first attempt
        source: E,
    },

    /// The blocking wait was interrupted before the task finished
    ///
    /// Only returned by `execute_async`, when the runtime shuts down under it.
    Interrupted(String),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Config(err) => write!(f, "invalid retry configuration: {}", err),
            RetryError::Failed { attempts, source } => {
                write!(
                    f,
                    "retry exhausted after {} attempts, first error: {}",
                    attempts, source
                )
            }
            RetryError::Interrupted(reason) => write!(f, "retry interrupted: {}", reason),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Config(err) => Some(err),
            RetryError::Failed { source, .. } => Some(source),
            RetryError::Interrupted(_) => None,
        }
    }
}

impl<E> RetryError<E> {
    /// Create a new failed error
    pub fn failed(attempts: u32, source: E) -> Self {
        RetryError::Failed { attempts, source }
    }

    /// Get the number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Failed { attempts, .. } => *attempts,
            RetryError::Config(_) | RetryError::Interrupted(_) => 0,
        }
    }

    /// Check if this error is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, RetryError::Config(_))
    }

    /// Check if every attempt failed
    pub fn is_failed(&self) -> bool {
        matches!(self, RetryError::Failed { .. })
    }

    /// Get the operation error, consuming this error
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Failed { source, .. } => Some(source),
            RetryError::Config(_) | RetryError::Interrupted(_) => None,
        }
    }

    /// Get a reference to the operation error
    pub fn source_ref(&self) -> Option<&E> {
        match self {
            RetryError::Failed { source, .. } => Some(source),
            RetryError::Config(_) | RetryError::Interrupted(_) => None,
        }
    }

    /// Map the operation error type using a closure
    pub fn map_err<F, E2>(self, f: F) -> RetryError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            RetryError::Config(err) => RetryError::Config(err),
            RetryError::Failed { attempts, source } => RetryError::Failed {
                attempts,
                source: f(source),
            },
            RetryError::Interrupted(reason) => RetryError::Interrupted(reason),
        }
    }
}
