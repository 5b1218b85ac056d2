//! Error types for wheelretry-core

use thiserror::Error;

/// Result type alias using wheelretry-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the scheduler, retry tasks and configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The scheduler has been stopped and accepts no new timeouts
    #[error("Scheduler has been stopped")]
    SchedulerStopped,

    /// The scheduler refused a timeout because its pending limit is reached
    #[error("Too many pending timeouts: {pending} (maximum allowed is {max})")]
    TooManyPendingTimeouts { pending: usize, max: usize },

    /// An operation was called from a context that does not allow it
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// A worker thread could not be spawned
    #[error("Failed to spawn thread {name}: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid config error from a list of problems
    pub fn invalid_config_list(problems: Vec<String>) -> Self {
        Self::InvalidConfig {
            message: problems.join("; "),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a thread spawn error
    pub fn thread_spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::ThreadSpawn {
            name: name.into(),
            source,
        }
    }

    /// Check if this error was caused by configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::ConfigNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_config("delay too small");
        assert!(err.to_string().contains("delay too small"));

        let err = Error::TooManyPendingTimeouts { pending: 5, max: 4 };
        let display = err.to_string();
        assert!(display.contains('5'));
        assert!(display.contains('4'));

        let err = Error::SchedulerStopped;
        assert_eq!(err.to_string(), "Scheduler has been stopped");
    }

    #[test]
    fn test_invalid_config_list_joins_problems() {
        let err = Error::invalid_config_list(vec!["a".to_string(), "b".to_string()]);
        assert!(err.to_string().contains("a; b"));
        assert!(err.is_config());
    }

    #[test]
    fn test_runtime_errors_are_not_config() {
        assert!(!Error::SchedulerStopped.is_config());
        assert!(!Error::invalid_state("worker").is_config());
    }
}
