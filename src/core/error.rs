//! Error types for supervised topologies.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// The main error type for stages and their supervisor.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A stage function failed to handle an element
    #[error("{0}")]
    Stage(Arc<dyn std::error::Error + Send + Sync>),

    /// The topology was cancelled from outside
    #[error("topology was cancelled")]
    Cancelled,

    /// The topology outlived its deadline
    #[error("deadline exceeded after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// `merge` was called without any inputs
    #[error("merge requires at least one input")]
    EmptyMerge,

    /// The merged feeds are attached to different supervisors
    #[error("merged feeds must share one supervisor")]
    ForeignSupervisor,

    /// A stage input was already wired to an upstream producer
    #[error("stage input is already connected")]
    AlreadyConnected,

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

// Convenience constructors
impl Error {
    /// Create a stage error from any error type
    pub fn stage<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Stage(Arc::new(error))
    }

    /// Create a timeout error for the given deadline
    pub fn timeout(duration: Duration) -> Self {
        Error::Timeout {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// True for causes that came from outside the topology
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::Timeout { .. })
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Stage(Arc::from(e))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;
