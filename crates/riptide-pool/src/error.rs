//! Error types for pool operations

use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed failure cause delivered by a connector.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for connection pool operations
#[derive(Error, Debug)]
pub enum Error {
    /// The pool options are inconsistent
    #[error("configuration error: {message}")]
    Configuration {
        /// What is wrong with the options
        message: String,
    },

    /// The pool can neither serve nor queue an acquisition
    #[error("connection pool is too busy: waiter limit of {max_waiters} reached")]
    TooBusy {
        /// The configured waiter queue limit
        max_waiters: usize,
    },

    /// The pool has been closed
    #[error("connection pool is closed")]
    Closed,

    /// A lease was recycled more than once
    #[error("lease has already been recycled")]
    AlreadyRecycled,

    /// A connect attempt failed; carries the connector's cause
    #[error(transparent)]
    Connect {
        /// The cause reported by the connector, unchanged
        #[from]
        cause: BoxError,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if the operation may succeed when retried later
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TooBusy { .. })
    }
}
