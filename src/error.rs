//! Error types for filemutex.
//!
//! Uses thiserror for derive macros. Contention is never an error: it only shows
//! up as latency and log notifications.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for mutex and semaphore operations.
#[derive(Error, Debug)]
pub enum MutexError {
    /// The lock was used out of order (acquire while held, release while free).
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The lock file could not be opened, locked, read or written.
    #[error("I/O error: {0}")]
    Io(String),

    /// The lock file content is not a valid semaphore state line.
    #[error("Invalid semaphore state: {0}")]
    StateFormat(String),

    /// A caller-supplied deadline elapsed before the lock or a slot was obtained.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A release would push the free slot count above capacity (strict mode only).
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(String),
}

impl MutexError {
    /// Returns the process exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            MutexError::Config(_) => exit_codes::USER_ERROR,
            MutexError::Io(_) => exit_codes::IO_FAILURE,
            MutexError::Timeout(_) => exit_codes::TIMEOUT,
            MutexError::IllegalState(_)
            | MutexError::StateFormat(_)
            | MutexError::CapacityExceeded(_) => exit_codes::MISUSE,
        }
    }
}

/// Result type alias for filemutex operations.
pub type Result<T> = std::result::Result<T, MutexError>;
