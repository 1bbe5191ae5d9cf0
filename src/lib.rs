//! Cross-process synchronization through advisory file locks.
//!
//! Two primitives are provided for processes that share nothing but a path:
//!
//! - [`Mutex`]: an exclusive lock on a file, acquired by polling a non-blocking
//!   lock with randomized backoff.
//! - [`Semaphore`]: a counting semaphore whose state (free slots and holder PIDs)
//!   is stored in the file its mutex guards, with cleanup of slots left behind by
//!   dead processes.
//!
//! Waits are unbounded by default; the `*_timeout` variants add a deadline.
//! Notifications and diagnostics are emitted through `tracing`.
//!
//! ```no_run
//! use filemutex::Semaphore;
//! use std::time::Duration;
//!
//! let mut sem = Semaphore::new(2, Duration::from_millis(100), "/tmp/demo-sem", "")?;
//! sem.acquire()?;
//! // At most two processes run this section at once
//! sem.release()?;
//! # Ok::<(), filemutex::MutexError>(())
//! ```

pub mod backoff;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod mutex;
pub mod process;
pub mod semaphore;

#[cfg(test)]
pub(crate) mod test_support;

pub use backoff::{Backoff, Deadline};
pub use config::Config;
pub use error::{MutexError, Result};
pub use mutex::Mutex;
pub use process::{NoProbe, ProcFsProbe, ProcessProbe};
pub use semaphore::{CleanReport, Semaphore, SemaphoreOptions, SemaphoreState};
