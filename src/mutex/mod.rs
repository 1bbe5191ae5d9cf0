//! Cross-process mutex backed by an advisory file lock.
//!
//! # Locking Model
//!
//! The lock file is opened with create (not create_new) semantics, so every
//! process using the same path shares one file. Exclusion comes from a
//! non-blocking exclusive `flock`-style lock taken through `fs2`:
//! - contention (`WouldBlock`) is retried forever after a randomized backoff,
//!   unless the caller supplied a deadline;
//! - any other failure is returned as `MutexError::Io` immediately.
//!
//! # Notifications
//!
//! The first retry of an acquisition emits one `Waiting to acquire Mutex lock on …`
//! event and starts a timer. Once the lock is obtained the elapsed wait is added
//! to the cumulative waiting time and reported as `Mutex lock acquired after …s`.
//!
//! # States
//!
//! A `Mutex` is either free or held. Acquiring while held and releasing while
//! free are programmer errors reported as `MutexError::IllegalState`.

use crate::backoff::{Backoff, Deadline};
use crate::error::{MutexError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};


/// A mutex shared between processes through a lock file.
#[derive(Debug)]
pub struct Mutex {
    /// Path to the shared lock file.
    path: PathBuf,

    /// Name used in log notifications.
    resource_name: String,

    /// Pacing between attempts.
    backoff: Backoff,

    /// Open handle while the lock is held.
    handle: Option<File>,

    /// Sum of all waits that ended in an acquisition.
    total_waiting_time: Duration,
}

impl Mutex {
    /// Create a mutex on `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Lock file shared by every participating process
    /// * `retry_delay` - Nominal delay between attempts
    /// * `resource_name` - Name used in notifications; empty means the path
    pub fn new(path: impl Into<PathBuf>, retry_delay: Duration, resource_name: &str) -> Self {
        let path = path.into();
        let resource_name = if resource_name.is_empty() {
            path.display().to_string()
        } else {
            resource_name.to_string()
        };

        Self {
            path,
            resource_name,
            backoff: Backoff::new(retry_delay),
            handle: None,
            total_waiting_time: Duration::ZERO,
        }
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name used in log notifications.
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Whether this instance currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.handle.is_some()
    }

    /// Cumulative time spent waiting across all successful acquisitions.
    pub fn total_waiting_time(&self) -> Duration {
        self.total_waiting_time
    }

    /// Acquire the lock, retrying for as long as it is contended.
    ///
    /// Returns the open lock file (valid until `release`) and the time spent
    /// waiting, which is zero when the first attempt succeeded.
    ///
    /// # Errors
    ///
    /// * `MutexError::IllegalState` - The lock is already held by this instance
    /// * `MutexError::Io` - The file could not be opened or locked
    pub fn acquire(&mut self) -> Result<(&mut File, Duration)> {
        self.acquire_until(Deadline::never())
    }

    /// Acquire the lock, giving up with `MutexError::Timeout` after `timeout`.
    pub fn acquire_timeout(&mut self, timeout: Duration) -> Result<(&mut File, Duration)> {
        self.acquire_until(Deadline::after(timeout))
    }

    /// Acquire the lock, giving up once `deadline` expires.
    pub fn acquire_until(&mut self, deadline: Deadline) -> Result<(&mut File, Duration)> {
        if self.handle.is_some() {
            return Err(MutexError::IllegalState(
                "You must call release() method before!".to_string(),
            ));
        }

        let file = open_lock_file(&self.path)?;
        let mut wait_started: Option<Instant> = None;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if is_contention(&e) => {}
                Err(e) => {
                    return Err(MutexError::Io(format!(
                        "failed to lock '{}': {}",
                        self.path.display(),
                        e
                    )));
                }
            }

            if wait_started.is_none() {
                wait_started = Some(Instant::now());
                tracing::info!(
                    resource = %self.resource_name,
                    "Waiting to acquire Mutex lock on {}…",
                    self.resource_name
                );
            }

            if deadline.expired() {
                return Err(MutexError::Timeout(format!(
                    "gave up waiting for Mutex lock on {}",
                    self.resource_name
                )));
            }

            self.backoff.pause(&deadline);
        }

        let waited = match wait_started {
            Some(start) => {
                let waited = start.elapsed();
                self.total_waiting_time += waited;
                let elapsed_time = format!("{:.2}", waited.as_secs_f64());
                tracing::info!(
                    elapsed_time = %elapsed_time,
                    "Mutex lock acquired after {}s",
                    elapsed_time
                );
                waited
            }
            None => Duration::ZERO,
        };

        tracing::debug!("Acquired file lock: {}", self.path.display());
        Ok((self.handle.insert(file), waited))
    }

    /// Release the lock and close the handle.
    ///
    /// # Errors
    ///
    /// * `MutexError::IllegalState` - The lock is not held by this instance
    /// * `MutexError::Io` - The OS refused to unlock (the handle is closed anyway)
    pub fn release(&mut self) -> Result<()> {
        let file = self.handle.take().ok_or_else(|| {
            MutexError::IllegalState("You must call acquire() method before!".to_string())
        })?;

        // Closing the handle below drops the lock even if unlock fails.
        FileExt::unlock(&file).map_err(|e| {
            MutexError::Io(format!(
                "failed to unlock '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        drop(file);

        tracing::debug!("Released file lock: {}", self.path.display());
        Ok(())
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        if self.handle.take().is_some() {
            tracing::debug!(
                "Mutex on '{}' dropped while held, closing handle",
                self.path.display()
            );
        }
    }
}

/// Open the shared lock file, creating it and its parent directories if needed.
fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            MutexError::Io(format!(
                "failed to create lock directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| MutexError::Io(format!("failed to open '{}': {}", path.display(), e)))
}

/// Whether a failed non-blocking lock attempt means "held by someone else".
fn is_contention(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
