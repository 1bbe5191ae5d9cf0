//! Cross-process counting semaphore.
//!
//! The semaphore keeps its state (free slot count and holder PIDs) in the same
//! file its [`Mutex`] locks. Every read-modify-write of that state happens
//! between a mutex acquire and release, which makes it atomic across processes.
//! Nothing is cached in memory: each operation re-reads the file.
//!
//! # Stale Holders
//!
//! A process that dies without releasing keeps its slot. When a semaphore is
//! constructed (or `clean` is called) every holder PID the process probe reports
//! as gone is removed and its slot returned. If no holder is left the file is
//! truncated, which is the same as the initial state. Without a usable probe the
//! cleanup is skipped.
//!
//! # Release Without Acquire
//!
//! `release` does not check that the caller holds a slot. An unmatched release
//! raises the free count above capacity. Enable `strict_release` to turn that
//! into `MutexError::CapacityExceeded` instead.

mod state;


pub use state::{Membership, SemaphoreState};

use crate::backoff::{Backoff, Deadline};
use crate::error::{MutexError, Result};
use crate::mutex::Mutex;
use crate::process::{ProcessProbe, default_probe};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Construction parameters for a [`Semaphore`].
pub struct SemaphoreOptions {
    /// Number of slots.
    pub capacity: u32,

    /// Nominal delay between attempts, for both the mutex and the slot wait.
    pub retry_delay: Duration,

    /// Lock file shared by every participating process.
    pub path: PathBuf,

    /// Name used in notifications; empty means the path.
    pub resource_name: String,

    /// Process-existence check used by cleanup.
    pub probe: Box<dyn ProcessProbe>,

    /// Reject releases that would push the free count above capacity.
    pub strict_release: bool,

    /// How long the cleanup run on construction may wait for the mutex.
    pub cleanup_deadline: Deadline,
}

impl SemaphoreOptions {
    /// Options with the default probe and lenient release.
    pub fn new(capacity: u32, retry_delay: Duration, path: impl Into<PathBuf>) -> Self {
        Self {
            capacity,
            retry_delay,
            path: path.into(),
            resource_name: String::new(),
            probe: default_probe(),
            strict_release: false,
            cleanup_deadline: Deadline::never(),
        }
    }

    /// Set the name used in notifications.
    pub fn resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = name.into();
        self
    }

    /// Use a custom process probe.
    pub fn probe(mut self, probe: Box<dyn ProcessProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Enable or disable the release overflow check.
    pub fn strict_release(mut self, strict: bool) -> Self {
        self.strict_release = strict;
        self
    }

    /// Bound the wait for the mutex during the cleanup run on construction.
    pub fn cleanup_deadline(mut self, deadline: Deadline) -> Self {
        self.cleanup_deadline = deadline;
        self
    }
}

/// Outcome of a stale-holder cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// PIDs found dead and removed from the holders.
    pub reclaimed: Vec<u32>,

    /// Whether the file was emptied because no holder remained.
    pub truncated: bool,

    /// Whether cleanup was skipped because no probe is available.
    pub skipped: bool,
}

/// A counting semaphore shared between processes through a lock file.
pub struct Semaphore {
    capacity: u32,
    backoff: Backoff,
    mutex: Mutex,
    probe: Box<dyn ProcessProbe>,
    strict_release: bool,
    pid: u32,

    /// Time spent waiting for the mutex guarding the state.
    lock_waiting_time: Duration,

    /// Time spent waiting for a free slot.
    slot_waiting_time: Duration,

    /// Outcome of the most recent cleanup.
    last_cleanup: CleanReport,
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("capacity", &self.capacity)
            .field("path", &self.mutex.path())
            .field("resource_name", &self.mutex.resource_name())
            .field("strict_release", &self.strict_release)
            .field("lock_waiting_time", &self.lock_waiting_time)
            .field("slot_waiting_time", &self.slot_waiting_time)
            .finish()
    }
}

impl Semaphore {
    /// Create a semaphore with `capacity` slots on `path` and clean up stale holders.
    ///
    /// # Errors
    ///
    /// * `MutexError::Config` - `capacity` is zero
    /// * `MutexError::Io` / `MutexError::StateFormat` - Cleanup could not read or write the file
    /// * `MutexError::Timeout` - The cleanup deadline passed while another process held the mutex
    pub fn new(
        capacity: u32,
        retry_delay: Duration,
        path: impl Into<PathBuf>,
        resource_name: &str,
    ) -> Result<Self> {
        Self::with_options(
            SemaphoreOptions::new(capacity, retry_delay, path).resource_name(resource_name),
        )
    }

    /// Create a semaphore from explicit options and clean up stale holders.
    pub fn with_options(options: SemaphoreOptions) -> Result<Self> {
        if options.capacity == 0 {
            return Err(MutexError::Config(
                "semaphore capacity must be greater than 0".to_string(),
            ));
        }

        let cleanup_deadline = options.cleanup_deadline;
        let mut semaphore = Self {
            capacity: options.capacity,
            backoff: Backoff::new(options.retry_delay),
            mutex: Mutex::new(options.path, options.retry_delay, &options.resource_name),
            probe: options.probe,
            strict_release: options.strict_release,
            pid: std::process::id(),
            lock_waiting_time: Duration::ZERO,
            slot_waiting_time: Duration::ZERO,
            last_cleanup: CleanReport::default(),
        };
        semaphore.clean_until(cleanup_deadline)?;
        Ok(semaphore)
    }

    /// Number of slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        self.mutex.path()
    }

    /// Name used in notifications.
    pub fn resource_name(&self) -> &str {
        self.mutex.resource_name()
    }

    /// Outcome of the most recent cleanup, including the one run on construction.
    pub fn last_cleanup(&self) -> &CleanReport {
        &self.last_cleanup
    }

    /// Total time spent waiting, for the mutex and for free slots.
    pub fn total_waiting_time(&self) -> Duration {
        self.lock_waiting_time + self.slot_waiting_time
    }

    /// Time spent waiting for the mutex that guards the state.
    pub fn lock_waiting_time(&self) -> Duration {
        self.lock_waiting_time
    }

    /// Time spent waiting for a slot to become free.
    pub fn slot_waiting_time(&self) -> Duration {
        self.slot_waiting_time
    }

    /// Take one slot, retrying for as long as none is free.
    ///
    /// Returns the last-update timestamp read in the successful attempt and the
    /// time this call spent waiting (mutex waits plus slot wait).
    pub fn acquire(&mut self) -> Result<(DateTime<Utc>, Duration)> {
        self.acquire_until(Deadline::never())
    }

    /// Take one slot, giving up with `MutexError::Timeout` after `timeout`.
    pub fn acquire_timeout(&mut self, timeout: Duration) -> Result<(DateTime<Utc>, Duration)> {
        self.acquire_until(Deadline::after(timeout))
    }

    /// Take one slot, giving up once `deadline` expires.
    pub fn acquire_until(&mut self, deadline: Deadline) -> Result<(DateTime<Utc>, Duration)> {
        let capacity = self.capacity;
        let pid = self.pid;
        let mut waiting = Duration::ZERO;
        let mut wait_started: Option<Instant> = None;

        let last_update = loop {
            let ((acquired, observed_at), lock_wait) =
                with_lock(&mut self.mutex, deadline, |file| {
                    let state = SemaphoreState::read_from(file, capacity)?;
                    if state.remaining == 0 {
                        return Ok((false, state.updated_at));
                    }
                    SemaphoreState::stamped(
                        state.remaining - 1,
                        state.holders,
                        pid,
                        Membership::Join,
                    )
                    .write_to(file)?;
                    Ok((true, state.updated_at))
                })?;
            self.lock_waiting_time += lock_wait;
            waiting += lock_wait;

            if acquired {
                break observed_at;
            }

            if wait_started.is_none() {
                wait_started = Some(Instant::now());
                tracing::info!(
                    resource = %self.mutex.resource_name(),
                    "Waiting to acquire lock on {}…",
                    self.mutex.resource_name()
                );
            }

            if deadline.expired() {
                return Err(MutexError::Timeout(format!(
                    "no free slot on {} before the deadline",
                    self.mutex.resource_name()
                )));
            }

            self.backoff.pause(&deadline);
        };

        if let Some(start) = wait_started {
            let slot_wait = start.elapsed();
            self.slot_waiting_time += slot_wait;
            waiting += slot_wait;
            let elapsed_time = format!("{:.2}", slot_wait.as_secs_f64());
            tracing::info!(
                elapsed_time = %elapsed_time,
                "Lock acquired after {}s",
                elapsed_time
            );
        }

        Ok((last_update, waiting))
    }

    /// Give one slot back and return the time spent waiting for the mutex.
    ///
    /// There is no check that this process took a slot before; see the module docs.
    pub fn release(&mut self) -> Result<Duration> {
        let capacity = self.capacity;
        let pid = self.pid;
        let strict = self.strict_release;

        let ((), waited) = with_lock(&mut self.mutex, Deadline::never(), |file| {
            let state = SemaphoreState::read_from(file, capacity)?;
            let remaining = state.remaining.saturating_add(1);
            if strict && remaining > capacity {
                return Err(MutexError::CapacityExceeded(format!(
                    "release would leave {} free slots out of {}",
                    remaining, capacity
                )));
            }
            SemaphoreState::stamped(remaining, state.holders, pid, Membership::Leave)
                .write_to(file)
        })?;

        self.lock_waiting_time += waited;
        Ok(waited)
    }

    /// Read the persisted state without changing it.
    pub fn snapshot(&mut self) -> Result<SemaphoreState> {
        self.snapshot_until(Deadline::never())
    }

    /// Read the persisted state, giving up with `MutexError::Timeout` once
    /// `deadline` expires while waiting for the mutex.
    pub fn snapshot_until(&mut self, deadline: Deadline) -> Result<SemaphoreState> {
        let capacity = self.capacity;
        let (state, waited) = with_lock(&mut self.mutex, deadline, |file| {
            SemaphoreState::read_from(file, capacity)
        })?;
        self.lock_waiting_time += waited;
        Ok(state)
    }

    /// Return the slots of holders that no longer exist.
    ///
    /// Runs automatically on construction. Skipped when the probe is not
    /// available on this platform.
    pub fn clean(&mut self) -> Result<CleanReport> {
        self.clean_until(Deadline::never())
    }

    /// Like [`Semaphore::clean`], giving up with `MutexError::Timeout` once
    /// `deadline` expires while waiting for the mutex.
    pub fn clean_until(&mut self, deadline: Deadline) -> Result<CleanReport> {
        if !self.probe.is_available() {
            tracing::debug!(
                "Process probe unavailable, skipping cleanup of {}",
                self.mutex.path().display()
            );
            self.last_cleanup = CleanReport {
                skipped: true,
                ..CleanReport::default()
            };
            return Ok(self.last_cleanup.clone());
        }

        let capacity = self.capacity;
        let pid = self.pid;
        let probe = &self.probe;

        let (report, waited) = with_lock(&mut self.mutex, deadline, |file| {
            let state = SemaphoreState::read_from(file, capacity)?;
            let (alive, dead): (Vec<u32>, Vec<u32>) =
                state.holders.iter().copied().partition(|holder| probe.is_alive(*holder));

            let remaining = state.remaining.saturating_add(dead.len() as u32);
            let truncated = alive.is_empty();
            if truncated {
                state::truncate(file)?;
            } else {
                SemaphoreState::stamped(
                    remaining,
                    alive.into_iter().collect(),
                    pid,
                    Membership::Leave,
                )
                .write_to(file)?;
            }

            Ok(CleanReport {
                reclaimed: dead,
                truncated,
                skipped: false,
            })
        })?;
        self.lock_waiting_time += waited;

        if !report.reclaimed.is_empty() {
            tracing::debug!(
                pids = ?report.reclaimed,
                "Reclaimed {} slot(s) from dead holders of {}",
                report.reclaimed.len(),
                self.mutex.resource_name()
            );
        }
        self.last_cleanup = report.clone();
        Ok(report)
    }
}

/// Run `f` on the lock file while holding the mutex.
///
/// The mutex is released whether or not `f` succeeds. Returns `f`'s value and
/// the time spent waiting for the mutex.
fn with_lock<T>(
    mutex: &mut Mutex,
    deadline: Deadline,
    f: impl FnOnce(&mut File) -> Result<T>,
) -> Result<(T, Duration)> {
    let (file, waited) = mutex.acquire_until(deadline)?;
    let outcome = f(file);
    let released = mutex.release();
    let value = outcome?;
    released?;
    Ok((value, waited))
}
