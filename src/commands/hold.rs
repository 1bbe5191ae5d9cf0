//! The `mutex` and `semaphore` commands: take the lock, hold it, give it back.

use super::effective_config;
use crate::backoff::Deadline;
use crate::cli::{MutexArgs, SemaphoreArgs};
use crate::config::Config;
use crate::error::{MutexError, Result};
use crate::mutex::Mutex;
use crate::semaphore::{Semaphore, SemaphoreOptions};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Hold the mutex on `args.lock.path` for `args.hold_ms`.
pub(super) fn cmd_mutex(base: &Config, args: MutexArgs) -> Result<()> {
    let config = effective_config(base, &args.lock, None)?;
    let mut mutex = Mutex::new(
        &args.lock.path,
        config.retry_delay(),
        config.resource_name_or_default(),
    );

    mutex.acquire_until(Deadline::within(config.timeout()))?;
    record(args.journal.as_deref(), "acquired")?;

    println!("Do anything for {} ms…", args.hold_ms);
    thread::sleep(Duration::from_millis(args.hold_ms));

    record(args.journal.as_deref(), "releasing")?;
    mutex.release()?;
    if mutex.total_waiting_time() > Duration::ZERO {
        println!(
            "Total waiting time: {:.2}s",
            mutex.total_waiting_time().as_secs_f64()
        );
    }
    Ok(())
}

/// Hold one slot of the semaphore on `args.lock.path` for `args.hold_ms`.
pub(super) fn cmd_semaphore(base: &Config, args: SemaphoreArgs) -> Result<()> {
    let mut config = effective_config(base, &args.lock, args.capacity)?;
    if args.strict_release {
        config.strict_release = true;
    }

    // One deadline covers both the construction cleanup and the slot wait
    let deadline = Deadline::within(config.timeout());
    let mut semaphore = Semaphore::with_options(
        SemaphoreOptions::new(config.capacity, config.retry_delay(), &args.lock.path)
            .resource_name(config.resource_name_or_default())
            .strict_release(config.strict_release)
            .cleanup_deadline(deadline),
    )?;

    semaphore.acquire_until(deadline)?;
    record(args.journal.as_deref(), "acquired")?;

    println!("Do anything for {} ms…", args.hold_ms);
    thread::sleep(Duration::from_millis(args.hold_ms));

    if args.leak {
        println!(
            "Exiting without releasing slot held by pid {}",
            std::process::id()
        );
        return Ok(());
    }

    record(args.journal.as_deref(), "releasing")?;
    semaphore.release()?;
    if semaphore.total_waiting_time() > Duration::ZERO {
        println!(
            "Total waiting time: {:.2}s",
            semaphore.total_waiting_time().as_secs_f64()
        );
    }
    Ok(())
}

/// Append `<event> <pid>` to the journal, if one was requested.
///
/// The line goes out in a single append-mode write so lines from concurrent
/// processes never interleave.
fn record(journal: Option<&Path>, event: &str) -> Result<()> {
    let Some(path) = journal else {
        return Ok(());
    };

    let line = format!("{} {}\n", event, std::process::id());
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.as_bytes()))
        .map_err(|e| {
            MutexError::Io(format!("failed to append to journal '{}': {}", path.display(), e))
        })
}
