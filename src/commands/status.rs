//! The `status` command: print the persisted semaphore state.

use super::{effective_config, read_only_options};
use crate::backoff::Deadline;
use crate::cli::StatusArgs;
use crate::config::Config;
use crate::error::{MutexError, Result};
use crate::semaphore::{Semaphore, SemaphoreState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Machine-readable view of a semaphore, as printed by `status --json`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusReport {
    pub path: PathBuf,
    pub resource: String,
    pub capacity: u32,
    pub remaining: u32,
    pub in_use: u32,
    pub holders: BTreeSet<u32>,
    /// `None` while the file still stands for the initial state.
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusReport {
    fn new(semaphore: &Semaphore, state: SemaphoreState) -> Self {
        let updated_at = (state.updated_at != DateTime::<Utc>::UNIX_EPOCH).then_some(state.updated_at);
        Self {
            path: semaphore.path().to_path_buf(),
            resource: semaphore.resource_name().to_string(),
            capacity: semaphore.capacity(),
            remaining: state.remaining,
            in_use: semaphore.capacity().saturating_sub(state.remaining),
            holders: state.holders,
            updated_at,
        }
    }
}

/// Read the state under the mutex and print it.
pub(super) fn cmd_status(base: &Config, args: StatusArgs) -> Result<()> {
    let report = collect(base, &args)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| MutexError::Io(format!("failed to serialize status: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    println!("Semaphore: {}", report.resource);
    println!("  Path:       {}", report.path.display());
    println!("  Capacity:   {}", report.capacity);
    println!("  Free:       {}", report.remaining);
    if report.holders.is_empty() {
        println!("  Holders:    none");
    } else {
        let pids: Vec<String> = report.holders.iter().map(u32::to_string).collect();
        println!("  Holders:    {}", pids.join(", "));
    }
    match report.updated_at {
        Some(at) => println!("  Updated:    {}", at.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
        None => println!("  Updated:    never"),
    }
    if report.remaining > report.capacity {
        println!();
        println!(
            "Note: {} free slot(s) exceed the capacity of {}; a release was not matched by an acquire.",
            report.remaining, report.capacity
        );
    }

    Ok(())
}

fn collect(base: &Config, args: &StatusArgs) -> Result<StatusReport> {
    let config = effective_config(base, &args.lock, args.capacity)?;
    let mut semaphore = Semaphore::with_options(read_only_options(&config, &args.lock.path))?;
    let state = semaphore.snapshot_until(Deadline::within(config.timeout()))?;
    Ok(StatusReport::new(&semaphore, state))
}
