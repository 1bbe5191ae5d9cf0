//! CLI argument parsing for filemutex.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// filemutex: cross-process mutex and counting semaphore on advisory file locks.
///
/// Processes that share nothing but a lock file path can:
/// - serialize work with a mutex
/// - bound concurrency with a semaphore whose state lives in the lock file
#[derive(Parser, Debug)]
#[command(name = "filemutex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML file with default settings (retry delay, capacity, timeout...).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show lock file and state diagnostics.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for filemutex.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Hold the mutex on a lock file for a while.
    ///
    /// Waits (with notifications) while another process holds it.
    Mutex(MutexArgs),

    /// Hold one slot of a semaphore for a while.
    ///
    /// Waits (with notifications) while every slot is taken.
    Semaphore(SemaphoreArgs),

    /// Show the persisted state of a semaphore.
    ///
    /// Reads the lock file under the mutex without changing it.
    Status(StatusArgs),

    /// Reclaim slots held by processes that no longer exist.
    Clean(CleanArgs),
}

/// Options shared by every command that takes the lock.
#[derive(Args, Debug, Clone)]
pub struct LockArgs {
    /// Path of the shared lock file (created if missing).
    pub path: PathBuf,

    /// Nominal milliseconds between attempts.
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Name shown in wait notifications (default: the lock file path).
    #[arg(long)]
    pub resource: Option<String>,

    /// Give up after this many milliseconds instead of waiting forever.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Arguments for the `mutex` command.
#[derive(Args, Debug)]
pub struct MutexArgs {
    #[command(flatten)]
    pub lock: LockArgs,

    /// Milliseconds to hold the lock once acquired.
    #[arg(long, default_value_t = 3000)]
    pub hold_ms: u64,

    /// Append `acquired <pid>` / `releasing <pid>` lines to this file.
    #[arg(long)]
    pub journal: Option<PathBuf>,
}

/// Arguments for the `semaphore` command.
#[derive(Args, Debug)]
pub struct SemaphoreArgs {
    #[command(flatten)]
    pub lock: LockArgs,

    /// Number of slots.
    #[arg(short, long)]
    pub capacity: Option<u32>,

    /// Milliseconds to hold the slot once acquired.
    #[arg(long, default_value_t = 3000)]
    pub hold_ms: u64,

    /// Exit without releasing the slot, like a crashed holder would.
    #[arg(long)]
    pub leak: bool,

    /// Fail instead of raising the free count above capacity on release.
    #[arg(long)]
    pub strict_release: bool,

    /// Append `acquired <pid>` / `releasing <pid>` lines to this file.
    #[arg(long)]
    pub journal: Option<PathBuf>,
}

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub lock: LockArgs,

    /// Number of slots (used when the file is empty).
    #[arg(short, long)]
    pub capacity: Option<u32>,

    /// Print the state as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `clean` command.
#[derive(Args, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub lock: LockArgs,

    /// Number of slots (used when the file is empty).
    #[arg(short, long)]
    pub capacity: Option<u32>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
