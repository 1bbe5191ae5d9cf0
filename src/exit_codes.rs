//! Exit code constants for the filemutex CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: I/O failure on the lock file
//! - 3: Deadline elapsed while waiting
//! - 4: Misuse (illegal lock state, corrupt state file, capacity overflow)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// The lock file could not be opened, locked, read or written.
pub const IO_FAILURE: i32 = 2;

/// A `--timeout-ms` deadline elapsed before the lock or a slot was obtained.
pub const TIMEOUT: i32 = 3;

/// Illegal lock state, unparsable state file, or strict-release overflow.
pub const MISUSE: i32 = 4;
