//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the mutex and semaphore commands.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Retry settings
    // =========================================================================
    /// Nominal milliseconds between attempts (default: 100).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Give up after this many milliseconds. Absent means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    // =========================================================================
    // Semaphore settings
    // =========================================================================
    /// Number of slots (default: 1).
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Reject releases that would push the free count above capacity.
    #[serde(default)]
    pub strict_release: bool,

    // =========================================================================
    // Notification settings
    // =========================================================================
    /// Name used in wait notifications. Absent means the lock file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

// Default value functions for serde
fn default_retry_delay_ms() -> u64 {
    100
}
fn default_capacity() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: None,
            capacity: default_capacity(),
            strict_release: false,
            resource_name: None,
        }
    }
}

impl Config {
    /// Nominal retry delay as a `Duration`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Optional timeout as a `Duration`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Resource name for notifications; empty lets the primitives fall back to the path.
    pub fn resource_name_or_default(&self) -> &str {
        self.resource_name.as_deref().unwrap_or("")
    }
}
