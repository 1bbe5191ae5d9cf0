//! Command implementations for filemutex.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, after merging the optional config file with the flags.

mod clean;
mod hold;
mod status;

use crate::cli::{Cli, Command, LockArgs};
use crate::config::Config;
use crate::error::Result;
use crate::process::NoProbe;
use crate::semaphore::SemaphoreOptions;
use std::path::Path;

/// Dispatch a command to its implementation.
///
/// Loads `--config` when given; flags override the file's values.
pub fn dispatch(cli: Cli) -> Result<()> {
    let base = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Mutex(args) => hold::cmd_mutex(&base, args),
        Command::Semaphore(args) => hold::cmd_semaphore(&base, args),
        Command::Status(args) => status::cmd_status(&base, args),
        Command::Clean(args) => clean::cmd_clean(&base, args),
    }
}

/// Apply command-line overrides on top of the loaded config and validate the result.
pub(crate) fn effective_config(
    base: &Config,
    lock: &LockArgs,
    capacity: Option<u32>,
) -> Result<Config> {
    let mut config = base.clone();

    if let Some(retry_delay_ms) = lock.retry_delay_ms {
        config.retry_delay_ms = retry_delay_ms;
    }
    if let Some(timeout_ms) = lock.timeout_ms {
        config.timeout_ms = Some(timeout_ms);
    }
    if let Some(resource) = &lock.resource {
        config.resource_name = Some(resource.clone());
    }
    if let Some(capacity) = capacity {
        config.capacity = capacity;
    }

    config.validate()?;
    Ok(config)
}

/// Semaphore options that read the file without reclaiming anything.
fn read_only_options(config: &Config, path: &Path) -> SemaphoreOptions {
    SemaphoreOptions::new(config.capacity, config.retry_delay(), path)
        .resource_name(config.resource_name_or_default())
        .probe(Box::new(NoProbe))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MutexError;
    use crate::exit_codes;
    use std::path::PathBuf;

    fn lock_args(path: &str) -> LockArgs {
        LockArgs {
            path: PathBuf::from(path),
            retry_delay_ms: None,
            resource: None,
            timeout_ms: None,
        }
    }

    #[test]
    fn effective_config_keeps_file_values_without_flags() {
        let base = Config {
            retry_delay_ms: 40,
            capacity: 3,
            ..Config::default()
        };

        let config = effective_config(&base, &lock_args("/tmp/x"), None).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn effective_config_flags_override_file() {
        let base = Config {
            retry_delay_ms: 40,
            capacity: 3,
            resource_name: Some("from file".to_string()),
            ..Config::default()
        };
        let lock = LockArgs {
            retry_delay_ms: Some(15),
            resource: Some("from flag".to_string()),
            timeout_ms: Some(500),
            ..lock_args("/tmp/x")
        };

        let config = effective_config(&base, &lock, Some(7)).unwrap();
        assert_eq!(config.retry_delay_ms, 15);
        assert_eq!(config.timeout_ms, Some(500));
        assert_eq!(config.capacity, 7);
        assert_eq!(config.resource_name_or_default(), "from flag");
    }

    #[test]
    fn effective_config_validates_overrides() {
        let err = effective_config(&Config::default(), &lock_args("/tmp/x"), Some(0)).unwrap_err();
        assert!(matches!(err, MutexError::Config(_)));
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }
}
