//! The `clean` command: reclaim slots of dead holders and report what changed.

use super::effective_config;
use crate::backoff::Deadline;
use crate::cli::CleanArgs;
use crate::config::Config;
use crate::error::Result;
use crate::semaphore::{CleanReport, Semaphore, SemaphoreOptions};

/// Run stale-holder cleanup on the semaphore at `args.lock.path`.
pub(super) fn cmd_clean(base: &Config, args: CleanArgs) -> Result<()> {
    let config = effective_config(base, &args.lock, args.capacity)?;
    let semaphore = Semaphore::with_options(
        SemaphoreOptions::new(config.capacity, config.retry_delay(), &args.lock.path)
            .resource_name(config.resource_name_or_default())
            .cleanup_deadline(Deadline::within(config.timeout())),
    )?;

    print_report(&semaphore, semaphore.last_cleanup());
    Ok(())
}

fn print_report(semaphore: &Semaphore, report: &CleanReport) {
    if report.skipped {
        println!("Process checks are not available on this platform; nothing was cleaned.");
        return;
    }

    if report.reclaimed.is_empty() {
        println!("No dead holders on {}.", semaphore.resource_name());
    } else {
        let pids: Vec<String> = report.reclaimed.iter().map(u32::to_string).collect();
        println!(
            "Reclaimed {} slot(s) on {} from dead holder(s): {}",
            report.reclaimed.len(),
            semaphore.resource_name(),
            pids.join(", ")
        );
    }

    if report.truncated {
        println!("No holders remain; state reset to {} free slot(s).", semaphore.capacity());
    }
}
