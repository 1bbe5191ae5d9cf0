//! Process-existence checks used to reclaim slots held by dead processes.
//!
//! The semaphore only consults a probe while cleaning up at construction time.
//! A probe that is not available on the current platform disables cleanup,
//! which leaves dead holders' slots in place but never breaks acquire/release.

use std::path::Path;

/// Capability to ask whether a process currently exists.
pub trait ProcessProbe: Send + Sync {
    /// Whether this probe works on the current platform.
    fn is_available(&self) -> bool;

    /// Whether a process with `pid` currently exists.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probe backed by the `/proc` filesystem.
///
/// Available only where `/proc` is mounted (Linux and friends).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcFsProbe;

impl ProcessProbe for ProcFsProbe {
    fn is_available(&self) -> bool {
        Path::new("/proc").is_dir()
    }

    fn is_alive(&self, pid: u32) -> bool {
        // PID 0 is never a regular process
        pid != 0 && Path::new(&format!("/proc/{}", pid)).exists()
    }
}

/// Probe for platforms without a usable process table: cleanup never runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl ProcessProbe for NoProbe {
    fn is_available(&self) -> bool {
        false
    }

    fn is_alive(&self, _pid: u32) -> bool {
        true
    }
}

/// The probe used when the caller does not supply one.
pub fn default_probe() -> Box<dyn ProcessProbe> {
    Box::new(ProcFsProbe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_probe_is_never_available() {
        let probe = NoProbe;
        assert!(!probe.is_available());
        assert!(probe.is_alive(1));
        assert!(probe.is_alive(u32::MAX));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn procfs_probe_sees_current_process() {
        let probe = ProcFsProbe;
        assert!(probe.is_available());
        assert!(probe.is_alive(std::process::id()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn procfs_probe_reports_reaped_child_as_dead() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        assert!(!ProcFsProbe.is_alive(pid));
    }

    #[test]
    fn procfs_probe_rejects_pid_zero() {
        assert!(!ProcFsProbe.is_alive(0));
    }
}
