use crate::process::ProcessProbe;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A scratch directory plus a lock file path inside it.
pub(crate) fn temp_lock_path(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    (temp_dir, path)
}

/// Probe that treats a fixed set of PIDs as dead and everything else as alive.
#[derive(Debug, Default)]
pub(crate) struct FakeProbe {
    dead: BTreeSet<u32>,
}

impl FakeProbe {
    pub(crate) fn with_dead(pids: &[u32]) -> Self {
        Self {
            dead: pids.iter().copied().collect(),
        }
    }
}

impl ProcessProbe for FakeProbe {
    fn is_available(&self) -> bool {
        true
    }

    fn is_alive(&self, pid: u32) -> bool {
        !self.dead.contains(&pid)
    }
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber installed on the current thread and return
/// everything it logged alongside the closure's result.
pub(crate) fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buf = SharedBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let bytes = buf.0.lock().unwrap_or_else(|poison| poison.into_inner()).clone();
    (result, String::from_utf8_lossy(&bytes).into_owned())
}
