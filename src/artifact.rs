//! Best-effort copy of the last generated document on local disk.
//!
//! Concurrent encodes share one fixed file name per format: the last writer
//! wins, and readers never see a partially written file because every write
//! goes through its own temporary file followed by a rename.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Writes `contents` to `dir/file_name`. Failures are logged and reported as
/// `false`; they never reach the caller as errors.
pub fn persist(dir: &Path, file_name: &str, contents: &str) -> bool {
    let target = dir.join(file_name);
    match write_atomically(dir, &target, contents) {
        Ok(()) => {
            debug!(path = %target.display(), bytes = contents.len(), "wrote side file");
            true
        }
        Err(e) => {
            warn!(path = %target.display(), error = %e, "failed to write side file");
            false
        }
    }
}

fn write_atomically(dir: &Path, target: &Path, contents: &str) -> io::Result<()> {
    let temp = temp_path(dir, target);
    if let Err(e) = fs::write(&temp, contents).and_then(|()| fs::rename(&temp, target)) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    Ok(())
}

fn temp_path(dir: &Path, target: &Path) -> PathBuf {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let stem = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    dir.join(format!(".{}.{}.{}.tmp", stem, std::process::id(), seq))
}
