//! Scratch files backing the byte store.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static FIRST_USE: OnceLock<u64> = OnceLock::new();
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Wall-clock milliseconds when this process first named a scratch file.
fn first_use_millis() -> u64 {
    *FIRST_USE.get_or_init(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    })
}

/// Next scratch file name for this process.
///
/// Names combine the time of the first scratch file in this process, the
/// process id and a per-process sequence number, so concurrent sessions and
/// processes never collide.
pub(crate) fn next_file_name() -> String {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "pdec-{}-{}-{}.part",
        first_use_millis(),
        process::id(),
        sequence
    )
}

/// Creates a fresh read/write scratch file in `dir`.
pub(crate) fn create_in(dir: &Path) -> io::Result<(File, PathBuf)> {
    let path = dir.join(next_file_name());
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(&path)?;
    Ok((file, path))
}

pub(crate) fn remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
