//! Atomic file writes with advisory locking.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use fs2::FileExt;

/// Write content atomically to a file.
///
/// Writes to a temp file in the target directory (same filesystem), holding
/// an advisory exclusive lock while writing, then renames over the target.
/// Readers never observe a partial write.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)?;

    temp_file.lock_exclusive()?;
    let result = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all());
    let unlock_result = fs2::FileExt::unlock(&temp_file);
    result?;
    unlock_result?;

    fs::rename(&temp_path, path)
}
