//! C4: write-temp-then-rename atomic file replacement (spec.md §4.4).
//!
//! Grounded on the teacher's `sync::mod::export_to_jsonl_with_policy`
//! temp-write-then-rename path: create a sibling temp file, write, fsync,
//! close, then rename over the target. The temp file is always created as
//! a sibling of the target (never a different directory) so the final
//! rename stays on one filesystem and is atomic.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{BeadsError, Result};

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn temp_path_for(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    let temp_name = format!("{file_name}.tmp.{}", epoch_secs());
    target
        .parent()
        .map_or_else(|| PathBuf::from(&temp_name), |parent| parent.join(temp_name))
}

/// Write `bytes` to `path` via write-temp, fsync, rename.
///
/// On any error before the rename the temp file is unlinked and `path` is
/// left untouched. On a rename failure the target is likewise left
/// untouched (the OS guarantees `rename` is all-or-nothing on the same
/// filesystem).
///
/// # Errors
///
/// Returns an error if the temp file cannot be created or written, fsync
/// fails, or the rename fails.
pub fn write(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let temp_path = temp_path_for(path);

    let result = write_and_rename(path, &temp_path, bytes);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename(path: &Path, temp_path: &Path, bytes: &[u8]) -> Result<()> {
    {
        let file = File::create(temp_path).map_err(BeadsError::Io)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes).map_err(BeadsError::Io)?;
        writer.flush().map_err(BeadsError::Io)?;
        writer
            .into_inner()
            .map_err(|err| BeadsError::Io(err.into_error()))?
            .sync_all()
            .map_err(BeadsError::Io)?;
    }

    fs::rename(temp_path, path).map_err(BeadsError::Io)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "atomic write committed");
    Ok(())
}
