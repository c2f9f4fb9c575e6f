//! C9: `metadata.json`, read tolerantly and rewritten atomically
//! (spec.md §4.9).

use std::path::Path;

use crate::atomic_writer;
use crate::error::{BeadsError, Result};
use crate::model::Metadata;

/// Read `metadata.json` at `path`. Returns `Ok(None)` if the file does not
/// exist — callers treat that as "assume schema version 1" per
/// `migration.rs`'s step 1.
///
/// # Errors
///
/// Returns [`BeadsError::MetadataParseError`] if the file exists but is not
/// valid JSON for the `Metadata` shape.
pub fn read(path: impl AsRef<Path>) -> Result<Option<Metadata>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path).map_err(BeadsError::Io)?;
    let metadata: Metadata =
        serde_json::from_str(&contents).map_err(|err| BeadsError::MetadataParseError {
            reason: err.to_string(),
        })?;
    Ok(Some(metadata))
}

/// Atomically rewrite `metadata.json` at `path`.
///
/// # Errors
///
/// Returns an error if serialization or the atomic write fails.
pub fn write(path: impl AsRef<Path>, metadata: &Metadata) -> Result<()> {
    let mut json = serde_json::to_string_pretty(metadata).map_err(BeadsError::Json)?;
    json.push('\n');
    atomic_writer::write(path, json.as_bytes())
}
