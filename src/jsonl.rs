//! C3: one-object-per-line JSON encode/decode (spec.md §4.3).
//!
//! Reads are zero-copy: the file is mapped via `mmap_file::MappedFile` and
//! split into lines via `line_scan`, matching the control flow sketched in
//! spec.md §2 ("MappedFile+LineScanner+JsonlCodec drive in-place
//! rewrites"). Writes serialize each issue on its own line and hand the
//! buffer to `atomic_writer`.

use std::path::Path;

use crate::atomic_writer;
use crate::error::{BeadsError, Result};
use crate::mmap_file::MappedFile;
use crate::model::Issue;

/// Parse every issue out of the JSONL file at `path`.
///
/// Blank lines and lines beginning with `#` are ignored. A file that does
/// not exist yet reads as zero issues (the fresh-repository case — see
/// spec.md §8 scenario E1). A malformed line aborts with
/// [`BeadsError::JsonlParse`] naming the 1-based line number.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be mapped, or if any
/// non-blank, non-comment line fails to parse as an `Issue`.
pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Issue>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mapped = MappedFile::open(path)?;
    let mut issues = Vec::new();

    for (idx, line) in crate::line_scan::iterate(mapped.data()).enumerate() {
        let line_num = idx + 1;
        let trimmed = trim_ascii(line);
        if trimmed.is_empty() || trimmed.first() == Some(&b'#') {
            continue;
        }

        let issue: Issue = serde_json::from_slice(trimmed).map_err(|err| BeadsError::JsonlParse {
            path: path.to_path_buf(),
            line: line_num,
            reason: err.to_string(),
        })?;
        issues.push(issue);
    }

    Ok(issues)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

/// Serialize `issues`, one per line, and atomically replace `path` with the
/// result. Field ordering within each line is `Issue`'s declaration order
/// (`serde_json` preserves struct field order for non-map types); omitted
/// optional fields are absent, not `null`.
///
/// # Errors
///
/// Returns an error if any issue fails to serialize, or the atomic write
/// fails.
pub fn write_all(path: impl AsRef<Path>, issues: &[Issue]) -> Result<()> {
    let mut buf = Vec::new();
    for issue in issues {
        serde_json::to_writer(&mut buf, issue).map_err(BeadsError::Json)?;
        buf.push(b'\n');
    }
    atomic_writer::write(path, &buf)
}
