//! C2: read-only, zero-copy memory mapping of a file (spec.md §4.2).
//!
//! Implemented over the `memmap2` crate, which wraps `mmap`/
//! `CreateFileMapping`+`MapViewOfFile` behind a constructor that is
//! `unsafe` for an unavoidable reason: nothing stops another process from
//! truncating the file out from under the mapping. This is the one place
//! in the crate `unsafe_code` is not forbidden outright (see `Cargo.toml`);
//! every other module goes through safe-only crates.
#![allow(unsafe_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{BeadsError, Result};

/// A read-only memory mapping of a file, or the empty-file stand-in.
///
/// The returned slice from [`MappedFile::data`] borrows `&self` and so
/// cannot outlive the `MappedFile` — the compiler enforces the "invalid
/// after close" rule from the spec for us.
pub struct MappedFile {
    // `None` for a zero-length file: mapping a zero-length file is
    // undefined behavior on POSIX, so memmap2 refuses it and we model the
    // empty case without ever calling into it.
    mmap: Option<Mmap>,
    path: PathBuf,
}

impl MappedFile {
    /// Map `path` read-only. A zero-length file yields an empty slice and
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::FileNotFound`] if `path` does not exist,
    /// [`BeadsError::AccessDenied`] if it cannot be opened for reading,
    /// [`BeadsError::InvalidFile`] if its length cannot be determined, or
    /// [`BeadsError::MmapFailed`] if the mapping syscall itself fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => BeadsError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => BeadsError::AccessDenied {
                path: path.to_path_buf(),
            },
            _ => BeadsError::Io(err),
        })?;

        let len = file
            .metadata()
            .map_err(|_| BeadsError::InvalidFile {
                path: path.to_path_buf(),
            })?
            .len();

        if len == 0 {
            return Ok(Self {
                mmap: None,
                path: path.to_path_buf(),
            });
        }

        // SAFETY: the mapping is read-only and scoped to this process's
        // view of `file`; we accept the standard mmap caveat that a
        // concurrent truncation of the underlying file is undefined
        // behavior, matching every other safe wrapper around `mmap`.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|err| BeadsError::MmapFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        tracing::debug!(path = %path.display(), len, "mapped file");

        Ok(Self {
            mmap: Some(mmap),
            path: path.to_path_buf(),
        })
    }

    /// The mapped bytes, or an empty slice for a zero-length file.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// The length of the mapped region.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Whether the mapped region is empty (zero-length source file).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release the mapping and the underlying file handle.
    pub fn close(self) {
        tracing::debug!(path = %self.path.display(), "closed mapped file");
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_file_not_found() {
        let err = MappedFile::open("/nonexistent/path/does-not-exist").unwrap_err();
        assert!(matches!(err, BeadsError::FileNotFound { .. }));
    }

    #[test]
    fn zero_length_file_yields_empty_slice_without_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mapped = MappedFile::open(tmp.path()).unwrap();
        assert!(mapped.is_empty());
        assert_eq!(mapped.data(), b"");
        assert_eq!(mapped.len(), 0);
    }

    #[test]
    fn nonempty_file_maps_exact_bytes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello\nworld\n").unwrap();
        tmp.flush().unwrap();

        let mapped = MappedFile::open(tmp.path()).unwrap();
        assert_eq!(mapped.data(), b"hello\nworld\n");
        assert_eq!(mapped.len(), 12);
    }
}
