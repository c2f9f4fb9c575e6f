//! Storage configuration: where the repository lives on disk, and the
//! knobs that tune backup retention and SQL lock-wait behavior.
//!
//! Per spec.md §1, command-line parsing and the environment/config-file
//! precedence chain that would feed these values in a full CLI belong to
//! the excluded CLI layer. This module exposes sensible defaults plus an
//! explicit-override constructor for embedding callers.

use std::path::{Path, PathBuf};

use crate::error::{BeadsError, Result};

/// Default JSONL export filename.
pub const DEFAULT_JSONL_FILENAME: &str = "issues.jsonl";
/// Default `SqlAdapter` database filename.
pub const DEFAULT_SQLITE_FILENAME: &str = "beads.db";
/// Default number of pre-migration backups to retain (spec.md §6).
pub const DEFAULT_BACKUP_KEEP_COUNT: usize = 3;
/// Default SQL busy-timeout, matching `SqlAdapter`'s §4.7 contract.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Resolved paths and tunables for one repository directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// The repository root, i.e. the directory containing `metadata.json`.
    pub repo_dir: PathBuf,
    /// Absolute path to the JSONL issue log.
    pub jsonl_path: PathBuf,
    /// Absolute path to the metadata document.
    pub metadata_path: PathBuf,
    /// Absolute path to the optional SQLite database.
    pub sqlite_path: PathBuf,
    /// How many pre-migration backups `MigrationEngine::cleanup_backups`
    /// retains.
    pub backup_keep_count: usize,
    /// `SqlAdapter`'s busy-timeout, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl StorageConfig {
    /// Build a config rooted at `repo_dir` using every default.
    #[must_use]
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        let repo_dir = repo_dir.into();
        Self {
            jsonl_path: repo_dir.join(DEFAULT_JSONL_FILENAME),
            metadata_path: repo_dir.join("metadata.json"),
            sqlite_path: repo_dir.join(DEFAULT_SQLITE_FILENAME),
            repo_dir,
            backup_keep_count: DEFAULT_BACKUP_KEEP_COUNT,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Override the JSONL filename (kept relative to `repo_dir`).
    #[must_use]
    pub fn with_jsonl_filename(mut self, filename: impl AsRef<Path>) -> Self {
        self.jsonl_path = self.repo_dir.join(filename);
        self
    }

    /// Override the SQLite filename (kept relative to `repo_dir`).
    #[must_use]
    pub fn with_sqlite_filename(mut self, filename: impl AsRef<Path>) -> Self {
        self.sqlite_path = self.repo_dir.join(filename);
        self
    }

    /// Override the backup retention count.
    #[must_use]
    pub const fn with_backup_keep_count(mut self, keep_count: usize) -> Self {
        self.backup_keep_count = keep_count;
        self
    }

    /// Override the SQL busy-timeout.
    #[must_use]
    pub const fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }

    /// Ensure `repo_dir` exists, creating it (and parents) if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_repo_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_dir).map_err(BeadsError::Io)
    }
}
