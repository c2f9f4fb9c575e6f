//! Error types for the storage core.
//!
//! # Design
//!
//! - `thiserror` derives the taxonomy; `anyhow` is the escape hatch for
//!   contexts that don't deserve their own variant.
//! - The core surfaces errors; it never logs or prints (§7 propagation
//!   policy) — that's `tracing`'s job, wired up in `crate::logging`.
//! - Migration is the only component that attempts local recovery
//!   (rollback); everything else just returns `Result`.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for storage-core operations.
#[derive(Error, Debug)]
pub enum BeadsError {
    // === Not-found ===
    #[error("metadata.json not found in '{dir}'")]
    MetadataNotFound { dir: PathBuf },

    #[error("issues file not found at '{path}'")]
    IssuesNotFound { path: PathBuf },

    #[error("issue not found: {id}")]
    IssueNotFound { id: String },

    // === Parse/format ===
    #[error("failed to parse metadata.json: {reason}")]
    MetadataParseError { reason: String },

    #[error("JSONL parse error in '{path}' at line {line}: {reason}")]
    JsonlParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // === Version ===
    #[error("schema version {found} is newer than this build supports (current {current})")]
    SchemaVersionTooNew { found: u32, current: u32 },

    #[error("schema version {found} is older than the minimum supported ({min_supported})")]
    SchemaVersionTooOld { found: u32, min_supported: u32 },

    // === Integrity ===
    #[error("duplicate issue id: {id}")]
    DuplicateId { id: String },

    #[error("duplicate dependency: {issue_id} -> {depends_on_id} ({dep_type})")]
    DuplicateDependency {
        issue_id: String,
        depends_on_id: String,
        dep_type: String,
    },

    #[error("invalid issue: {reason}")]
    InvalidIssue { reason: String },

    #[error("invalid status: {status}")]
    InvalidStatus { status: String },

    #[error("priority must be 0-4, got: {priority}")]
    InvalidPriority { priority: i32 },

    // === I/O ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to back up '{path}': {reason}")]
    BackupFailed { path: PathBuf, reason: String },

    #[error("failed to update metadata.json: {reason}")]
    MetadataUpdateFailed { reason: String },

    // === Rollback chain ===
    #[error("migration from v{from_version} to v{to_version} failed: {reason}")]
    MigrationFailed {
        from_version: u32,
        to_version: u32,
        reason: String,
    },

    #[error(
        "rollback after failed migration could not restore '{path}' from backup \
         '{backup_path}': {reason} — repository is left in an inconsistent state"
    )]
    RollbackFailed {
        path: PathBuf,
        backup_path: PathBuf,
        reason: String,
    },

    #[error("migration registration rejected: {reason}")]
    MigrationRegistrationError { reason: String },

    #[error(
        "no registered migration starts at schema v{current} (earliest applicable starts at \
         v{first_applicable}) — the registered chain is not contiguous from the on-disk version"
    )]
    MigrationChainNotContiguous { current: u32, first_applicable: u32 },

    // === Mapped file ===
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("access denied: {path}")]
    AccessDenied { path: PathBuf },

    #[error("could not stat file: {path}")]
    InvalidFile { path: PathBuf },

    #[error("mmap failed for '{path}': {reason}")]
    MmapFailed { path: PathBuf, reason: String },

    // === SQL ===
    #[error("failed to open database at '{path}': {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to prepare statement: {0}")]
    PrepareFailed(#[source] rusqlite::Error),

    #[error("failed to bind parameter {index}: {source}")]
    BindFailed {
        index: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to step statement: {0}")]
    StepFailed(#[source] rusqlite::Error),

    #[error("failed to execute statement: {0}")]
    ExecuteFailed(#[source] rusqlite::Error),

    #[error("database busy: timed out waiting for lock")]
    BusyTimeout,

    #[error("database file is corrupt")]
    Corrupt,

    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("column {index} has an unexpected type: {reason}")]
    ColumnTypeMismatch { index: usize, reason: String },

    // === Resource ===
    #[error("out of memory: refused to allocate {requested} bytes (cap {cap})")]
    OutOfMemory { requested: usize, cap: usize },

    // === Escape hatch ===
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BeadsError {
    /// Classify a `rusqlite::Error` into the SQL-specific taxonomy variants
    /// `BusyTimeout`/`Corrupt` where applicable, otherwise wrap it plainly.
    #[must_use]
    pub fn from_sql(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, _) = &err {
            match ffi_err.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    return Self::BusyTimeout;
                }
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                    return Self::Corrupt;
                }
                _ => {}
            }
        }
        Self::Sql(err)
    }
}

/// Result type using `BeadsError`.
pub type Result<T> = std::result::Result<T, BeadsError>;
