//! C5: sequential schema migration with backup/rollback (spec.md §4.5).
//!
//! Grounded on the teacher's `sync::history` backup-before-export/rotate
//! idiom, generalized into a migration-apply loop: copy the issues file
//! before touching it, apply each registered transform in order, and
//! restore the copy on any failure.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::atomic_writer;
use crate::config::DEFAULT_JSONL_FILENAME;
use crate::error::{BeadsError, Result};
use crate::metadata::{self, Metadata};

/// The schema version this build writes and reads natively.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
/// The oldest schema version this build can still migrate forward from.
pub const MIN_SUPPORTED_VERSION: u32 = 1;

/// A single schema transform, from one version to the next.
///
/// `transform` receives the full `issues.jsonl` contents and returns
/// `Some(new_contents)` to rewrite the file, or `None` if this version
/// step requires no change to the issues file (e.g. a metadata-only
/// bump).
pub trait Migration {
    fn from_version(&self) -> u32;
    fn to_version(&self) -> u32;

    /// # Errors
    ///
    /// Returns an error if the transform cannot be applied to `content`.
    fn transform(&self, content: &str) -> Result<Option<String>>;
}

/// The outcome of one [`MigrationEngine::migrate_if_needed`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    pub migrated: bool,
    pub from_version: u32,
    pub to_version: u32,
    pub migrations_applied: usize,
    pub backup_path: Option<PathBuf>,
}

/// Holds the ordered, contiguity-validated registry of migrations and
/// drives `migrate_if_needed` against a repository directory.
#[derive(Default)]
pub struct MigrationEngine {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `migration`, appended after any already-registered
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::MigrationRegistrationError`] if
    /// `from_version >= to_version`, or if it does not chain
    /// contiguously onto the most recently registered migration's
    /// `to_version` (an implementer-enforced invariant per spec.md §9 —
    /// the source registry is silent on ordering, so registration-time
    /// validation rejects gaps rather than discovering them mid-run).
    pub fn register(&mut self, migration: Box<dyn Migration>) -> Result<()> {
        if migration.from_version() >= migration.to_version() {
            return Err(BeadsError::MigrationRegistrationError {
                reason: format!(
                    "migration from_version {} must be less than to_version {}",
                    migration.from_version(),
                    migration.to_version()
                ),
            });
        }
        if let Some(last) = self.migrations.last() {
            if migration.from_version() != last.to_version() {
                return Err(BeadsError::MigrationRegistrationError {
                    reason: format!(
                        "migration from_version {} does not chain onto the previously \
                         registered migration's to_version {} — registered migrations \
                         must be contiguous",
                        migration.from_version(),
                        last.to_version()
                    ),
                });
            }
        }
        self.migrations.push(migration);
        Ok(())
    }

    /// Bring the repository at `dir` up to [`CURRENT_SCHEMA_VERSION`],
    /// applying registered migrations in order with backup/rollback.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::SchemaVersionTooNew`] or
    /// [`BeadsError::SchemaVersionTooOld`] if the on-disk version is out
    /// of the supported range, [`BeadsError::MigrationFailed`] if a
    /// transform fails (after a successful rollback), or
    /// [`BeadsError::RollbackFailed`] if the rollback copy itself fails.
    pub fn migrate_if_needed(&self, dir: impl AsRef<Path>) -> Result<MigrationResult> {
        let dir = dir.as_ref();
        let metadata_path = dir.join("metadata.json");
        let current = metadata::read(&metadata_path)?.map_or(1, |meta| meta.schema_version);

        if current == CURRENT_SCHEMA_VERSION {
            tracing::debug!(current, "schema already at current version, no migration needed");
            return Ok(MigrationResult {
                migrated: false,
                from_version: current,
                to_version: CURRENT_SCHEMA_VERSION,
                migrations_applied: 0,
                backup_path: None,
            });
        }
        if current > CURRENT_SCHEMA_VERSION {
            return Err(BeadsError::SchemaVersionTooNew {
                found: current,
                current: CURRENT_SCHEMA_VERSION,
            });
        }
        if current < MIN_SUPPORTED_VERSION {
            return Err(BeadsError::SchemaVersionTooOld {
                found: current,
                min_supported: MIN_SUPPORTED_VERSION,
            });
        }

        let applicable: Vec<&dyn Migration> = self
            .migrations
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| m.from_version() >= current && m.to_version() <= CURRENT_SCHEMA_VERSION)
            .collect();

        check_starts_at_current(&applicable, current)?;

        let issues_path = dir.join(DEFAULT_JSONL_FILENAME);
        let backup_path = if issues_path.exists() {
            let path = backup_path_for(&issues_path, current);
            fs::copy(&issues_path, &path).map_err(|err| BeadsError::BackupFailed {
                path: path.clone(),
                reason: err.to_string(),
            })?;
            tracing::info!(backup = %path.display(), "created pre-migration backup");
            Some(path)
        } else {
            None
        };

        let mut applied = 0usize;
        let mut to_version = current;
        for migration in applicable.iter().copied() {
            match self.apply_one(migration, &issues_path) {
                Ok(()) => {
                    applied += 1;
                    to_version = migration.to_version();
                }
                Err(err) => {
                    self.rollback(&issues_path, backup_path.as_deref())?;
                    return Err(BeadsError::MigrationFailed {
                        from_version: migration.from_version(),
                        to_version: migration.to_version(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let existing_meta = metadata::read(&metadata_path)?;
        let new_meta = Metadata {
            schema_version: to_version,
            created_at: existing_meta
                .as_ref()
                .map_or_else(|| chrono::Utc::now().to_rfc3339(), |m| m.created_at.clone()),
            bz_version: env!("CARGO_PKG_VERSION").to_string(),
            prefix: existing_meta.map_or_else(|| "bd".to_string(), |m| m.prefix),
        };
        if let Err(err) = metadata::write(&metadata_path, &new_meta) {
            self.rollback(&issues_path, backup_path.as_deref())?;
            return Err(BeadsError::MetadataUpdateFailed {
                reason: err.to_string(),
            });
        }

        tracing::info!(from = current, to = to_version, applied, "migration complete");
        Ok(MigrationResult {
            migrated: applied > 0,
            from_version: current,
            to_version,
            migrations_applied: applied,
            backup_path,
        })
    }

    fn apply_one(&self, migration: &dyn Migration, issues_path: &Path) -> Result<()> {
        let content = if issues_path.exists() {
            fs::read_to_string(issues_path).map_err(BeadsError::Io)?
        } else {
            String::new()
        };
        if let Some(new_content) = migration.transform(&content)? {
            atomic_writer::write(issues_path, new_content.as_bytes())?;
        }
        Ok(())
    }

    fn rollback(&self, issues_path: &Path, backup_path: Option<&Path>) -> Result<()> {
        let Some(backup_path) = backup_path else {
            return Ok(());
        };
        fs::copy(backup_path, issues_path).map_err(|err| BeadsError::RollbackFailed {
            path: issues_path.to_path_buf(),
            backup_path: backup_path.to_path_buf(),
            reason: err.to_string(),
        })?;
        tracing::warn!(backup = %backup_path.display(), "migration failed, rolled back from backup");
        Ok(())
    }
}

fn backup_path_for(issues_path: &Path, from_version: u32) -> PathBuf {
    let file_name = issues_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSONL_FILENAME);
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let backup_name = format!("{file_name}.backup-v{from_version}-{epoch}");
    issues_path
        .parent()
        .map_or_else(|| PathBuf::from(&backup_name), |parent| parent.join(backup_name))
}

/// Enumerate pre-migration backups of `<dir>/issues.jsonl`, sorted
/// oldest-first by name (the embedded epoch timestamp makes name order
/// chronological), and delete all but the newest `keep_count`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or a stale backup
/// cannot be removed.
pub fn cleanup_backups(dir: impl AsRef<Path>, keep_count: usize) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let prefix = format!("{DEFAULT_JSONL_FILENAME}.backup-v");

    let mut backups: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(BeadsError::Io)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .collect();
    backups.sort();

    let removed_count = backups.len().saturating_sub(keep_count);
    let mut removed = Vec::with_capacity(removed_count);
    for path in backups.into_iter().take(removed_count) {
        fs::remove_file(&path).map_err(BeadsError::Io)?;
        removed.push(path);
    }
    Ok(removed)
}

/// Check a raw schema version against the supported range without
/// running any migration.
///
/// # Errors
///
/// Returns [`BeadsError::SchemaVersionTooNew`] or
/// [`BeadsError::SchemaVersionTooOld`] if out of range.
pub fn check_schema_version(found: u32) -> Result<()> {
    if found > CURRENT_SCHEMA_VERSION {
        return Err(BeadsError::SchemaVersionTooNew {
            found,
            current: CURRENT_SCHEMA_VERSION,
        });
    }
    if found < MIN_SUPPORTED_VERSION {
        return Err(BeadsError::SchemaVersionTooOld {
            found,
            min_supported: MIN_SUPPORTED_VERSION,
        });
    }
    Ok(())
}

/// Verify the selected migration subsequence is contiguous *from
/// `current`* (spec.md §4.5 step 5), not merely bounded by it. An empty
/// `applicable` slice is always fine — it means `current` is already
/// where the bounding filter wants it, or there is simply nothing
/// registered to run.
fn check_starts_at_current(applicable: &[&dyn Migration], current: u32) -> Result<()> {
    if let Some(first) = applicable.first() {
        if first.from_version() != current {
            return Err(BeadsError::MigrationChainNotContiguous {
                current,
                first_applicable: first.from_version(),
            });
        }
    }
    Ok(())
}
