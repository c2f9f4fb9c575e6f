//! Storage core for a JSONL-backed issue tracker.
//!
//! This crate is the persistence layer only: an in-memory issue store with
//! CRUD, filtering, and fuzzy id lookup; a JSONL codec backed by zero-copy
//! memory-mapped reads and vectorized newline scanning; a sequential schema
//! migration engine with atomic file replacement and backup/rollback; an
//! optional embedded-SQL adapter for index-heavy queries; and a process-local
//! lock-contention metrics sink. Command-line parsing, terminal rendering,
//! id-generation policy, git integration, and network sync are out of scope
//! — they are expected to sit above this crate, consuming it only through
//! the public API re-exported here.
//!
//! # Layout
//!
//! - [`model`] — `Issue`, `Status`, `IssueType`, `DependencyType`,
//!   `Dependency`, `Comment`, `Priority`, `Metadata`.
//! - [`store`] — [`store::IssueStore`], the in-memory authoritative model.
//! - [`jsonl`] — line-oriented encode/decode of issues.
//! - [`mmap_file`] — read-only, zero-copy file mapping.
//! - [`line_scan`] — vectorized newline scanning over byte buffers.
//! - [`atomic_writer`] — write-temp-then-rename file replacement.
//! - [`migration`] — sequential schema migration with backup/rollback.
//! - [`metadata`] — `metadata.json` read/write.
//! - [`storage`] — the optional embedded-SQL adapter.
//! - [`lock_metrics`] — process-wide lock-contention counters.
//! - [`config`] — repository paths and tunables.
//! - [`error`] — the `BeadsError` taxonomy.
//! - [`logging`] — `tracing` subscriber setup for embedding binaries.

pub mod atomic_writer;
pub mod config;
pub mod error;
pub mod jsonl;
pub mod line_scan;
pub mod lock_metrics;
pub mod logging;
pub mod metadata;
pub mod migration;
pub mod mmap_file;
pub mod model;
pub mod storage;
pub mod store;
pub mod util;

pub use error::{BeadsError, Result};
pub use model::{Comment, Dependency, DependencyType, Issue, IssueType, Metadata, Priority, Status};
pub use store::IssueStore;
