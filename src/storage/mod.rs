//! C7: an embedded SQL engine behind a reusable, schema-agnostic
//! adapter (spec.md §4.7).
//!
//! The teacher's `storage::sqlite::SqliteStorage` bakes the issues/
//! dependencies/labels/comments/events tables straight into its open()
//! call; this adapter generalizes its connection setup (WAL, NORMAL
//! synchronous, foreign_keys, busy timeout) and prepared-statement
//! idiom into something any caller can point at an arbitrary schema —
//! `IssueStore`'s default backend is the JSONL path, so the SQL side
//! here is an optional indexed-query alternative, not the only store.

mod sql_adapter;

pub use sql_adapter::{RowValues, SqlAdapter, Statement, StepResult};
