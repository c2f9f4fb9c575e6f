//! Connection setup, prepared statements, and transactions for the
//! embedded SQL backend (spec.md §4.7).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};

use crate::error::{BeadsError, Result};

/// A connection configured per spec.md §4.7: WAL journal, NORMAL
/// synchronous, foreign keys on, and a bounded busy timeout.
pub struct SqlAdapter {
    conn: Connection,
    last_error: RefCell<Option<String>>,
}

impl SqlAdapter {
    /// Open `path`, applying the standard pragmas with the default 5 s
    /// busy timeout.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::OpenFailed`] if the connection cannot be
    /// established, or a classified SQL error if a pragma fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, crate::config::DEFAULT_BUSY_TIMEOUT_MS)
    }

    /// Open `path` with an explicit busy-timeout in milliseconds.
    ///
    /// # Errors
    ///
    /// See [`SqlAdapter::open`].
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| BeadsError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::configure(&conn, busy_timeout_ms)?;
        tracing::debug!(path = %path.display(), busy_timeout_ms, "sql adapter opened");
        Ok(Self {
            conn,
            last_error: RefCell::new(None),
        })
    }

    /// Open a private in-memory database, for tests and scratch use.
    ///
    /// # Errors
    ///
    /// See [`SqlAdapter::open`].
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(BeadsError::from_sql)?;
        Self::configure(&conn, crate::config::DEFAULT_BUSY_TIMEOUT_MS)?;
        Ok(Self {
            conn,
            last_error: RefCell::new(None),
        })
    }

    fn configure(conn: &Connection, busy_timeout_ms: u64) -> Result<()> {
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
            .map_err(BeadsError::from_sql)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(BeadsError::from_sql)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(BeadsError::from_sql)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(BeadsError::from_sql)?;
        Ok(())
    }

    fn note_error(&self, message: impl Into<String>) {
        *self.last_error.borrow_mut() = Some(message.into());
    }

    /// Execute arbitrary SQL with no parameters (DDL, pragmas, one-off
    /// statements).
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::ExecuteFailed`] on failure.
    pub fn exec(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(|err| {
            self.note_error(err.to_string());
            BeadsError::ExecuteFailed(err)
        })
    }

    /// Prepare `sql` for repeated, parameterized execution.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::PrepareFailed`] on failure.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        let inner = self.conn.prepare(sql).map_err(|err| {
            self.note_error(err.to_string());
            BeadsError::PrepareFailed(err)
        })?;
        Ok(Statement {
            inner,
            params: Vec::new(),
            buffered_rows: None,
        })
    }

    /// The row id of the most recent successful `INSERT`.
    #[must_use]
    pub fn last_insert_row_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Rows affected by the most recently completed statement.
    #[must_use]
    pub fn changes(&self) -> i64 {
        i64::try_from(self.conn.changes()).unwrap_or(i64::MAX)
    }

    /// The most recently recorded failure message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Run `body` inside `BEGIN IMMEDIATE` / `COMMIT`. On failure,
    /// `ROLLBACK` is issued (its own error is swallowed) and the
    /// original failure is re-surfaced.
    ///
    /// # Errors
    ///
    /// Returns whatever error `body` returned, or a transaction-control
    /// failure if `BEGIN`/`COMMIT` itself fails.
    pub fn transaction<T>(&self, body: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE").map_err(|err| {
            self.note_error(err.to_string());
            BeadsError::ExecuteFailed(err)
        })?;

        match body(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT").map_err(|err| {
                    self.note_error(err.to_string());
                    BeadsError::ExecuteFailed(err)
                })?;
                Ok(value)
            }
            Err(original) => {
                if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback_err, "rollback after failed transaction also failed");
                }
                Err(original)
            }
        }
    }
}

/// A value bound to a positional parameter.
#[derive(Debug, Clone)]
enum ParamValue {
    Text(Option<String>),
    Int(Option<i64>),
}

impl ToSql for ParamValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        match self {
            Self::Text(value) => value.to_sql(),
            Self::Int(value) => value.to_sql(),
        }
    }
}

/// A prepared statement: positional nullable binding, typed column
/// access with NULL detection, and an imperative `step`/`reset` cursor.
pub struct Statement<'conn> {
    inner: rusqlite::Statement<'conn>,
    params: Vec<ParamValue>,
    buffered_rows: Option<VecDeque<RowValues>>,
}

/// The outcome of one [`Statement::step`] call.
#[derive(Debug)]
pub enum StepResult {
    Row(RowValues),
    Done,
}

impl StepResult {
    /// Whether this step produced a row.
    #[must_use]
    pub const fn is_row(&self) -> bool {
        matches!(self, Self::Row(_))
    }

    /// Consume the step, returning the row if there was one.
    #[must_use]
    pub fn into_row(self) -> Option<RowValues> {
        match self {
            Self::Row(row) => Some(row),
            Self::Done => None,
        }
    }
}

impl<'conn> Statement<'conn> {
    fn set_param(&mut self, index: usize, value: ParamValue) {
        if index == 0 {
            return;
        }
        if self.params.len() < index {
            self.params.resize(index, ParamValue::Text(None));
        }
        self.params[index - 1] = value;
        // A fresh bind invalidates any previously buffered result set.
        self.buffered_rows = None;
    }

    /// Bind `value` to the 1-based positional parameter `index` as
    /// nullable text.
    pub fn bind_text(&mut self, index: usize, value: Option<&str>) {
        self.set_param(index, ParamValue::Text(value.map(str::to_string)));
    }

    /// Bind `value` to the 1-based positional parameter `index` as a
    /// nullable 32-bit integer.
    pub fn bind_i32(&mut self, index: usize, value: Option<i32>) {
        self.set_param(index, ParamValue::Int(value.map(i64::from)));
    }

    /// Bind `value` to the 1-based positional parameter `index` as a
    /// nullable 64-bit integer.
    pub fn bind_i64(&mut self, index: usize, value: Option<i64>) {
        self.set_param(index, ParamValue::Int(value));
    }

    fn materialize(&mut self) -> Result<()> {
        let column_count = self.inner.column_count();
        let params: Vec<&dyn ToSql> = self.params.iter().map(|p| p as &dyn ToSql).collect();

        let mut rows = self
            .inner
            .query(params.as_slice())
            .map_err(BeadsError::StepFailed)?;

        let mut buffered = VecDeque::new();
        while let Some(row) = rows.next().map_err(BeadsError::StepFailed)? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let value: Value = row.get(idx).map_err(BeadsError::StepFailed)?;
                values.push(value);
            }
            buffered.push_back(RowValues(values));
        }
        self.buffered_rows = Some(buffered);
        Ok(())
    }

    /// Advance the statement by one row.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::StepFailed`] if execution fails.
    pub fn step(&mut self) -> Result<StepResult> {
        if self.buffered_rows.is_none() {
            self.materialize()?;
        }
        let row = self
            .buffered_rows
            .as_mut()
            .and_then(VecDeque::pop_front);
        Ok(match row {
            Some(row) => StepResult::Row(row),
            None => StepResult::Done,
        })
    }

    /// Discard any buffered result set so the next `step()` re-runs the
    /// statement (with whatever parameters are currently bound).
    pub fn reset(&mut self) {
        self.buffered_rows = None;
    }

    /// Run the statement to completion for its side effects (an
    /// `INSERT`/`UPDATE`/`DELETE`), returning rows affected.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::ExecuteFailed`] if execution fails.
    pub fn execute(&mut self) -> Result<usize> {
        let params: Vec<&dyn ToSql> = self.params.iter().map(|p| p as &dyn ToSql).collect();
        self.inner
            .execute(params.as_slice())
            .map_err(BeadsError::ExecuteFailed)
    }
}

/// One materialized row: owned SQLite values with NULL-aware typed
/// accessors.
#[derive(Debug, Clone)]
pub struct RowValues(Vec<Value>);

impl RowValues {
    /// Read column `index` (0-based) as nullable text.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::ColumnTypeMismatch`] if the column holds a
    /// non-text, non-null value.
    pub fn text(&self, index: usize) -> Result<Option<String>> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text.clone())),
            Some(other) => Err(BeadsError::ColumnTypeMismatch {
                index,
                reason: format!("expected text, got {other:?}"),
            }),
        }
    }

    /// Read column `index` (0-based) as a nullable 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::ColumnTypeMismatch`] if the column is not
    /// an integer, is null-incompatible, or overflows `i32`.
    pub fn i32(&self, index: usize) -> Result<Option<i32>> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(value)) => {
                i32::try_from(*value)
                    .map(Some)
                    .map_err(|_| BeadsError::ColumnTypeMismatch {
                        index,
                        reason: format!("{value} does not fit in i32"),
                    })
            }
            Some(other) => Err(BeadsError::ColumnTypeMismatch {
                index,
                reason: format!("expected integer, got {other:?}"),
            }),
        }
    }

    /// Read column `index` (0-based) as a nullable 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::ColumnTypeMismatch`] if the column holds a
    /// non-integer, non-null value.
    pub fn i64(&self, index: usize) -> Result<Option<i64>> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(value)) => Ok(Some(*value)),
            Some(other) => Err(BeadsError::ColumnTypeMismatch {
                index,
                reason: format!("expected integer, got {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_applies_pragmas_without_error() {
        let adapter = SqlAdapter::open_in_memory().unwrap();
        adapter
            .exec("CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT, qty INTEGER)")
            .unwrap();
    }

    #[test]
    fn insert_then_query_round_trips_typed_columns() {
        let adapter = SqlAdapter::open_in_memory().unwrap();
        adapter
            .exec("CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT, qty INTEGER)")
            .unwrap();

        let mut insert = adapter
            .prepare("INSERT INTO widgets (name, qty) VALUES (?1, ?2)")
            .unwrap();
        insert.bind_text(1, Some("gear"));
        insert.bind_i32(2, Some(12));
        insert.execute().unwrap();
        assert_eq!(adapter.last_insert_row_id(), 1);
        assert_eq!(adapter.changes(), 1);

        let mut select = adapter
            .prepare("SELECT name, qty FROM widgets WHERE id = ?1")
            .unwrap();
        select.bind_i64(1, Some(1));
        match select.step().unwrap() {
            StepResult::Row(row) => {
                assert_eq!(row.text(0).unwrap(), Some("gear".to_string()));
                assert_eq!(row.i32(1).unwrap(), Some(12));
            }
            StepResult::Done => panic!("expected a row"),
        }
        assert!(matches!(select.step().unwrap(), StepResult::Done));
    }

    #[test]
    fn null_columns_are_detected_not_miscoerced() {
        let adapter = SqlAdapter::open_in_memory().unwrap();
        adapter
            .exec("CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let mut insert = adapter
            .prepare("INSERT INTO widgets (name) VALUES (?1)")
            .unwrap();
        insert.bind_text(1, None);
        insert.execute().unwrap();

        let mut select = adapter.prepare("SELECT name FROM widgets").unwrap();
        let row = select.step().unwrap().into_row().unwrap();
        assert_eq!(row.text(0).unwrap(), None);
    }

    #[test]
    fn reset_reruns_with_newly_bound_parameters() {
        let adapter = SqlAdapter::open_in_memory().unwrap();
        adapter
            .exec("CREATE TABLE widgets (id INTEGER PRIMARY KEY, qty INTEGER)")
            .unwrap();
        for qty in [1, 2, 3] {
            let mut insert = adapter
                .prepare("INSERT INTO widgets (qty) VALUES (?1)")
                .unwrap();
            insert.bind_i32(1, Some(qty));
            insert.execute().unwrap();
        }

        let mut select = adapter
            .prepare("SELECT qty FROM widgets WHERE qty > ?1")
            .unwrap();
        select.bind_i32(1, Some(1));
        let mut first_pass = Vec::new();
        while let StepResult::Row(row) = select.step().unwrap() {
            first_pass.push(row.i32(0).unwrap().unwrap());
        }
        assert_eq!(first_pass, vec![2, 3]);

        select.reset();
        select.bind_i32(1, Some(2));
        let mut second_pass = Vec::new();
        while let StepResult::Row(row) = select.step().unwrap() {
            second_pass.push(row.i32(0).unwrap().unwrap());
        }
        assert_eq!(second_pass, vec![3]);
    }

    #[test]
    fn transaction_commits_on_success() {
        let adapter = SqlAdapter::open_in_memory().unwrap();
        adapter
            .exec("CREATE TABLE widgets (id INTEGER PRIMARY KEY, qty INTEGER)")
            .unwrap();

        adapter
            .transaction(|tx| {
                tx.exec("INSERT INTO widgets (qty) VALUES (5)")?;
                tx.exec("INSERT INTO widgets (qty) VALUES (6)")?;
                Ok(())
            })
            .unwrap();

        let mut select = adapter.prepare("SELECT COUNT(*) FROM widgets").unwrap();
        let row = select.step().unwrap().into_row().unwrap();
        assert_eq!(row.i64(0).unwrap(), Some(2));
    }

    #[test]
    fn transaction_rolls_back_on_failure() {
        let adapter = SqlAdapter::open_in_memory().unwrap();
        adapter
            .exec("CREATE TABLE widgets (id INTEGER PRIMARY KEY, qty INTEGER)")
            .unwrap();

        let result: Result<()> = adapter.transaction(|tx| {
            tx.exec("INSERT INTO widgets (qty) VALUES (5)")?;
            Err(BeadsError::InvalidIssue {
                reason: "synthetic failure".to_string(),
            })
        });
        assert!(result.is_err());

        let mut select = adapter.prepare("SELECT COUNT(*) FROM widgets").unwrap();
        let row = select.step().unwrap().into_row().unwrap();
        assert_eq!(row.i64(0).unwrap(), Some(0));
    }

    #[test]
    fn error_message_records_most_recent_failure() {
        let adapter = SqlAdapter::open_in_memory().unwrap();
        assert!(adapter.error_message().is_none());
        let _ = adapter.exec("SELECT * FROM nonexistent_table");
        assert!(adapter.error_message().is_some());
    }
}
