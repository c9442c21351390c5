use std::fmt;
use std::sync::Arc;

use super::HandleShared;
use super::statement::CompiledStatement;
use crate::error::SqlPluginDbError;
use crate::params::Params;
use crate::results::{Row, RowBatch};

/// Where a cursor is in its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Executed, nothing fetched yet.
    Fresh,
    /// At least one row fetched, more may remain.
    Iterating,
    /// Every row has been fetched.
    Exhausted,
    /// The owning handle was closed.
    Closed,
}

/// Result of [`Cursor::fetchone`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Row(Row),
    End,
}

impl Fetched {
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Fetched::End)
    }

    #[must_use]
    pub fn into_row(self) -> Option<Row> {
        match self {
            Fetched::Row(row) => Some(row),
            Fetched::End => None,
        }
    }
}

/// Iteration state over one execution of a prepared statement.
///
/// Rows are produced by the backend when the statement runs and drained by
/// [`fetchone`](Self::fetchone) and [`fetchall`](Self::fetchall). Re-executing
/// with [`execute`](Self::execute) discards unread rows and starts over.
pub struct Cursor {
    handle: Arc<HandleShared>,
    statement: Arc<CompiledStatement>,
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
    state: CursorState,
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl Cursor {
    pub(crate) fn new(
        handle: Arc<HandleShared>,
        statement: Arc<CompiledStatement>,
        batch: RowBatch,
    ) -> Self {
        let mut cursor = Self {
            handle,
            statement,
            columns: Vec::new(),
            rows: Vec::new().into_iter(),
            state: CursorState::Fresh,
            rows_affected: 0,
            last_insert_id: None,
        };
        cursor.load(batch);
        cursor
    }

    fn load(&mut self, batch: RowBatch) {
        self.columns = batch.column_names().to_vec();
        self.rows_affected = batch.rows_affected;
        self.last_insert_id = batch.last_insert_id;
        self.rows = batch.into_rows().into_iter();
        self.state = CursorState::Fresh;
    }

    /// Current state; `Closed` as soon as the owning handle closes.
    #[must_use]
    pub fn state(&self) -> CursorState {
        if self.handle.is_closed() {
            CursorState::Closed
        } else {
            self.state
        }
    }

    /// Text of the statement this cursor runs.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` after the handle closed.
    pub fn sql(&self) -> Result<&str, SqlPluginDbError> {
        self.handle.ensure_open()?;
        Ok(&self.statement.sql)
    }

    /// Re-run the statement with new parameters.
    ///
    /// Unread rows from the previous run are discarded and the cursor is
    /// `Fresh` again. If the run fails the cursor is left `Exhausted` with no
    /// rows.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` after the handle closed, a parameter error, or
    /// the backend's error.
    pub fn execute(&mut self, params: impl Into<Params>) -> Result<&mut Self, SqlPluginDbError> {
        self.handle.ensure_open()?;
        self.rows = Vec::new().into_iter();
        self.state = CursorState::Exhausted;
        let batch = self.handle.run(&self.statement, params.into())?;
        self.load(batch);
        Ok(self)
    }

    /// Next row, or [`Fetched::End`] once the result is drained.
    ///
    /// Calling again after `End` keeps returning `End`.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` after the handle closed.
    pub fn fetchone(&mut self) -> Result<Fetched, SqlPluginDbError> {
        self.handle.ensure_open()?;
        match self.rows.next() {
            Some(row) => {
                self.state = CursorState::Iterating;
                Ok(Fetched::Row(row))
            }
            None => {
                self.state = CursorState::Exhausted;
                Ok(Fetched::End)
            }
        }
    }

    /// All remaining rows, in order. Empty if the cursor is already exhausted.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` after the handle closed.
    pub fn fetchall(&mut self) -> Result<Vec<Row>, SqlPluginDbError> {
        self.handle.ensure_open()?;
        let rows: Vec<Row> = self.rows.by_ref().collect();
        self.state = CursorState::Exhausted;
        Ok(rows)
    }

    /// Output column names of the last run.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` after the handle closed.
    pub fn description(&self) -> Result<&[String], SqlPluginDbError> {
        self.handle.ensure_open()?;
        Ok(&self.columns)
    }

    /// Rows changed by the last run when it was a DML statement.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` after the handle closed.
    pub fn rowcount(&self) -> Result<u64, SqlPluginDbError> {
        self.handle.ensure_open()?;
        Ok(self.rows_affected)
    }

    /// Rowid of the most recent insert as of the last run.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` after the handle closed.
    pub fn lastrowid(&self) -> Result<Option<i64>, SqlPluginDbError> {
        self.handle.ensure_open()?;
        Ok(self.last_insert_id)
    }
}

impl Iterator for Cursor {
    type Item = Result<Row, SqlPluginDbError>;

    /// Yields `UseAfterClose` once after the handle closes, then stops.
    fn next(&mut self) -> Option<Self::Item> {
        if self.state == CursorState::Closed {
            return None;
        }
        match self.fetchone() {
            Ok(Fetched::Row(row)) => Some(Ok(row)),
            Ok(Fetched::End) => None,
            Err(err) => {
                self.state = CursorState::Closed;
                Some(Err(err))
            }
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("sql", &self.statement.sql)
            .field("state", &self.state())
            .field("remaining", &self.rows.len())
            .finish()
    }
}
