use std::sync::Arc;

use super::row::{Columns, Row};
use crate::types::Value;

/// Everything a backend produced for one execution of a statement.
///
/// Backends fill this in a single pass; the cursor then drains it.
#[derive(Debug, Clone)]
pub struct RowBatch {
    columns: Arc<Columns>,
    rows: Vec<Row>,
    /// Rows changed by a DML statement (0 for queries)
    pub rows_affected: u64,
    /// Rowid of the most recent successful insert on the connection
    pub last_insert_id: Option<i64>,
}

impl RowBatch {
    /// Create an empty batch for the given output columns.
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self {
            columns: Columns::new(column_names),
            rows: Vec::new(),
            rows_affected: 0,
            last_insert_id: None,
        }
    }

    /// Append one row; values beyond the declared columns are dropped and
    /// missing trailing values are filled with NULL.
    pub fn push_values(&mut self, mut values: Vec<Value>) {
        values.resize(self.columns.names().len(), Value::Null);
        self.rows.push(Row::new(Arc::clone(&self.columns), values));
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
