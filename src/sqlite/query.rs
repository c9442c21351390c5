use rusqlite::Statement;

use super::params::as_refs;
use crate::error::SqlPluginDbError;
use crate::results::RowBatch;
use crate::types::Value;

/// Run `stmt` with `params` and materialize every row it yields.
///
/// Statements without output columns go through `execute` so the batch
/// carries the affected-row count instead.
///
/// # Errors
///
/// Returns the engine's error mapped into [`SqlPluginDbError`].
pub(super) fn build_batch(
    stmt: &mut Statement<'_>,
    params: &[Value],
) -> Result<RowBatch, SqlPluginDbError> {
    let refs = as_refs(params);

    if stmt.column_count() == 0 {
        let changed = stmt.execute(&refs[..])?;
        let mut batch = RowBatch::new(Vec::new());
        batch.rows_affected = u64::try_from(changed).unwrap_or(u64::MAX);
        return Ok(batch);
    }

    let mut values_by_row = Vec::new();
    {
        let mut rows = stmt.query(&refs[..])?;
        while let Some(row) = rows.next()? {
            let width = row.as_ref().column_count();
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(row.get::<_, Value>(i)?);
            }
            values_by_row.push(values);
        }
    }

    // Read after stepping: SQLite re-prepares a statement whose schema moved.
    let column_names = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let mut batch = RowBatch::new(column_names);
    for values in values_by_row {
        batch.push_values(values);
    }
    Ok(batch)
}
