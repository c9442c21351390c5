use rusqlite::Connection;
use tracing::{debug, warn};

use super::config::schema_version;
use super::query::build_batch;
use crate::error::SqlPluginDbError;
use crate::plugin::{NativeConnection, StatementShape};
use crate::results::RowBatch;
use crate::types::Value;

/// A rusqlite connection behind the [`NativeConnection`] contract.
///
/// Compiled statements live in rusqlite's own prepared-statement cache; the
/// handle above only tracks their shapes by text.
pub(super) struct SqliteNative {
    path: String,
    conn: Option<Connection>,
    /// Schema version the cached statements were compiled against.
    schema_version: Option<i64>,
}

impl SqliteNative {
    pub(super) fn new(path: String, conn: Connection) -> Self {
        let schema_version = schema_version(&conn).ok();
        Self {
            path,
            conn: Some(conn),
            schema_version,
        }
    }

    fn conn(&self) -> Result<&Connection, SqlPluginDbError> {
        self.conn
            .as_ref()
            .ok_or_else(|| SqlPluginDbError::UseAfterClose(self.path.clone()))
    }
}

impl NativeConnection for SqliteNative {
    fn compile(&mut self, sql: &str) -> Result<StatementShape, SqlPluginDbError> {
        let conn = self.conn()?;
        let stmt = conn
            .prepare_cached(sql)
            .map_err(|e| SqlPluginDbError::compile(sql, e.to_string()))?;
        let parameters = (1..=stmt.parameter_count())
            .map(|i| stmt.parameter_name(i).map(ToString::to_string))
            .collect();
        let columns = stmt
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        Ok(StatementShape {
            parameters,
            columns,
        })
    }

    fn run(&mut self, sql: &str, params: &[Value]) -> Result<RowBatch, SqlPluginDbError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| SqlPluginDbError::compile(sql, e.to_string()))?;
        let mut batch = build_batch(&mut stmt, params)?;
        batch.last_insert_id = Some(conn.last_insert_rowid());
        Ok(batch)
    }

    fn evict(&mut self, sql: &str) {
        if let Some(conn) = &self.conn {
            debug!(sql, "flushing sqlite statement cache");
            conn.flush_prepared_statement_cache();
        }
    }

    fn schema_changed(&mut self) -> bool {
        let Some(conn) = &self.conn else {
            return false;
        };
        let current = match schema_version(conn) {
            Ok(version) => Some(version),
            Err(err) => {
                warn!(path = %self.path, error = %err, "cannot read schema version");
                None
            }
        };
        if current.is_some() && current == self.schema_version {
            return false;
        }
        debug!(
            path = %self.path,
            from = ?self.schema_version,
            to = ?current,
            "schema version moved, flushing sqlite statement cache"
        );
        self.schema_version = current;
        conn.flush_prepared_statement_cache();
        true
    }

    fn execute_script(&mut self, sql: &str) -> Result<(), SqlPluginDbError> {
        let conn = self.conn()?;
        conn.execute_batch(sql)?;
        // Schema may have changed under cached statements.
        conn.flush_prepared_statement_cache();
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlPluginDbError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.flush_prepared_statement_cache();
        conn.close().map_err(|(_conn, err)| {
            warn!(path = %self.path, error = %err, "sqlite close failed");
            SqlPluginDbError::from(err)
        })
    }
}
