use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::config::OpenOptions;
use crate::error::SqlPluginDbError;

fn open_flags(options: &OpenOptions) -> OpenFlags {
    let access = if options.read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else if options.create_if_missing {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    // Each connection is owned by one handle which serializes access.
    access | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI
}

/// Open and configure a connection for `options`.
///
/// The file header is probed before any pragma runs so that a missing or
/// corrupt file fails here rather than on the first statement.
///
/// # Errors
///
/// Returns `ConnectionError` if the file cannot be opened, is not a database,
/// or rejects one of the configured pragmas.
pub(super) fn open_connection(options: &OpenOptions) -> Result<Connection, SqlPluginDbError> {
    let conn = Connection::open_with_flags(&options.path, open_flags(options))
        .map_err(|e| connection_error(&options.path, &e))?;

    schema_version(&conn).map_err(|e| connection_error(&options.path, &e))?;

    conn.set_prepared_statement_cache_capacity(options.statement_cache_capacity);

    let pragmas: Vec<&str> = options
        .pragmas
        .iter()
        .map(String::as_str)
        // A read-only connection cannot switch journal modes.
        .filter(|p| !(options.read_only && p.to_ascii_lowercase().contains("journal_mode")))
        .collect();
    if !pragmas.is_empty() {
        let batch = pragmas.join(";\n");
        conn.execute_batch(&batch)
            .map_err(|e| connection_error(&options.path, &e))?;
        debug!(path = %options.path, count = pragmas.len(), "pragmas applied");
    }
    Ok(conn)
}

/// Current `PRAGMA schema_version`; bumped by SQLite on every schema change.
pub(super) fn schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.prepare_cached("PRAGMA schema_version")?
        .query_row([], |row| row.get(0))
}

fn connection_error(path: &str, err: &rusqlite::Error) -> SqlPluginDbError {
    SqlPluginDbError::ConnectionError(format!("{path}: {err}"))
}
