use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::HandleShared;
use super::cursor::Cursor;
use crate::error::SqlPluginDbError;
use crate::params::Params;
use crate::plugin::StatementShape;
use crate::types::Value;

/// Compiled form of one query text, as cached by its handle.
#[derive(Debug)]
pub(crate) struct CompiledStatement {
    /// Text handed to the backend (after placeholder translation).
    pub(crate) sql: String,
    pub(crate) shape: StatementShape,
}

/// Per-handle cache: identical text maps to one compiled statement.
#[derive(Debug, Default)]
pub(crate) struct StatementCache {
    entries: HashMap<String, Arc<CompiledStatement>>,
}

impl StatementCache {
    pub(crate) fn get(&self, sql: &str) -> Option<Arc<CompiledStatement>> {
        self.entries.get(sql).map(Arc::clone)
    }

    pub(crate) fn insert(&mut self, statement: CompiledStatement) -> Arc<CompiledStatement> {
        let statement = Arc::new(statement);
        self.entries
            .insert(statement.sql.clone(), Arc::clone(&statement));
        statement
    }

    pub(crate) fn evict(&mut self, sql: &str) -> bool {
        let removed = self.entries.remove(sql).is_some();
        if removed {
            debug!(sql = %sql, "statement evicted");
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A query compiled by the backend and bound to one [`DatabaseHandle`](super::DatabaseHandle).
///
/// Bind once, execute many times: each [`execute`](Self::execute) reuses the
/// compiled form with new parameter values. Every operation fails with
/// `UseAfterClose` once the owning handle is closed.
#[derive(Clone)]
pub struct PreparedStatement {
    handle: Arc<HandleShared>,
    compiled: Arc<CompiledStatement>,
}

impl PreparedStatement {
    pub(crate) fn new(handle: Arc<HandleShared>, compiled: Arc<CompiledStatement>) -> Self {
        Self { handle, compiled }
    }

    /// Text as compiled by the backend.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` once the handle is closed; the same holds for
    /// the other accessors.
    pub fn sql(&self) -> Result<&str, SqlPluginDbError> {
        self.handle.ensure_open()?;
        Ok(&self.compiled.sql)
    }

    pub fn parameter_count(&self) -> Result<usize, SqlPluginDbError> {
        self.handle.ensure_open()?;
        Ok(self.compiled.shape.parameter_count())
    }

    /// Marker names in index order; `None` for anonymous markers.
    pub fn parameter_names(&self) -> Result<&[Option<String>], SqlPluginDbError> {
        self.handle.ensure_open()?;
        Ok(&self.compiled.shape.parameters)
    }

    /// Output columns as of compilation.
    pub fn column_names(&self) -> Result<&[String], SqlPluginDbError> {
        self.handle.ensure_open()?;
        Ok(&self.compiled.shape.columns)
    }

    /// Validate `params` against this statement's markers without running it.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` if the handle is closed, otherwise the errors of
    /// [`Params::resolve`].
    pub fn bind(&self, params: impl Into<Params>) -> Result<Vec<Value>, SqlPluginDbError> {
        self.handle.ensure_open()?;
        params.into().resolve(&self.compiled.shape.parameters)
    }

    /// Bind `params`, run the statement, and return a fresh cursor over the result.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose`, a parameter error, or the backend's error.
    pub fn execute(&self, params: impl Into<Params>) -> Result<Cursor, SqlPluginDbError> {
        let batch = self.handle.run(&self.compiled, params.into())?;
        Ok(Cursor::new(
            Arc::clone(&self.handle),
            Arc::clone(&self.compiled),
            batch,
        ))
    }
}

impl fmt::Debug for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("sql", &self.compiled.sql)
            .field("parameters", &self.compiled.shape.parameter_count())
            .field("columns", &self.compiled.shape.column_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(sql: &str) -> CompiledStatement {
        CompiledStatement {
            sql: sql.to_string(),
            shape: StatementShape::default(),
        }
    }

    #[test]
    fn identical_text_shares_one_entry() {
        let mut cache = StatementCache::default();
        let first = cache.insert(compiled("select 1"));
        let again = cache.get("select 1").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(cache.get("select 2").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evict_removes_only_the_named_text() {
        let mut cache = StatementCache::default();
        cache.insert(compiled("a"));
        cache.insert(compiled("b"));
        assert!(cache.evict("a"));
        assert!(!cache.evict("a"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
