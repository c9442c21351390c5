//! Database handles, prepared statements and cursors.
//!
//! Every statement and cursor keeps a reference to its handle's shared
//! state. Closing the handle releases the native connection and flips a flag
//! those objects check before each operation.

mod cursor;
mod statement;

pub use cursor::{Cursor, CursorState, Fetched};
pub use statement::PreparedStatement;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::config::OpenOptions;
use crate::error::SqlPluginDbError;
use crate::params::Params;
use crate::plugin::{Capability, DATABASE_TYPE, NativeConnection, Plugin};
use crate::results::RowBatch;
use crate::translation::{PlaceholderStyle, translate_placeholders};

use statement::{CompiledStatement, StatementCache};

/// An open connection to a data source, obtained through a [`Plugin`].
///
/// Clones share the same native connection. Executions on one handle are
/// serialized by a handle-scoped lock; the native connection is never used
/// from two threads at once.
///
/// ```rust,no_run
/// use sql_plugins::prelude::*;
///
/// # fn demo() -> Result<(), SqlPluginDbError> {
/// let registry = PluginRegistry::with_builtin();
/// let plugin = registry.load("sqlite3")?;
/// let db = DatabaseHandle::open(&plugin, "app.db")?;
/// db.execute("create table if not exists t(a int)", ())?;
/// let mut cur = db.execute("insert into t values(?)", [Value::Int(1)])?;
/// cur.execute([Value::Int(2)])?;
/// let rows = db.execute("select a from t", ())?.fetchall()?;
/// # let _ = rows;
/// db.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DatabaseHandle {
    shared: Arc<HandleShared>,
}

pub(crate) struct HandleShared {
    plugin: Plugin,
    path: String,
    /// Target style when placeholder translation is on.
    translate: Option<PlaceholderStyle>,
    closed: AtomicBool,
    state: Mutex<HandleState>,
}

struct HandleState {
    conn: Option<Box<dyn NativeConnection>>,
    cache: StatementCache,
}

impl HandleShared {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SqlPluginDbError> {
        if self.is_closed() {
            Err(SqlPluginDbError::UseAfterClose(self.path.clone()))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandleState>, SqlPluginDbError> {
        self.state
            .lock()
            .map_err(|_| SqlPluginDbError::poisoned("database handle"))
    }

    /// Look up `sql` in the cache or have the backend compile it. A schema
    /// change reported by the backend drops every cached shape first.
    fn compile(
        &self,
        state: &mut HandleState,
        sql: &str,
    ) -> Result<Arc<CompiledStatement>, SqlPluginDbError> {
        let text = match self.translate {
            Some(style) => translate_placeholders(sql, style, true),
            None => std::borrow::Cow::Borrowed(sql),
        };
        if text.trim().is_empty() {
            return Err(SqlPluginDbError::compile(sql, "empty statement"));
        }
        let HandleState { conn, cache } = state;
        let conn = conn
            .as_mut()
            .ok_or_else(|| SqlPluginDbError::UseAfterClose(self.path.clone()))?;
        if conn.schema_changed() {
            debug!(path = %self.path, dropped = cache.len(), "schema changed, statement cache cleared");
            cache.clear();
        }
        if let Some(hit) = cache.get(&text) {
            return Ok(hit);
        }

        // Nothing is cached for text that fails to compile.
        let shape = conn.compile(&text)?;
        debug!(
            sql = %text,
            parameters = shape.parameter_count(),
            columns = shape.column_count(),
            "statement compiled"
        );
        Ok(cache.insert(CompiledStatement {
            sql: text.into_owned(),
            shape,
        }))
    }

    /// Bind `params` and run `statement` while holding the handle lock.
    fn run_locked(
        &self,
        state: &mut HandleState,
        statement: &CompiledStatement,
        params: Params,
    ) -> Result<RowBatch, SqlPluginDbError> {
        let HandleState { conn, cache } = state;
        let conn = conn
            .as_mut()
            .ok_or_else(|| SqlPluginDbError::UseAfterClose(self.path.clone()))?;
        let values = params.resolve(&statement.shape.parameters)?;
        conn.run(&statement.sql, &values).inspect_err(|err| {
            // Parameter problems leave the compiled form intact.
            if !matches!(err, SqlPluginDbError::ParameterTypeError(_)) {
                cache.evict(&statement.sql);
                conn.evict(&statement.sql);
            }
        })
    }

    pub(crate) fn run(
        &self,
        statement: &CompiledStatement,
        params: Params,
    ) -> Result<RowBatch, SqlPluginDbError> {
        self.ensure_open()?;
        let mut state = self.lock()?;
        self.run_locked(&mut state, statement, params)
    }

    fn close(&self) -> Result<(), SqlPluginDbError> {
        let mut state = self.lock()?;
        let Some(mut conn) = state.conn.take() else {
            debug!(path = %self.path, "close on an already closed handle");
            return Ok(());
        };
        self.closed.store(true, Ordering::Release);
        state.cache.clear();
        info!(plugin = %self.plugin.name(), path = %self.path, "database closed");
        conn.close()
    }
}

impl Drop for HandleShared {
    fn drop(&mut self) {
        let conn = match self.state.get_mut() {
            Ok(state) => state.conn.take(),
            Err(poisoned) => poisoned.into_inner().conn.take(),
        };
        if let Some(mut conn) = conn
            && let Err(err) = conn.close()
        {
            warn!(path = %self.path, error = %err, "failed to close dropped database handle");
        }
    }
}

impl DatabaseHandle {
    /// Open `path` through `plugin` with default options.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the source cannot be opened.
    pub fn open(plugin: &Plugin, path: impl Into<String>) -> Result<Self, SqlPluginDbError> {
        Self::open_with(plugin, OpenOptions::new(path))
    }

    /// Open a data source through `plugin` with explicit options.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid options and `ConnectionError` if the
    /// source cannot be opened.
    pub fn open_with(plugin: &Plugin, options: OpenOptions) -> Result<Self, SqlPluginDbError> {
        Self::construct(plugin, DATABASE_TYPE, options)
    }

    /// Open through the constructor named `type_name`.
    pub(crate) fn construct(
        plugin: &Plugin,
        type_name: &str,
        options: OpenOptions,
    ) -> Result<Self, SqlPluginDbError> {
        if !plugin.manifest().constructs(type_name) {
            return Err(SqlPluginDbError::unbound(plugin.name(), type_name));
        }
        options.validate()?;
        let conn = plugin.backend().open(type_name, &options)?;
        let translate = options
            .translate_placeholders
            .then_some(plugin.manifest().placeholder_style);
        info!(plugin = %plugin.name(), path = %options.path, "database opened");
        Ok(Self {
            shared: Arc::new(HandleShared {
                plugin: plugin.clone(),
                path: options.path,
                translate,
                closed: AtomicBool::new(false),
                state: Mutex::new(HandleState {
                    conn: Some(conn),
                    cache: StatementCache::default(),
                }),
            }),
        })
    }

    /// Compile (or reuse) `sql`, bind `params`, run it, and return a fresh
    /// cursor over the result.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` after [`close`](Self::close), `CompileError`
    /// for malformed text, `ParameterCountMismatch` / `MissingParameter` /
    /// `ParameterTypeError` for bad parameters, or the backend's error. The
    /// handle stays usable after any of these.
    pub fn execute(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Cursor, SqlPluginDbError> {
        self.shared.ensure_open()?;
        let (statement, batch) = {
            let mut state = self.shared.lock()?;
            let statement = self.shared.compile(&mut state, sql)?;
            let batch = self
                .shared
                .run_locked(&mut state, &statement, params.into())?;
            (statement, batch)
        };
        Ok(Cursor::new(Arc::clone(&self.shared), statement, batch))
    }

    /// Compile (or reuse) `sql` without running it.
    ///
    /// # Errors
    ///
    /// Returns `UseAfterClose` or `CompileError`.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement, SqlPluginDbError> {
        self.shared.ensure_open()?;
        let compiled = {
            let mut state = self.shared.lock()?;
            self.shared.compile(&mut state, sql)?
        };
        Ok(PreparedStatement::new(Arc::clone(&self.shared), compiled))
    }

    /// Run a multi-statement script (DDL batches and the like). Scripts take
    /// no parameters and produce no rows. The statement cache is cleared
    /// afterwards since a script may change the schema.
    ///
    /// # Errors
    ///
    /// Returns `UnboundMethod` if the plugin has no script capability,
    /// `UseAfterClose`, or the backend's error.
    pub fn execute_script(&self, sql: &str) -> Result<(), SqlPluginDbError> {
        self.shared.ensure_open()?;
        if !self.shared.plugin.manifest().supports(Capability::Script) {
            return Err(SqlPluginDbError::unbound(DATABASE_TYPE, "executescript"));
        }
        let mut state = self.shared.lock()?;
        let HandleState { conn, cache } = &mut *state;
        let conn = conn
            .as_mut()
            .ok_or_else(|| SqlPluginDbError::UseAfterClose(self.shared.path.clone()))?;
        let result = conn.execute_script(sql);
        cache.clear();
        result
    }

    /// Release the native connection.
    ///
    /// Every cursor and prepared statement derived from this handle (or its
    /// clones) fails with `UseAfterClose` afterwards. Closing again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the native close fails; the handle is
    /// closed regardless.
    pub fn close(&self) -> Result<(), SqlPluginDbError> {
        self.shared.close()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    #[must_use]
    pub fn plugin(&self) -> &Plugin {
        &self.shared.plugin
    }

    /// Number of distinct query texts currently compiled for this handle.
    #[must_use]
    pub fn cached_statement_count(&self) -> usize {
        self.shared.lock().map_or(0, |state| state.cache.len())
    }

    /// `true` when both values share one native connection.
    #[must_use]
    pub fn same_handle(a: &DatabaseHandle, b: &DatabaseHandle) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }
}

impl fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("plugin", &self.shared.plugin.name())
            .field("path", &self.shared.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
