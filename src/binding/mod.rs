//! Generic, name-based calls over a loaded plugin.
//!
//! [`ModuleBinding`] lets callers that only know strings and [`Value`]s
//! construct backend objects and invoke their methods. Names are resolved
//! against fixed method tables; every call lands on the typed
//! [`DatabaseHandle`] / [`PreparedStatement`] / [`Cursor`] API.

mod args;
mod methods;

pub use args::{Arg, CallArgs};

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::OpenOptions;
use crate::database::{Cursor, DatabaseHandle, Fetched, PreparedStatement};
use crate::error::SqlPluginDbError;
use crate::plugin::Plugin;
use crate::results::Row;
use crate::types::Value;

use methods::{
    CURSOR_METHODS, CursorMethod, DATABASE_CONSTRUCTOR, DATABASE_METHODS, DatabaseMethod,
    STATEMENT_METHODS, StatementMethod,
};

const STATEMENT_TYPE: &str = "Statement";
const CURSOR_TYPE: &str = "Cursor";

/// What a generic call produced.
#[derive(Debug)]
pub enum Returned {
    Unit,
    Value(Value),
    Row(Row),
    /// `fetchone` on a drained cursor.
    End,
    Rows(Vec<Row>),
    Columns(Vec<String>),
    Object(ObjectHandle),
}

impl Returned {
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Returned::End)
    }

    #[must_use]
    pub fn into_object(self) -> Option<ObjectHandle> {
        match self {
            Returned::Object(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_row(self) -> Option<Row> {
        match self {
            Returned::Row(row) => Some(row),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Returned::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Returned::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// Dynamic dispatch over one loaded plugin.
#[derive(Clone, Debug)]
pub struct ModuleBinding {
    plugin: Plugin,
}

impl ModuleBinding {
    #[must_use]
    pub fn new(plugin: Plugin) -> Self {
        Self { plugin }
    }

    #[must_use]
    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    /// Type names this plugin can construct.
    #[must_use]
    pub fn constructors(&self) -> &[String] {
        &self.plugin.manifest().constructors
    }

    /// Method names callable on objects of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns `UnboundMethod` for a type this binding does not know.
    pub fn methods(&self, type_name: &str) -> Result<&'static [&'static str], SqlPluginDbError> {
        match type_name {
            STATEMENT_TYPE => Ok(STATEMENT_METHODS),
            CURSOR_TYPE => Ok(CURSOR_METHODS),
            _ if self.plugin.manifest().constructs(type_name) => Ok(DATABASE_METHODS),
            _ => Err(SqlPluginDbError::unbound(self.plugin.name(), type_name)),
        }
    }

    /// Invoke the constructor `type_name`, e.g. `Database(path, options = {})`.
    ///
    /// # Errors
    ///
    /// Returns `UnboundMethod` if the plugin exports no such constructor,
    /// an argument error if `args` do not fit the signature, `ConfigError`
    /// for bad options, or `ConnectionError` from the backend.
    pub fn construct(&self, type_name: &str, args: CallArgs) -> Result<ObjectHandle, SqlPluginDbError> {
        if !self.plugin.manifest().constructs(type_name) {
            return Err(SqlPluginDbError::unbound(self.plugin.name(), type_name));
        }
        let mut bound = args.bind(&DATABASE_CONSTRUCTOR)?;
        let path = take_required(&mut bound, 0, "path")?.into_text("path")?;
        let options = match bound.take(1) {
            Some(arg) => OpenOptions::from_values(path, &arg.into_map("options")?)?,
            None => OpenOptions::new(path),
        };
        let handle = DatabaseHandle::construct(&self.plugin, type_name, options)?;
        debug!(plugin = %self.plugin.name(), type_name, "object constructed");
        Ok(self.wrap(type_name, Target::Database(handle)))
    }

    fn wrap(&self, type_name: &str, target: Target) -> ObjectHandle {
        ObjectHandle {
            binding: self.clone(),
            type_name: Arc::from(type_name),
            target: Arc::new(Mutex::new(target)),
        }
    }
}

impl Plugin {
    /// Generic constructor invocation; see [`ModuleBinding::construct`].
    ///
    /// # Errors
    ///
    /// As [`ModuleBinding::construct`].
    pub fn construct(&self, type_name: &str, args: CallArgs) -> Result<ObjectHandle, SqlPluginDbError> {
        ModuleBinding::new(self.clone()).construct(type_name, args)
    }
}

enum Target {
    Database(DatabaseHandle),
    Statement(PreparedStatement),
    Cursor(Cursor),
}

/// Opaque reference to an object created through a [`ModuleBinding`].
///
/// Clones refer to the same object; calls on it are routed back through the
/// binding that created it.
#[derive(Clone)]
pub struct ObjectHandle {
    binding: ModuleBinding,
    type_name: Arc<str>,
    target: Arc<Mutex<Target>>,
}

impl ObjectHandle {
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn binding(&self) -> &ModuleBinding {
        &self.binding
    }

    #[must_use]
    pub fn same_object(a: &ObjectHandle, b: &ObjectHandle) -> bool {
        Arc::ptr_eq(&a.target, &b.target)
    }

    /// The typed handle behind a database object.
    #[must_use]
    pub fn as_database(&self) -> Option<DatabaseHandle> {
        match &*self.target.lock().ok()? {
            Target::Database(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Call `method` on this object.
    ///
    /// # Errors
    ///
    /// Returns `UnboundMethod` for a name not in the object's method table,
    /// an argument error if `args` do not fit the method's signature, or
    /// whatever the underlying operation returns.
    pub fn call(&self, method: &str, args: CallArgs) -> Result<Returned, SqlPluginDbError> {
        let mut target = self
            .target
            .lock()
            .map_err(|_| SqlPluginDbError::poisoned("object"))?;
        match &mut *target {
            Target::Database(handle) => {
                let method = DatabaseMethod::resolve(&self.type_name, method)?;
                let bound = args.bind(&method.signature())?;
                self.call_database(handle, method, bound)
            }
            Target::Statement(statement) => {
                let method = StatementMethod::resolve(method)?;
                let bound = args.bind(&method.signature())?;
                self.call_statement(statement, method, bound)
            }
            Target::Cursor(cursor) => {
                let method = CursorMethod::resolve(method)?;
                let mut bound = args.bind(&method.signature())?;
                match method {
                    CursorMethod::Execute => {
                        let params = optional_params(&mut bound, 0)?;
                        cursor.execute(params)?;
                        Ok(Returned::Object(self.clone()))
                    }
                    CursorMethod::FetchOne => Ok(match cursor.fetchone()? {
                        Fetched::Row(row) => Returned::Row(row),
                        Fetched::End => Returned::End,
                    }),
                    CursorMethod::FetchAll => Ok(Returned::Rows(cursor.fetchall()?)),
                    CursorMethod::RowCount => {
                        Ok(Returned::Value(Value::try_from(cursor.rowcount()?)?))
                    }
                    CursorMethod::LastRowId => Ok(Returned::Value(cursor.lastrowid()?.into())),
                    CursorMethod::Description => {
                        Ok(Returned::Columns(cursor.description()?.to_vec()))
                    }
                }
            }
        }
    }

    fn call_database(
        &self,
        handle: &DatabaseHandle,
        method: DatabaseMethod,
        mut bound: args::BoundArgs,
    ) -> Result<Returned, SqlPluginDbError> {
        match method {
            DatabaseMethod::Execute => {
                let sql = take_required(&mut bound, 0, "sql")?.into_text("sql")?;
                let params = optional_params(&mut bound, 1)?;
                let cursor = handle.execute(&sql, params)?;
                Ok(Returned::Object(
                    self.binding.wrap(CURSOR_TYPE, Target::Cursor(cursor)),
                ))
            }
            DatabaseMethod::ExecuteScript => {
                let sql = take_required(&mut bound, 0, "sql")?.into_text("sql")?;
                handle.execute_script(&sql)?;
                Ok(Returned::Unit)
            }
            DatabaseMethod::Prepare => {
                let sql = take_required(&mut bound, 0, "sql")?.into_text("sql")?;
                let statement = handle.prepare(&sql)?;
                Ok(Returned::Object(
                    self.binding
                        .wrap(STATEMENT_TYPE, Target::Statement(statement)),
                ))
            }
            DatabaseMethod::Close => {
                handle.close()?;
                Ok(Returned::Unit)
            }
            DatabaseMethod::Path => Ok(Returned::Value(Value::from(handle.path()))),
        }
    }

    fn call_statement(
        &self,
        statement: &PreparedStatement,
        method: StatementMethod,
        mut bound: args::BoundArgs,
    ) -> Result<Returned, SqlPluginDbError> {
        match method {
            StatementMethod::Execute => {
                let params = optional_params(&mut bound, 0)?;
                let cursor = statement.execute(params)?;
                Ok(Returned::Object(
                    self.binding.wrap(CURSOR_TYPE, Target::Cursor(cursor)),
                ))
            }
            StatementMethod::ParameterCount => Ok(Returned::Value(Value::try_from(
                statement.parameter_count()?,
            )?)),
            StatementMethod::ColumnNames => {
                Ok(Returned::Columns(statement.column_names()?.to_vec()))
            }
            StatementMethod::Sql => Ok(Returned::Value(Value::from(statement.sql()?))),
        }
    }
}

fn take_required(
    bound: &mut args::BoundArgs,
    idx: usize,
    name: &str,
) -> Result<Arg, SqlPluginDbError> {
    bound
        .take(idx)
        .ok_or_else(|| SqlPluginDbError::MissingParameter(name.to_string()))
}

fn optional_params(
    bound: &mut args::BoundArgs,
    idx: usize,
) -> Result<crate::params::Params, SqlPluginDbError> {
    bound
        .take(idx)
        .map_or(Ok(crate::params::Params::None), |arg| arg.into_params("values"))
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("plugin", &self.binding.plugin.name())
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
