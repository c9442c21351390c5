use thiserror::Error;

/// Errors surfaced by the plugin registry, the generic binding layer and the
/// database/cursor API.
///
/// Engine failures are not reinterpreted: they travel as [`SqlPluginDbError::BackendError`]
/// carrying the native code and message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlPluginDbError {
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Plugin load error ({name}): {reason}")]
    PluginLoadError { name: String, reason: String },

    #[error("Unbound method: {type_name}.{method}")]
    UnboundMethod { type_name: String, method: String },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Compile error for `{sql}`: {message}")]
    CompileError { sql: String, message: String },

    #[error("Parameter count mismatch: expected {expected}, got {supplied}")]
    ParameterCountMismatch { expected: usize, supplied: usize },

    #[error("Parameter type error: {0}")]
    ParameterTypeError(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Use after close: {0}")]
    UseAfterClose(String),

    #[error("Backend error {code}: {message}")]
    BackendError { code: i64, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl SqlPluginDbError {
    pub(crate) fn unbound(type_name: &str, method: &str) -> Self {
        SqlPluginDbError::UnboundMethod {
            type_name: type_name.to_string(),
            method: method.to_string(),
        }
    }

    pub(crate) fn load_error(name: &str, reason: impl Into<String>) -> Self {
        SqlPluginDbError::PluginLoadError {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn compile(sql: &str, message: impl Into<String>) -> Self {
        SqlPluginDbError::CompileError {
            sql: sql.to_string(),
            message: message.into(),
        }
    }

    /// Lock poisoning means a previous call panicked while holding the handle.
    pub(crate) fn poisoned(what: &str) -> Self {
        SqlPluginDbError::BackendError {
            code: -1,
            message: format!("{what} lock poisoned"),
        }
    }
}

impl From<serde_json::Error> for SqlPluginDbError {
    fn from(err: serde_json::Error) -> Self {
        SqlPluginDbError::ConfigError(format!("invalid options: {err}"))
    }
}

/// Extended result code raised when a STRICT table column rejects a value.
#[cfg(feature = "sqlite")]
const SQLITE_CONSTRAINT_DATATYPE: i32 = 3091;

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for SqlPluginDbError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(native, message)
                if native.code == rusqlite::ErrorCode::TypeMismatch
                    || native.extended_code == SQLITE_CONSTRAINT_DATATYPE =>
            {
                SqlPluginDbError::ParameterTypeError(message.unwrap_or_else(|| native.to_string()))
            }
            rusqlite::Error::SqliteFailure(native, message) => SqlPluginDbError::BackendError {
                code: i64::from(native.extended_code),
                message: message.unwrap_or_else(|| native.to_string()),
            },
            rusqlite::Error::InvalidParameterCount(supplied, expected) => {
                SqlPluginDbError::ParameterCountMismatch { expected, supplied }
            }
            rusqlite::Error::InvalidParameterName(name) => SqlPluginDbError::MissingParameter(name),
            rusqlite::Error::ToSqlConversionFailure(e) => {
                SqlPluginDbError::ParameterTypeError(e.to_string())
            }
            other => SqlPluginDbError::BackendError {
                code: -1,
                message: other.to_string(),
            },
        }
    }
}
