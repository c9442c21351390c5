use super::args::{Signature, optional, required};
use crate::error::SqlPluginDbError;

pub(crate) const DATABASE_CONSTRUCTOR: Signature = Signature {
    params: &[required("path"), optional("options")],
};

/// Methods callable on a database object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DatabaseMethod {
    Execute,
    ExecuteScript,
    Prepare,
    Close,
    Path,
}

/// Methods callable on a prepared statement object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatementMethod {
    Execute,
    ParameterCount,
    ColumnNames,
    Sql,
}

/// Methods callable on a cursor object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorMethod {
    Execute,
    FetchOne,
    FetchAll,
    RowCount,
    LastRowId,
    Description,
}

pub(crate) const DATABASE_METHODS: &[&str] = &["execute", "executescript", "prepare", "close", "path"];
pub(crate) const STATEMENT_METHODS: &[&str] = &["execute", "parameter_count", "column_names", "sql"];
pub(crate) const CURSOR_METHODS: &[&str] = &[
    "execute",
    "fetchone",
    "fetchall",
    "rowcount",
    "lastrowid",
    "description",
];

const NO_ARGS: Signature = Signature { params: &[] };
const SQL_AND_VALUES: Signature = Signature {
    params: &[required("sql"), optional("values")],
};
const SQL_ONLY: Signature = Signature {
    params: &[required("sql")],
};
const VALUES_ONLY: Signature = Signature {
    params: &[optional("values")],
};

impl DatabaseMethod {
    pub(crate) fn resolve(type_name: &str, name: &str) -> Result<Self, SqlPluginDbError> {
        match name {
            "execute" => Ok(Self::Execute),
            "executescript" => Ok(Self::ExecuteScript),
            "prepare" => Ok(Self::Prepare),
            "close" => Ok(Self::Close),
            "path" => Ok(Self::Path),
            _ => Err(SqlPluginDbError::unbound(type_name, name)),
        }
    }

    pub(crate) fn signature(self) -> Signature {
        match self {
            Self::Execute => SQL_AND_VALUES,
            Self::ExecuteScript | Self::Prepare => SQL_ONLY,
            Self::Close | Self::Path => NO_ARGS,
        }
    }
}

impl StatementMethod {
    pub(crate) fn resolve(name: &str) -> Result<Self, SqlPluginDbError> {
        match name {
            "execute" => Ok(Self::Execute),
            "parameter_count" => Ok(Self::ParameterCount),
            "column_names" => Ok(Self::ColumnNames),
            "sql" => Ok(Self::Sql),
            _ => Err(SqlPluginDbError::unbound("Statement", name)),
        }
    }

    pub(crate) fn signature(self) -> Signature {
        match self {
            Self::Execute => VALUES_ONLY,
            Self::ParameterCount | Self::ColumnNames | Self::Sql => NO_ARGS,
        }
    }
}

impl CursorMethod {
    pub(crate) fn resolve(name: &str) -> Result<Self, SqlPluginDbError> {
        match name {
            "execute" => Ok(Self::Execute),
            "fetchone" => Ok(Self::FetchOne),
            "fetchall" => Ok(Self::FetchAll),
            "rowcount" => Ok(Self::RowCount),
            "lastrowid" => Ok(Self::LastRowId),
            "description" => Ok(Self::Description),
            _ => Err(SqlPluginDbError::unbound("Cursor", name)),
        }
    }

    pub(crate) fn signature(self) -> Signature {
        match self {
            Self::Execute => VALUES_ONLY,
            _ => NO_ARGS,
        }
    }
}
