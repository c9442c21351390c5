//! Built-in `SQLite` plugin backed by rusqlite.
//!
//! - config: opening, open flags and pragmas
//! - params: `Value` <-> rusqlite conversions
//! - query: materializing a statement's result into a `RowBatch`
//! - connection: the `NativeConnection` implementation

mod config;
mod connection;
mod params;
mod query;

use std::sync::Arc;

use tracing::debug;

use crate::config::OpenOptions;
use crate::error::SqlPluginDbError;
use crate::plugin::{
    BackendModule, Capability, DATABASE_TYPE, NativeConnection, PluginFactory, PluginManifest,
};
use crate::translation::PlaceholderStyle;

use connection::SqliteNative;

/// Name the built-in module is registered under.
pub const PLUGIN_NAME: &str = "sqlite3";

/// Factory producing a fresh [`SqliteModule`].
#[must_use]
pub fn factory() -> PluginFactory {
    Arc::new(|| Ok(Box::new(SqliteModule) as Box<dyn BackendModule>))
}

/// The `sqlite3` backend module.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteModule;

impl BackendModule for SqliteModule {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new(PLUGIN_NAME)
            .with_capability(Capability::Script)
            .with_placeholder_style(PlaceholderStyle::Sqlite)
    }

    fn open(
        &self,
        type_name: &str,
        options: &OpenOptions,
    ) -> Result<Box<dyn NativeConnection>, SqlPluginDbError> {
        if type_name != DATABASE_TYPE {
            return Err(SqlPluginDbError::unbound(PLUGIN_NAME, type_name));
        }
        let conn = config::open_connection(options)?;
        debug!(path = %options.path, read_only = options.read_only, "sqlite connection opened");
        Ok(Box::new(SqliteNative::new(options.path.clone(), conn)))
    }
}
