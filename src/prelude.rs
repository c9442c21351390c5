//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::binding::{Arg, CallArgs, ModuleBinding, ObjectHandle, Returned};
pub use crate::config::{OpenOptions, OpenOptionsBuilder};
pub use crate::database::{Cursor, CursorState, DatabaseHandle, Fetched, PreparedStatement};
pub use crate::error::SqlPluginDbError;
pub use crate::params::Params;
pub use crate::plugin::{
    BackendModule, Capability, NativeConnection, Plugin, PluginFactory, PluginManifest,
    PluginRegistry, StatementShape,
};
pub use crate::results::{Row, RowBatch};
pub use crate::translation::{PlaceholderStyle, scan_markers, translate_placeholders};
pub use crate::types::{StorageClass, Value};
