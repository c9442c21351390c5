//! A uniform, synchronous `Database` / `Cursor` API over SQL backends that
//! are registered as named plugins and loaded on demand.
//!
//! ```rust,no_run
//! use sql_plugins::prelude::*;
//!
//! # fn demo() -> Result<(), SqlPluginDbError> {
//! let registry = PluginRegistry::with_builtin();
//! let plugin = registry.load("sqlite3")?;
//! let db = DatabaseHandle::open(&plugin, "test.db")?;
//! db.execute("create table if not exists t(a int)", ())?;
//! let mut insert = db.execute("insert into t values(?)", [Value::Int(0)])?;
//! for i in 1..10 {
//!     insert.execute([Value::Int(i)])?;
//! }
//! let rows = db.execute("select count(*) from t", ())?.fetchall()?;
//! assert_eq!(rows[0].get_by_index(0), Some(&Value::Int(10)));
//! db.close()?;
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod config;
pub mod database;
pub mod error;
#[cfg(feature = "tokio")]
pub mod offload;
pub mod params;
pub mod plugin;
pub mod prelude;
pub mod results;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod translation;
pub mod types;

pub use error::SqlPluginDbError;
