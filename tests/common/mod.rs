#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sql_plugins::prelude::*;
use tempfile::TempDir;

/// Call counters shared between a scripted module and the test observing it.
#[derive(Debug, Default)]
pub struct Counters {
    pub loads: AtomicUsize,
    pub unloads: AtomicUsize,
    pub opens: AtomicUsize,
    pub compiles: AtomicUsize,
    pub runs: AtomicUsize,
    pub evicts: AtomicUsize,
    pub closes: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory backend with scripted behavior:
///
/// - text containing `fail` does not compile
/// - text containing `boom` compiles but fails when run
/// - `select ...` yields one row per parameter, echoing it in column `value`
/// - running `alter ...` changes the schema
/// - anything else reports one affected row per parameter
pub struct ScriptedModule {
    name: String,
    abi_version: u32,
    counters: Arc<Counters>,
}

impl BackendModule for ScriptedModule {
    fn manifest(&self) -> PluginManifest {
        let mut manifest =
            PluginManifest::new(self.name.clone()).with_placeholder_style(PlaceholderStyle::Postgres);
        manifest.abi_version = self.abi_version;
        manifest
    }

    fn open(
        &self,
        _type_name: &str,
        options: &OpenOptions,
    ) -> Result<Box<dyn NativeConnection>, SqlPluginDbError> {
        if options.path == "unreachable" {
            return Err(SqlPluginDbError::ConnectionError("unreachable".into()));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConn {
            counters: Arc::clone(&self.counters),
            schema_dirty: false,
        }))
    }

    fn unload(&self) {
        self.counters.unloads.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedConn {
    counters: Arc<Counters>,
    schema_dirty: bool,
}

impl NativeConnection for ScriptedConn {
    fn compile(&mut self, sql: &str) -> Result<StatementShape, SqlPluginDbError> {
        self.counters.compiles.fetch_add(1, Ordering::SeqCst);
        if sql.contains("fail") {
            return Err(SqlPluginDbError::CompileError {
                sql: sql.to_string(),
                message: "scripted compile failure".into(),
            });
        }
        let columns = if sql.trim_start().starts_with("select") {
            vec!["value".to_string()]
        } else {
            Vec::new()
        };
        Ok(StatementShape {
            parameters: scan_markers(sql),
            columns,
        })
    }

    fn run(&mut self, sql: &str, params: &[Value]) -> Result<RowBatch, SqlPluginDbError> {
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
        if sql.contains("boom") {
            return Err(SqlPluginDbError::BackendError {
                code: 1,
                message: "scripted run failure".into(),
            });
        }
        if sql.trim_start().starts_with("alter") {
            self.schema_dirty = true;
        }
        if sql.trim_start().starts_with("select") {
            let mut batch = RowBatch::new(vec!["value".to_string()]);
            for value in params {
                batch.push_values(vec![value.clone()]);
            }
            Ok(batch)
        } else {
            let mut batch = RowBatch::new(Vec::new());
            batch.rows_affected = params.len() as u64;
            Ok(batch)
        }
    }

    fn evict(&mut self, _sql: &str) {
        self.counters.evicts.fetch_add(1, Ordering::SeqCst);
    }

    fn schema_changed(&mut self) -> bool {
        std::mem::take(&mut self.schema_dirty)
    }

    fn close(&mut self) -> Result<(), SqlPluginDbError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Registry with a scripted module installed under `name`.
pub fn scripted_registry(name: &str) -> (PluginRegistry, Arc<Counters>) {
    scripted_registry_with_abi(name, sql_plugins::plugin::PLUGIN_ABI_VERSION)
}

pub fn scripted_registry_with_abi(name: &str, abi_version: u32) -> (PluginRegistry, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let registry = PluginRegistry::new();
    let module_name = name.to_string();
    let factory_counters = Arc::clone(&counters);
    registry.register_fn(name, move || {
        factory_counters.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedModule {
            name: module_name.clone(),
            abi_version,
            counters: Arc::clone(&factory_counters),
        }) as Box<dyn BackendModule>)
    });
    (registry, counters)
}

/// Fresh database file path inside a temp dir; keep the dir alive for the test.
pub fn temp_db(name: &str) -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(format!("{name}.db"));
    (dir, path.to_string_lossy().into_owned())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
