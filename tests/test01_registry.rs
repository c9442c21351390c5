mod common;

use std::thread;

use common::{Counters, scripted_registry, scripted_registry_with_abi};
use sql_plugins::prelude::*;

#[test]
fn unknown_name_is_plugin_not_found() {
    let registry = PluginRegistry::new();
    let err = registry.load("nope").unwrap_err();
    assert_eq!(err, SqlPluginDbError::PluginNotFound("nope".into()));
}

#[test]
fn repeated_loads_share_one_instance() {
    let (registry, counters) = scripted_registry("scripted");
    let a = registry.load("scripted").unwrap();
    let b = registry.load("scripted").unwrap();

    assert!(Plugin::same_instance(&a, &b));
    assert_eq!(Counters::get(&counters.loads), 1);
    assert_eq!(registry.ref_count("scripted"), 2);

    let c = b.clone();
    assert_eq!(registry.ref_count("scripted"), 3);
    drop((a, b, c));

    assert!(!registry.is_loaded("scripted"));
    assert_eq!(Counters::get(&counters.unloads), 1);

    // A later load starts a fresh instance.
    let _again = registry.load("scripted").unwrap();
    assert_eq!(Counters::get(&counters.loads), 2);
}

#[test]
fn concurrent_loads_run_the_factory_once() {
    let (registry, counters) = scripted_registry("scripted");
    let plugins: Vec<Plugin> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| registry.load("scripted").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(Counters::get(&counters.loads), 1);
    assert_eq!(registry.ref_count("scripted"), 8);
    assert!(plugins.windows(2).all(|w| Plugin::same_instance(&w[0], &w[1])));
}

#[test]
fn abi_mismatch_is_plugin_load_error() {
    let (registry, counters) = scripted_registry_with_abi("stale", 99);
    let err = registry.load("stale").unwrap_err();
    assert!(matches!(err, SqlPluginDbError::PluginLoadError { ref name, .. } if name == "stale"));
    assert!(!registry.is_loaded("stale"));
    assert_eq!(Counters::get(&counters.unloads), 1);
}

#[test]
fn factory_failure_is_wrapped_as_load_error() {
    let registry = PluginRegistry::new();
    registry.register_fn("broken", || {
        Err(SqlPluginDbError::ConnectionError("missing shared object".into()))
    });
    let err = registry.load("broken").unwrap_err();
    match err {
        SqlPluginDbError::PluginLoadError { name, reason } => {
            assert_eq!(name, "broken");
            assert!(reason.contains("missing shared object"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[cfg(feature = "sqlite")]
#[test]
fn module_naming_itself_differently_is_rejected() {
    let registry = PluginRegistry::new();
    registry.register("alias", sql_plugins::sqlite::factory());
    let err = registry.load("alias").unwrap_err();
    assert!(err.to_string().contains("sqlite3"));
    assert!(matches!(err, SqlPluginDbError::PluginLoadError { .. }));
}

#[test]
fn open_handles_keep_the_plugin_loaded() {
    let (registry, counters) = scripted_registry("scripted");
    let plugin = registry.load("scripted").unwrap();
    let db = DatabaseHandle::open(&plugin, "mem").unwrap();
    drop(plugin);

    assert!(registry.is_loaded("scripted"));
    drop(db);
    assert!(!registry.is_loaded("scripted"));
    assert_eq!(Counters::get(&counters.closes), 1);
    assert_eq!(Counters::get(&counters.unloads), 1);
}

#[cfg(feature = "sqlite")]
#[test]
fn builtin_registry_lists_sqlite() {
    let registry = PluginRegistry::with_builtin();
    assert_eq!(registry.installed(), vec!["sqlite3".to_string()]);
    let plugin = registry.load("sqlite3").unwrap();
    assert!(plugin.manifest().supports(Capability::Script));
    assert!(plugin.manifest().constructs("Database"));
}
