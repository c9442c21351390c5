#![cfg(feature = "sqlite")]

mod common;

use std::collections::BTreeMap;

use common::temp_db;
use sql_plugins::prelude::*;

fn construct(path: &str) -> ObjectHandle {
    let plugin = PluginRegistry::with_builtin().load("sqlite3").unwrap();
    plugin
        .construct("Database", CallArgs::new().arg(path))
        .unwrap()
}

fn call(object: &ObjectHandle, method: &str, args: CallArgs) -> Returned {
    object.call(method, args).unwrap()
}

#[test]
fn generic_calls_drive_the_whole_lifecycle() {
    let (_dir, path) = temp_db("binding");
    let db = construct(&path);
    assert_eq!(db.type_name(), "Database");

    call(&db, "execute", CallArgs::new().arg("create table if not exists t(a int)"));
    let cursor = call(
        &db,
        "execute",
        CallArgs::new()
            .arg("insert into t values(?)")
            .arg(vec![Value::Int(0)]),
    )
    .into_object()
    .expect("cursor object");
    assert_eq!(cursor.type_name(), "Cursor");

    for i in 1..10 {
        let again = call(
            &cursor,
            "execute",
            CallArgs::new().kwarg("values", vec![Value::Int(i)]),
        )
        .into_object()
        .expect("same cursor");
        assert!(ObjectHandle::same_object(&cursor, &again));
    }

    let counted = call(&db, "execute", CallArgs::new().arg("select count(*) as n from t"))
        .into_object()
        .expect("cursor object");
    let rows = call(&counted, "fetchall", CallArgs::new())
        .into_rows()
        .expect("rows");
    assert_eq!(rows[0].get("n"), Some(&Value::Int(10)));
    assert!(call(&counted, "fetchone", CallArgs::new()).is_end());

    let path_value = call(&db, "path", CallArgs::new()).into_value();
    assert_eq!(path_value, Some(Value::Text(path.clone())));

    call(&db, "close", CallArgs::new());
    assert!(matches!(
        counted.call("fetchone", CallArgs::new()).unwrap_err(),
        SqlPluginDbError::UseAfterClose(_)
    ));
}

#[test]
fn prepared_statements_through_the_binding() {
    let db = construct(":memory:");
    let stmt = call(&db, "prepare", CallArgs::new().arg("select ?1 + ?2 as total"))
        .into_object()
        .expect("statement object");
    assert_eq!(stmt.type_name(), "Statement");
    assert_eq!(
        call(&stmt, "parameter_count", CallArgs::new()).into_value(),
        Some(Value::Int(2))
    );
    match call(&stmt, "column_names", CallArgs::new()) {
        Returned::Columns(columns) => assert_eq!(columns, vec!["total".to_string()]),
        other => panic!("unexpected return: {other:?}"),
    }

    let cursor = call(
        &stmt,
        "execute",
        CallArgs::new().arg(vec![Value::Int(2), Value::Int(3)]),
    )
    .into_object()
    .expect("cursor object");
    let row = call(&cursor, "fetchone", CallArgs::new())
        .into_row()
        .expect("row");
    assert_eq!(row.get("total"), Some(&Value::Int(5)));

    call(&db, "close", CallArgs::new());
    for method in ["parameter_count", "column_names", "sql", "execute"] {
        assert!(
            matches!(
                stmt.call(method, CallArgs::new()).unwrap_err(),
                SqlPluginDbError::UseAfterClose(_)
            ),
            "{method}"
        );
    }
    for method in ["description", "rowcount", "lastrowid", "fetchall"] {
        assert!(
            matches!(
                cursor.call(method, CallArgs::new()).unwrap_err(),
                SqlPluginDbError::UseAfterClose(_)
            ),
            "{method}"
        );
    }
}

#[test]
fn unknown_names_are_unbound() {
    let plugin = PluginRegistry::with_builtin().load("sqlite3").unwrap();
    assert_eq!(
        plugin
            .construct("Connection", CallArgs::new().arg(":memory:"))
            .unwrap_err(),
        SqlPluginDbError::UnboundMethod {
            type_name: "sqlite3".into(),
            method: "Connection".into()
        }
    );

    let db = construct(":memory:");
    assert_eq!(
        db.call("vacuum", CallArgs::new()).unwrap_err(),
        SqlPluginDbError::UnboundMethod {
            type_name: "Database".into(),
            method: "vacuum".into()
        }
    );
    let cursor = call(&db, "execute", CallArgs::new().arg("select 1"))
        .into_object()
        .expect("cursor");
    assert!(matches!(
        cursor.call("fetchmany", CallArgs::new()).unwrap_err(),
        SqlPluginDbError::UnboundMethod { .. }
    ));

    let binding = ModuleBinding::new(plugin);
    assert_eq!(binding.constructors(), &["Database".to_string()]);
    assert!(binding.methods("Cursor").unwrap().contains(&"fetchall"));
    assert!(binding.methods("Widget").is_err());
}

#[test]
fn argument_errors_follow_the_signature() {
    let plugin = PluginRegistry::with_builtin().load("sqlite3").unwrap();
    assert_eq!(
        plugin.construct("Database", CallArgs::new()).unwrap_err(),
        SqlPluginDbError::MissingParameter("path".into())
    );
    assert!(matches!(
        plugin
            .construct("Database", CallArgs::new().arg(5))
            .unwrap_err(),
        SqlPluginDbError::ParameterTypeError(_)
    ));

    let db = construct(":memory:");
    assert!(matches!(
        db.call("close", CallArgs::new().arg("extra")).unwrap_err(),
        SqlPluginDbError::ParameterCountMismatch { expected: 0, supplied: 1 }
    ));
    assert!(matches!(
        db.call("execute", CallArgs::new().arg("select ?").arg(1))
            .unwrap_err(),
        SqlPluginDbError::ParameterTypeError(_)
    ));
    assert!(matches!(
        db.call(
            "execute",
            CallArgs::new().arg("select ?").arg(Vec::<Value>::new())
        )
        .unwrap_err(),
        SqlPluginDbError::ParameterCountMismatch { expected: 1, supplied: 0 }
    ));
}

#[test]
fn constructor_options_map_onto_open_options() {
    let plugin = PluginRegistry::with_builtin().load("sqlite3").unwrap();

    let mut options = BTreeMap::new();
    options.insert("statement_cache_capacity".to_string(), Value::Int(4));
    options.insert("translate_placeholders".to_string(), Value::Int(1));
    let db = plugin
        .construct("Database", CallArgs::new().arg(":memory:").arg(options))
        .unwrap();
    let cursor = call(
        &db,
        "execute",
        CallArgs::new()
            .arg("select $1 as v")
            .arg(vec![Value::from("translated")]),
    )
    .into_object()
    .expect("cursor");
    let row = call(&cursor, "fetchone", CallArgs::new()).into_row().expect("row");
    assert_eq!(row.get("v"), Some(&Value::from("translated")));

    let mut bogus = BTreeMap::new();
    bogus.insert("colour".to_string(), Value::from("blue"));
    assert!(matches!(
        plugin
            .construct("Database", CallArgs::new().arg(":memory:").kwarg("options", bogus))
            .unwrap_err(),
        SqlPluginDbError::ConfigError(_)
    ));
}

#[test]
fn typed_handle_is_reachable_from_the_object() {
    let db = construct(":memory:");
    let handle = db.as_database().expect("database object");
    handle.execute("create table t(a)", ()).unwrap();
    call(&db, "execute", CallArgs::new().arg("insert into t values(1)"));
    let rows = handle.execute("select a from t", ()).unwrap().fetchall().unwrap();
    assert_eq!(rows.len(), 1);
}
