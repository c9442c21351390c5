#![cfg(all(feature = "sqlite", feature = "tokio"))]

use std::time::Duration;

use sql_plugins::offload::{run_blocking, run_blocking_with_timeout};
use sql_plugins::prelude::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn database_work_runs_on_the_blocking_pool() -> Result<(), SqlPluginDbError> {
    let plugin = PluginRegistry::with_builtin().load("sqlite3")?;
    let db = DatabaseHandle::open(&plugin, ":memory:")?;
    db.execute("create table t(a int)", ())?;

    let mut tasks = Vec::new();
    for i in 0..8_i64 {
        let db = db.clone();
        tasks.push(tokio::spawn(run_blocking(move || {
            db.execute("insert into t values(?)", [Value::Int(i)])
                .and_then(|cur| cur.rowcount())
        })));
    }
    for task in tasks {
        let rowcount = task.await.expect("task joined")?;
        assert_eq!(rowcount, 1);
    }

    let reader = db.clone();
    let rows = run_blocking(move || reader.execute("select sum(a) from t", ())?.fetchall()).await?;
    assert_eq!(rows[0][0], Value::Int(28));
    Ok(())
}

#[tokio::test]
async fn slow_work_times_out() {
    let err = run_blocking_with_timeout(Duration::from_millis(20), || {
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    })
    .await
    .unwrap_err();
    assert_eq!(err, SqlPluginDbError::Timeout(Duration::from_millis(20)));
}
