use std::time::Duration;

use anyhow::Result;
use planforce_common::config::{BackendConfig, DispatchSettings};
use planforce_exec::backend::DuckDbBackend;
use planforce_exec::{Dispatcher, ExecError};
use serde_json::json;

fn backend(path: &str) -> DuckDbBackend {
    DuckDbBackend::new(&BackendConfig {
        name: "duck".to_string(),
        kind: "duckdb".to_string(),
        dsn: None,
        path: Some(path.to_string()),
        password: None,
        disable_genetic_optimizer: true,
        enable_optimizer: true,
    })
    .unwrap()
}

#[tokio::test]
async fn test_duckdb_executes_and_profiles() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("smoke.db").display().to_string();

    {
        let conn = duckdb::Connection::open(&db_path)?;
        conn.execute_batch(
            "CREATE TABLE t(id INTEGER, name VARCHAR);
             INSERT INTO t VALUES (1, 'a'), (2, 'b'), (3, NULL);",
        )?;
    }

    let backend = backend(&db_path);
    let dispatcher = Dispatcher::new(DispatchSettings::default());
    let result = dispatcher
        .dispatch(&backend, "SELECT id, name FROM t ORDER BY id", None, None)
        .await?;

    assert!(!result.timed_out);
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.rows[0], json!([1, "a"]));
    assert_eq!(result.rows[2], json!([3, null]));
    // The profiler artifact may be missing on some builds, in which case
    // latency degrades to the unknown sentinel.
    assert!(result.latency_ms >= 0.0 || result.latency_ms == -1.0);
    assert!(result.plan.is_none());
    assert_eq!(result.backend_identity, format!("duckdb://{db_path}"));

    Ok(())
}

#[tokio::test]
async fn test_duckdb_rejects_timeouts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("smoke.db").display().to_string();
    {
        let conn = duckdb::Connection::open(&db_path)?;
        conn.execute_batch("CREATE TABLE t(id INTEGER);")?;
    }

    let backend = backend(&db_path);
    let dispatcher = Dispatcher::new(DispatchSettings::default());
    let outcome = dispatcher
        .dispatch(
            &backend,
            "SELECT * FROM t",
            None,
            Some(Duration::from_millis(100)),
        )
        .await;

    assert!(matches!(
        outcome,
        Err(ExecError::NotSupported {
            feature: "statement timeouts",
            ..
        })
    ));

    Ok(())
}
