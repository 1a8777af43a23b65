//! DuckDB backend.
//!
//! The DuckDB connection is not `Send`, so each run opens the database
//! inside `spawn_blocking` and everything stays on that thread. The
//! profiler writes a JSON artifact which is backend-instance-local:
//! each run gets its own temp file and reads it back immediately, so
//! concurrent dispatches never clobber each other's timings.
//!
//! DuckDB has no hint-comment syntax and no statement timeout; both
//! are reported as `NotSupported` configuration errors up front rather
//! than silently ignored.

use std::time::Duration;

use async_trait::async_trait;
use planforce_common::config::BackendConfig;
use planforce_plan::PlanNode;
use serde_json::Value;

use super::{Backend, RawRun};
use crate::error::ExecError;

pub struct DuckDbBackend {
    path: String,
    enable_optimizer: bool,
}

impl DuckDbBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ExecError> {
        let path = config.path.clone().ok_or_else(|| ExecError::Config {
            backend: config.name.clone(),
            message: "duckdb backend requires a 'path'".to_string(),
        })?;
        Ok(Self {
            path,
            enable_optimizer: config.enable_optimizer,
        })
    }
}

#[async_trait]
impl Backend for DuckDbBackend {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn identity(&self) -> String {
        format!("duckdb://{}", self.path)
    }

    fn add_comment(&self, sql: &str, hint: &str) -> Result<String, ExecError> {
        if hint.is_empty() {
            Ok(sql.to_string())
        } else {
            Err(ExecError::NotSupported {
                backend: self.identity(),
                feature: "hint comments",
            })
        }
    }

    async fn run(&self, sql: &str, timeout: Option<Duration>) -> Result<RawRun, ExecError> {
        if timeout.is_some() {
            return Err(ExecError::NotSupported {
                backend: self.identity(),
                feature: "statement timeouts",
            });
        }

        let path = self.path.clone();
        let identity = self.identity();
        let sql = sql.to_string();
        let enable_optimizer = self.enable_optimizer;
        tokio::task::spawn_blocking(move || run_blocking(&path, &identity, &sql, enable_optimizer))
            .await?
    }

    fn parse_plan(&self, _raw: &Value) -> Result<PlanNode, ExecError> {
        Err(ExecError::NotSupported {
            backend: self.identity(),
            feature: "plan parsing",
        })
    }
}

fn run_blocking(
    path: &str,
    identity: &str,
    sql: &str,
    enable_optimizer: bool,
) -> Result<RawRun, ExecError> {
    let profile = tempfile::Builder::new()
        .prefix("planforce-profile-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| ExecError::backend(identity, e))?;
    let profile_path = profile.path().display().to_string();

    let conn = duckdb::Connection::open(path).map_err(|e| ExecError::backend(identity, e))?;

    let optimizer_pragma = if enable_optimizer {
        "PRAGMA enable_optimizer"
    } else {
        "PRAGMA disable_optimizer"
    };
    conn.execute_batch(&format!(
        "{optimizer_pragma}; PRAGMA enable_profiling='json'; PRAGMA profile_output='{profile_path}';"
    ))
    .map_err(|e| ExecError::backend(identity, e))?;

    let rows = {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| ExecError::backend(identity, e))?;
        let mut raw_rows = stmt.query([]).map_err(|e| ExecError::backend(identity, e))?;

        let mut rows: Vec<Value> = Vec::new();
        while let Some(row) = raw_rows
            .next()
            .map_err(|e| ExecError::backend(identity, e))?
        {
            // Column count is only known once the statement has run.
            let column_count = row.as_ref().column_count();
            let mut fields = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = row
                    .get_ref(i)
                    .map_err(|e| ExecError::backend(identity, e))?;
                fields.push(duck_value_to_json(value));
            }
            rows.push(Value::Array(fields));
        }
        rows
    }; // stmt and its row cursor are dropped here, flushing the profile

    let latency_ms = read_profiled_latency_ms(&profile_path);

    Ok(RawRun {
        rows,
        plan: None,
        latency_ms,
        timed_out: false,
    })
}

/// Reads the profiler's `latency` (seconds) and surfaces milliseconds,
/// `-1.0` when the artifact is missing or does not carry one.
fn read_profiled_latency_ms(path: &str) -> f64 {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return -1.0;
    };
    serde_json::from_str::<Value>(&contents)
        .ok()
        .and_then(|profile| profile.get("latency").and_then(Value::as_f64))
        .map_or(-1.0, |seconds| seconds * 1_000.0)
}

fn duck_value_to_json(value: duckdb::types::ValueRef<'_>) -> Value {
    use duckdb::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::from(i),
        ValueRef::SmallInt(i) => Value::from(i),
        ValueRef::Int(i) => Value::from(i),
        ValueRef::BigInt(i) => Value::from(i),
        ValueRef::HugeInt(i) => Value::String(i.to_string()),
        ValueRef::UTinyInt(i) => Value::from(i),
        ValueRef::USmallInt(i) => Value::from(i),
        ValueRef::UInt(i) => Value::from(i),
        ValueRef::UBigInt(i) => Value::from(i),
        ValueRef::Float(f) => Value::from(f),
        ValueRef::Double(f) => Value::from(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> DuckDbBackend {
        DuckDbBackend::new(&BackendConfig {
            name: "duck".to_string(),
            kind: "duckdb".to_string(),
            dsn: None,
            path: Some("/data/imdb.db".to_string()),
            password: None,
            disable_genetic_optimizer: true,
            enable_optimizer: true,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_timeout_is_not_supported() {
        let result = backend()
            .run("SELECT 1", Some(Duration::from_millis(100)))
            .await;
        assert!(matches!(
            result,
            Err(ExecError::NotSupported {
                feature: "statement timeouts",
                ..
            })
        ));
    }

    #[test]
    fn test_hint_comment_is_not_supported() {
        assert!(matches!(
            backend().add_comment("SELECT 1", "/*+ Leading(t) */"),
            Err(ExecError::NotSupported {
                feature: "hint comments",
                ..
            })
        ));
        assert_eq!(backend().add_comment("SELECT 1", "").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_missing_latency_is_unknown() {
        assert_eq!(read_profiled_latency_ms("/nonexistent/profile.json"), -1.0);
    }
}
