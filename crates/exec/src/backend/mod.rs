//! Backend capability interface and implementations.
//!
//! Each relational backend implements the [`Backend`] trait; the
//! dispatcher and reconciler only ever talk to the trait. Capabilities
//! a backend cannot provide return [`ExecError::NotSupported`] instead
//! of failing at first use.
//!
//! # Supported backends
//!
//! | Kind       | Implementation    | Hints | Timeouts | Plan capture |
//! |------------|-------------------|-------|----------|--------------|
//! | `postgres` | `PostgresBackend` | yes   | yes      | yes          |
//! | `duckdb`   | `DuckDbBackend`   | no    | no       | no           |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use planforce_common::config::BackendConfig;
use planforce_plan::PlanNode;
use serde_json::Value;

use crate::error::ExecError;

pub mod duckdb;
pub mod postgres;

pub use duckdb::DuckDbBackend;
pub use postgres::PostgresBackend;

/// What one execution handed back before dispatch policy is applied.
#[derive(Debug, Clone, Default)]
pub struct RawRun {
    pub rows: Vec<Value>,
    pub plan: Option<Value>,
    pub latency_ms: f64,
    pub timed_out: bool,
}

impl RawRun {
    pub fn timed_out() -> Self {
        Self {
            rows: Vec::new(),
            plan: None,
            latency_ms: -1.0,
            timed_out: true,
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend kind, e.g. `"postgres"`.
    fn name(&self) -> &'static str;

    /// Scrubbed identity of this backend instance (host/path), safe to
    /// log and to attach to results.
    fn identity(&self) -> String;

    /// Embeds a hint into the SQL text following this backend's comment
    /// syntax. An empty hint returns the SQL unchanged.
    fn add_comment(&self, sql: &str, hint: &str) -> Result<String, ExecError>;

    /// Executes the statement with analysis enabled, capturing the plan
    /// and the backend profiler's latency. A backend-side timeout maps
    /// to a soft [`RawRun::timed_out`], never an error.
    async fn run(&self, sql: &str, timeout: Option<Duration>) -> Result<RawRun, ExecError>;

    /// Parses this backend's raw plan document into a [`PlanNode`] tree.
    fn parse_plan(&self, raw: &Value) -> Result<PlanNode, ExecError>;
}

/// Builds a backend from configuration. Unknown kinds are a
/// configuration error, reported before anything connects.
pub fn backend_from_config(config: &BackendConfig) -> Result<Arc<dyn Backend>, ExecError> {
    match config.kind.as_str() {
        "postgres" => Ok(Arc::new(PostgresBackend::new(config)?)),
        "duckdb" => Ok(Arc::new(DuckDbBackend::new(config)?)),
        other => Err(ExecError::NotSupported {
            backend: other.to_string(),
            feature: "this backend kind",
        }),
    }
}
