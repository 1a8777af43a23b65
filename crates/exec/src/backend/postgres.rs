//! PostgreSQL backend.
//!
//! Executes `EXPLAIN (ANALYZE, VERBOSE, FORMAT JSON)` over a fresh
//! connection per run, so concurrent dispatches never share a session.
//! Hints are pg_hint_plan comments prepended to the SQL text; the
//! genetic query optimizer is disabled by default so forced join
//! orders are not perturbed; a requested timeout becomes a
//! `statement_timeout`, and query cancellation (SQLSTATE 57014) maps to
//! a soft timed-out run.

use std::time::Duration;

use async_trait::async_trait;
use planforce_common::config::BackendConfig;
use planforce_common::scrubber::scrub_dsn;
use planforce_plan::{parse, PlanNode};
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};

use super::{Backend, RawRun};
use crate::error::ExecError;

pub struct PostgresBackend {
    dsn: String,
    disable_genetic_optimizer: bool,
}

impl PostgresBackend {
    /// Builds the backend from configuration. The keyword-form DSN may
    /// omit the password, which is then injected from the secret field
    /// so it never appears in config files as plain text alongside the
    /// host.
    pub fn new(config: &BackendConfig) -> Result<Self, ExecError> {
        let mut dsn = config.dsn.clone().ok_or_else(|| ExecError::Config {
            backend: config.name.clone(),
            message: "postgres backend requires a 'dsn'".to_string(),
        })?;
        if let Some(password) = &config.password {
            dsn.push_str(&format!(" password={}", password.expose_secret()));
        }
        Ok(Self {
            dsn,
            disable_genetic_optimizer: config.disable_genetic_optimizer,
        })
    }

    async fn connect(&self) -> Result<Client, ExecError> {
        let (client, connection) = tokio_postgres::connect(&self.dsn, NoTls)
            .await
            .map_err(|e| ExecError::backend(self.identity(), e))?;

        // Drive the connection off to the side; errors there surface on
        // the next client call anyway.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(client)
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn identity(&self) -> String {
        scrub_dsn(&self.dsn)
    }

    /// Postgres: `<comment>\n<SELECT ...>`.
    fn add_comment(&self, sql: &str, hint: &str) -> Result<String, ExecError> {
        if hint.is_empty() {
            Ok(sql.to_string())
        } else {
            Ok(format!("{hint}\n{sql}"))
        }
    }

    async fn run(&self, sql: &str, timeout: Option<Duration>) -> Result<RawRun, ExecError> {
        let client = self.connect().await?;

        if self.disable_genetic_optimizer {
            client
                .batch_execute("SET geqo TO off")
                .await
                .map_err(|e| ExecError::backend(self.identity(), e))?;
        }
        if let Some(limit) = timeout {
            client
                .batch_execute(&format!("SET statement_timeout TO {}", limit.as_millis()))
                .await
                .map_err(|e| ExecError::backend(self.identity(), e))?;
        }

        let explain = format!("EXPLAIN (ANALYZE, VERBOSE, FORMAT JSON) {sql}");
        match client.query(&explain, &[]).await {
            Ok(raw_rows) => {
                let mut rows = Vec::with_capacity(raw_rows.len());
                for row in &raw_rows {
                    let value: Value = row
                        .try_get(0)
                        .map_err(|e| ExecError::backend(self.identity(), e))?;
                    rows.push(value);
                }
                let plan = rows.first().cloned();
                // Profiler-reported time, not dispatcher wall-clock.
                let latency_ms = plan
                    .as_ref()
                    .and_then(parse::execution_time_ms)
                    .unwrap_or(-1.0);
                Ok(RawRun {
                    rows,
                    plan,
                    latency_ms,
                    timed_out: false,
                })
            }
            Err(e) if e.code() == Some(&SqlState::QUERY_CANCELED) => {
                tracing::info!(backend = %self.identity(), "statement timed out");
                Ok(RawRun::timed_out())
            }
            Err(e) => Err(ExecError::backend(self.identity(), e)),
        }
    }

    fn parse_plan(&self, raw: &Value) -> Result<PlanNode, ExecError> {
        Ok(parse::parse_plan(raw)?)
    }
}
