//! Execution dispatch with timeout enforcement.
//!
//! `dispatch` is the only blocking operation in the core: it submits
//! one `(SQL, hint)` pair and waits for the backend or the timeout.
//! A timeout is a first-class soft outcome, never an error; everything
//! else hard-fails with [`ExecError`] and is not retried here.
//!
//! `dispatch_all` fans jobs out over a worker pool with no ordering
//! guarantees between them and no shared mutable state; one failed job
//! never aborts the batch.

use std::sync::Arc;
use std::time::Duration;

use planforce_common::config::DispatchSettings;
use tokio::task::JoinSet;

use crate::backend::{Backend, RawRun};
use crate::error::ExecError;
use crate::result::ExecResult;

/// One unit of parallel work.
#[derive(Debug, Clone)]
pub struct QueryJob {
    pub query_id: String,
    pub sql: String,
    pub hint: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings) -> Self {
        Self { settings }
    }

    /// Submits one statement to a backend, embedding the hint first.
    ///
    /// The timeout is enforced backend-side where the backend supports
    /// it, with an outer guard at `timeout + grace` in case the backend
    /// never comes back. Note the abandoned statement may keep running
    /// on the backend until its own cancellation takes effect.
    pub async fn dispatch(
        &self,
        backend: &dyn Backend,
        sql: &str,
        hint: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<ExecResult, ExecError> {
        let statement = match hint {
            Some(h) if !h.is_empty() => backend.add_comment(sql, h)?,
            _ => sql.to_string(),
        };
        let identity = backend.identity();

        let raw = match timeout {
            Some(limit) => {
                let grace = Duration::from_millis(self.settings.timeout_grace_ms);
                match tokio::time::timeout(limit + grace, backend.run(&statement, Some(limit)))
                    .await
                {
                    Ok(run) => run?,
                    Err(_) => {
                        tracing::info!(
                            backend = %identity,
                            timeout_ms = limit.as_millis() as u64,
                            "backend did not respond within the timeout; abandoning"
                        );
                        RawRun::timed_out()
                    }
                }
            }
            None => backend.run(&statement, None).await?,
        };

        if raw.timed_out {
            return Ok(ExecResult::timed_out(identity));
        }
        Ok(ExecResult {
            rows: raw.rows,
            plan: raw.plan,
            timed_out: false,
            latency_ms: raw.latency_ms,
            backend_identity: identity,
        })
    }

    /// Dispatches jobs concurrently against one backend, returning each
    /// job's outcome keyed by query id, completion order.
    pub async fn dispatch_all(
        &self,
        backend: Arc<dyn Backend>,
        jobs: Vec<QueryJob>,
    ) -> Vec<(String, Result<ExecResult, ExecError>)> {
        let mut set = JoinSet::new();
        for job in jobs {
            let backend = Arc::clone(&backend);
            let dispatcher = *self;
            set.spawn(async move {
                let timeout = job
                    .timeout
                    .or_else(|| dispatcher.settings.default_timeout_ms.map(Duration::from_millis));
                let outcome = dispatcher
                    .dispatch(backend.as_ref(), &job.sql, job.hint.as_deref(), timeout)
                    .await;
                (job.query_id, outcome)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => {
                    tracing::error!("dispatch worker panicked: {}", e);
                    results.push(("<unknown>".to_string(), Err(ExecError::Worker(e))));
                }
            }
        }
        results
    }
}
