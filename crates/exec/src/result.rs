use serde::Serialize;
use serde_json::Value;

/// Outcome of one dispatched execution.
///
/// Produced once per dispatch and never mutated afterward; consumed by
/// exactly one reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    /// Raw result set, ordered exactly as the backend returned it.
    /// Empty when `timed_out` is true.
    pub rows: Vec<Value>,

    /// Raw plan document captured during execution; absent on timeout
    /// and on backends that expose no plan surface.
    pub plan: Option<Value>,

    /// True means the backend aborted the statement before completion.
    pub timed_out: bool,

    /// Wall-clock execution time measured by the backend's own profiler
    /// (client-side transport overhead excluded), `-1.0` if unknown.
    pub latency_ms: f64,

    /// Which backend instance served the request (scrubbed host/path),
    /// for diagnosing flaky or skewed workers.
    pub backend_identity: String,
}

impl ExecResult {
    /// The soft-timeout state: no rows, no plan, unknown latency.
    pub fn timed_out(backend_identity: String) -> Self {
        Self {
            rows: Vec::new(),
            plan: None,
            timed_out: true,
            latency_ms: -1.0,
            backend_identity,
        }
    }
}
