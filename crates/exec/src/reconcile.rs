//! Forced-plan reconciliation.
//!
//! Given the outcome of one dispatch and the hint the caller intended
//! to force, derives the executed plan's canonical hint and compares.
//! A mismatch means the backend did not respect the forcing directive;
//! it is surfaced loudly with enough context to reproduce (query id,
//! backend identity, both hint strings) but never thrown, and never
//! aborts reconciliation of other queries in the batch.

use std::sync::Arc;

use planforce_plan::hint::hint_str;
use planforce_plan::PlanNode;
use serde::Serialize;

use crate::backend::Backend;
use crate::error::ExecError;
use crate::result::ExecResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReconcileStatus {
    /// No hint was requested; verification skipped, latency reported.
    NoHintRequested,
    /// Executed canonical hint equals the intended one.
    Verified,
    /// The backend did not respect the forcing directive.
    Mismatched,
}

/// An alternative plan the model considered, with its predicted cost.
#[derive(Debug, Clone)]
pub struct CandidatePlan {
    pub plan: PlanNode,
    pub predicted_latency_ms: f64,
}

/// Per-candidate tags. All three are independent and may apply to one
/// candidate simultaneously.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateAnnotation {
    pub hint: String,
    pub predicted_latency_ms: f64,
    /// Minimum predicted latency among the candidates.
    pub cheapest: bool,
    /// The plan the model actually chose (hint equals the intended one).
    pub picked: bool,
    /// The plan that actually executed.
    pub executed: bool,
}

/// What the caller intended when dispatching one query.
#[derive(Debug, Clone, Default)]
pub struct Intent {
    pub query_id: String,
    pub sql: String,
    pub hint: Option<String>,
    pub predicted_latency_ms: Option<f64>,
    pub candidates: Vec<CandidatePlan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub query_id: String,
    pub status: ReconcileStatus,
    pub intended_hint: Option<String>,
    pub executed_hint: Option<String>,
    /// Authoritative latency; stays `-1.0` for timed-out executions even
    /// when the fallback re-derivation succeeds.
    pub latency_ms: f64,
    pub predicted_latency_ms: Option<f64>,
    pub timed_out: bool,
    pub backend_identity: String,
    pub min_candidate_latency_ms: Option<f64>,
    pub candidates: Vec<CandidateAnnotation>,
}

pub struct Reconciler {
    /// Backend used to re-derive a plan when the dispatched execution
    /// timed out and produced none. Must share a plan format with the
    /// dispatch backend.
    fallback: Arc<dyn Backend>,
    /// Compare with physical operators (byte-exact) or join order only.
    plan_physical: bool,
}

impl Reconciler {
    pub fn new(fallback: Arc<dyn Backend>, plan_physical: bool) -> Self {
        Self {
            fallback,
            plan_physical,
        }
    }

    pub async fn reconcile(
        &self,
        result: ExecResult,
        intent: Intent,
    ) -> Result<Report, ExecError> {
        let Some(intended_hint) = intent.hint.clone().filter(|h| !h.is_empty()) else {
            // Running baseline: nothing to verify.
            return Ok(Report {
                query_id: intent.query_id,
                status: ReconcileStatus::NoHintRequested,
                intended_hint: None,
                executed_hint: None,
                latency_ms: result.latency_ms,
                predicted_latency_ms: intent.predicted_latency_ms,
                timed_out: result.timed_out,
                backend_identity: result.backend_identity,
                min_candidate_latency_ms: None,
                candidates: Vec::new(),
            });
        };

        let executed_tree = if result.timed_out {
            // No plan was produced. Re-run the same SQL+hint on the
            // fallback with analysis enabled and no time limit, purely
            // for verification; the authoritative latency stays -1.
            tracing::warn!(
                query_id = %intent.query_id,
                backend = %result.backend_identity,
                "timeout occurred; deriving the executed plan from the fallback backend"
            );
            let statement = self.fallback.add_comment(&intent.sql, &intended_hint)?;
            let raw = self.fallback.run(&statement, None).await?;
            let plan = raw.plan.ok_or_else(|| ExecError::MissingPlan {
                backend: self.fallback.identity(),
            })?;
            self.fallback.parse_plan(&plan)?
        } else {
            let plan = result.plan.as_ref().ok_or_else(|| ExecError::MissingPlan {
                backend: result.backend_identity.clone(),
            })?;
            self.fallback.parse_plan(plan)?
        };

        let executed_hint = hint_str(&executed_tree, self.plan_physical);
        let status = if executed_hint == intended_hint {
            ReconcileStatus::Verified
        } else {
            tracing::warn!(
                query_id = %intent.query_id,
                backend = %result.backend_identity,
                intended = %intended_hint,
                executed = %executed_hint,
                "hint not respected"
            );
            ReconcileStatus::Mismatched
        };

        let (min_candidate_latency_ms, candidates) =
            annotate_candidates(&intent, &intended_hint, &executed_hint, self.plan_physical);

        Ok(Report {
            query_id: intent.query_id,
            status,
            intended_hint: Some(intended_hint),
            executed_hint: Some(executed_hint),
            latency_ms: result.latency_ms,
            predicted_latency_ms: intent.predicted_latency_ms,
            timed_out: result.timed_out,
            backend_identity: result.backend_identity,
            min_candidate_latency_ms,
            candidates,
        })
    }

    /// Reconciles a batch item by item; one query's failure never aborts
    /// the others.
    pub async fn reconcile_all(
        &self,
        items: Vec<(ExecResult, Intent)>,
    ) -> Vec<Result<Report, ExecError>> {
        let mut reports = Vec::with_capacity(items.len());
        for (result, intent) in items {
            let query_id = intent.query_id.clone();
            let report = self.reconcile(result, intent).await;
            if let Err(e) = &report {
                tracing::error!(query_id = %query_id, "reconciliation failed: {}", e);
            }
            reports.push(report);
        }
        reports
    }
}

fn annotate_candidates(
    intent: &Intent,
    intended_hint: &str,
    executed_hint: &str,
    plan_physical: bool,
) -> (Option<f64>, Vec<CandidateAnnotation>) {
    if intent.candidates.is_empty() {
        return (None, Vec::new());
    }

    let min_latency = intent
        .candidates
        .iter()
        .map(|c| c.predicted_latency_ms)
        .fold(f64::INFINITY, f64::min);

    let annotations = intent
        .candidates
        .iter()
        .map(|candidate| {
            let hint = hint_str(&candidate.plan, plan_physical);
            CandidateAnnotation {
                cheapest: candidate.predicted_latency_ms == min_latency,
                picked: hint == intended_hint,
                executed: hint == executed_hint,
                predicted_latency_ms: candidate.predicted_latency_ms,
                hint,
            }
        })
        .collect();

    (Some(min_latency), annotations)
}
