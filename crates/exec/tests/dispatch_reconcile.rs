//! Dispatch and reconciliation behavior over a scripted in-memory
//! backend. No database required.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use planforce_common::config::DispatchSettings;
use planforce_exec::reconcile::{CandidatePlan, Intent, ReconcileStatus, Reconciler};
use planforce_exec::{Backend, Dispatcher, ExecError, QueryJob, RawRun};
use planforce_plan::{parse, PlanNode};
use serde_json::{json, Value};

/// Scripted backend: records every statement it receives and replays a
/// fixed plan document.
struct MockBackend {
    plan: Option<Value>,
    latency_ms: f64,
    /// Simulated execution time before answering.
    delay: Option<Duration>,
    statements: Mutex<Vec<String>>,
}

impl MockBackend {
    fn with_plan(plan: Value) -> Self {
        Self {
            plan: Some(plan),
            latency_ms: 42.0,
            delay: None,
            statements: Mutex::new(Vec::new()),
        }
    }

    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn identity(&self) -> String {
        "mock://scripted".to_string()
    }

    fn add_comment(&self, sql: &str, hint: &str) -> Result<String, ExecError> {
        if hint.is_empty() {
            Ok(sql.to_string())
        } else {
            Ok(format!("{hint}\n{sql}"))
        }
    }

    async fn run(&self, sql: &str, _timeout: Option<Duration>) -> Result<RawRun, ExecError> {
        self.statements.lock().unwrap().push(sql.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(RawRun {
            rows: vec![json!([1])],
            plan: self.plan.clone(),
            latency_ms: self.latency_ms,
            timed_out: false,
        })
    }

    fn parse_plan(&self, raw: &Value) -> Result<PlanNode, ExecError> {
        Ok(parse::parse_plan(raw)?)
    }
}

/// Backend whose every run fails.
struct FailingBackend;

#[async_trait]
impl Backend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn identity(&self) -> String {
        "mock://failing".to_string()
    }

    fn add_comment(&self, sql: &str, _hint: &str) -> Result<String, ExecError> {
        Ok(sql.to_string())
    }

    async fn run(&self, _sql: &str, _timeout: Option<Duration>) -> Result<RawRun, ExecError> {
        Err(ExecError::backend(
            "mock://failing",
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
        ))
    }

    fn parse_plan(&self, _raw: &Value) -> Result<PlanNode, ExecError> {
        Err(ExecError::NotSupported {
            backend: "mock://failing".to_string(),
            feature: "plan parsing",
        })
    }
}

fn scan_record(op: &str, alias: &str) -> Value {
    json!({
        "Node Type": op,
        "Total Cost": 5.0,
        "Relation Name": alias,
        "Alias": alias,
    })
}

/// `t HashJoin mi`, executed plan fixture.
fn hash_join_plan() -> Value {
    json!({
        "Plan": {
            "Node Type": "Hash Join",
            "Total Cost": 25.0,
            "Plans": [scan_record("Seq Scan", "t"), scan_record("Index Scan", "mi")],
        },
        "Execution Time": 42.0,
    })
}

const HASH_JOIN_HINT: &str = "/*+ SeqScan(t) IndexScan(mi) HashJoin(t mi) Leading((t mi)) */";

fn settings() -> DispatchSettings {
    DispatchSettings {
        default_timeout_ms: None,
        timeout_grace_ms: 0,
    }
}

#[tokio::test]
async fn test_dispatch_embeds_hint() {
    let backend = MockBackend::with_plan(hash_join_plan());
    let dispatcher = Dispatcher::new(settings());

    let result = dispatcher
        .dispatch(&backend, "SELECT 1", Some(HASH_JOIN_HINT), None)
        .await
        .unwrap();

    assert!(!result.timed_out);
    assert_eq!(result.latency_ms, 42.0);
    let statements = backend.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with(HASH_JOIN_HINT));
    assert!(statements[0].ends_with("SELECT 1"));
}

#[tokio::test]
async fn test_dispatch_without_hint_leaves_sql_untouched() {
    let backend = MockBackend::with_plan(hash_join_plan());
    let dispatcher = Dispatcher::new(settings());

    dispatcher
        .dispatch(&backend, "SELECT 1", None, None)
        .await
        .unwrap();

    assert_eq!(backend.statements(), vec!["SELECT 1".to_string()]);
}

#[tokio::test]
async fn test_unresponsive_backend_becomes_soft_timeout() {
    let mut backend = MockBackend::with_plan(hash_join_plan());
    backend.delay = Some(Duration::from_secs(60));
    let dispatcher = Dispatcher::new(settings());

    let result = dispatcher
        .dispatch(&backend, "SELECT 1", None, Some(Duration::from_millis(50)))
        .await
        .unwrap();

    assert!(result.timed_out);
    assert_eq!(result.latency_ms, -1.0);
    assert!(result.plan.is_none());
    assert!(result.rows.is_empty());
}

#[tokio::test]
async fn test_backend_failure_propagates() {
    let dispatcher = Dispatcher::new(settings());
    let outcome = dispatcher
        .dispatch(&FailingBackend, "SELECT 1", None, None)
        .await;
    assert!(matches!(outcome, Err(ExecError::Backend { .. })));
}

#[tokio::test]
async fn test_dispatch_all_contains_per_job_failures() {
    let backend: Arc<dyn Backend> = Arc::new(MockBackend::with_plan(hash_join_plan()));
    let dispatcher = Dispatcher::new(settings());

    let jobs = vec![
        QueryJob {
            query_id: "q1".to_string(),
            sql: "SELECT 1".to_string(),
            hint: None,
            timeout: None,
        },
        QueryJob {
            query_id: "q2".to_string(),
            sql: "SELECT 2".to_string(),
            hint: Some(HASH_JOIN_HINT.to_string()),
            timeout: None,
        },
    ];

    let mut results = dispatcher.dispatch_all(backend, jobs).await;
    results.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "q1");
    assert!(results[0].1.is_ok());
    assert_eq!(results[1].0, "q2");
    assert!(results[1].1.is_ok());
}

#[tokio::test]
async fn test_reconcile_verified() {
    let backend: Arc<dyn Backend> = Arc::new(MockBackend::with_plan(hash_join_plan()));
    let dispatcher = Dispatcher::new(settings());
    let reconciler = Reconciler::new(Arc::clone(&backend), true);

    let result = dispatcher
        .dispatch(backend.as_ref(), "SELECT 1", Some(HASH_JOIN_HINT), None)
        .await
        .unwrap();
    let report = reconciler
        .reconcile(
            result,
            Intent {
                query_id: "q1".to_string(),
                sql: "SELECT 1".to_string(),
                hint: Some(HASH_JOIN_HINT.to_string()),
                predicted_latency_ms: Some(40.0),
                candidates: Vec::new(),
            },
        )
        .await
        .unwrap();

    assert_eq!(report.status, ReconcileStatus::Verified);
    assert_eq!(report.executed_hint.as_deref(), Some(HASH_JOIN_HINT));
    assert_eq!(report.latency_ms, 42.0);
    assert_eq!(report.predicted_latency_ms, Some(40.0));
}

#[tokio::test]
async fn test_reconcile_mismatched() {
    // Ask for a nested loop, get a hash join back.
    let intended = "/*+ SeqScan(t) IndexScan(mi) NestLoop(t mi) Leading((t mi)) */";
    let backend: Arc<dyn Backend> = Arc::new(MockBackend::with_plan(hash_join_plan()));
    let dispatcher = Dispatcher::new(settings());
    let reconciler = Reconciler::new(Arc::clone(&backend), true);

    let result = dispatcher
        .dispatch(backend.as_ref(), "SELECT 1", Some(intended), None)
        .await
        .unwrap();
    let report = reconciler
        .reconcile(
            result,
            Intent {
                query_id: "q1".to_string(),
                sql: "SELECT 1".to_string(),
                hint: Some(intended.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(report.status, ReconcileStatus::Mismatched);
    assert_eq!(report.intended_hint.as_deref(), Some(intended));
    assert_eq!(report.executed_hint.as_deref(), Some(HASH_JOIN_HINT));
}

#[tokio::test]
async fn test_reconcile_logical_mode_ignores_physical_operators() {
    // Same join order, different join algorithm: verified when only the
    // join order is compared.
    let intended = "/*+ Leading((t mi)) */";
    let backend: Arc<dyn Backend> = Arc::new(MockBackend::with_plan(hash_join_plan()));
    let dispatcher = Dispatcher::new(settings());
    let reconciler = Reconciler::new(Arc::clone(&backend), false);

    let result = dispatcher
        .dispatch(backend.as_ref(), "SELECT 1", Some(intended), None)
        .await
        .unwrap();
    let report = reconciler
        .reconcile(
            result,
            Intent {
                query_id: "q1".to_string(),
                sql: "SELECT 1".to_string(),
                hint: Some(intended.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(report.status, ReconcileStatus::Verified);
}

#[tokio::test]
async fn test_reconcile_no_hint_requested() {
    let backend: Arc<dyn Backend> = Arc::new(MockBackend::with_plan(hash_join_plan()));
    let reconciler = Reconciler::new(Arc::clone(&backend), true);
    let dispatcher = Dispatcher::new(settings());

    let result = dispatcher
        .dispatch(backend.as_ref(), "SELECT 1", None, None)
        .await
        .unwrap();
    let report = reconciler
        .reconcile(
            result,
            Intent {
                query_id: "baseline".to_string(),
                sql: "SELECT 1".to_string(),
                hint: None,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(report.status, ReconcileStatus::NoHintRequested);
    assert!(report.intended_hint.is_none());
    assert!(report.executed_hint.is_none());
    assert_eq!(report.latency_ms, 42.0);
}

#[tokio::test]
async fn test_timed_out_run_falls_back_for_verification() {
    // The dispatched run never answers; the fallback re-derives the
    // executed plan while the reported latency stays -1.
    let mut slow = MockBackend::with_plan(hash_join_plan());
    slow.delay = Some(Duration::from_secs(60));
    let fallback: Arc<dyn Backend> = Arc::new(MockBackend::with_plan(hash_join_plan()));

    let dispatcher = Dispatcher::new(settings());
    let result = dispatcher
        .dispatch(&slow, "SELECT 1", Some(HASH_JOIN_HINT), Some(Duration::from_millis(50)))
        .await
        .unwrap();
    assert!(result.timed_out);

    let reconciler = Reconciler::new(Arc::clone(&fallback), true);
    let report = reconciler
        .reconcile(
            result,
            Intent {
                query_id: "q1".to_string(),
                sql: "SELECT 1".to_string(),
                hint: Some(HASH_JOIN_HINT.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(report.timed_out);
    assert_eq!(report.latency_ms, -1.0);
    assert_eq!(report.status, ReconcileStatus::Verified);
}

#[tokio::test]
async fn test_candidate_annotations() {
    let backend: Arc<dyn Backend> = Arc::new(MockBackend::with_plan(hash_join_plan()));
    let reconciler = Reconciler::new(Arc::clone(&backend), true);
    let dispatcher = Dispatcher::new(settings());

    let executed_tree = parse::parse_plan(&hash_join_plan()).unwrap();
    let mut alternative = executed_tree.clone();
    alternative.operator = "Nested Loop".to_string();

    let result = dispatcher
        .dispatch(backend.as_ref(), "SELECT 1", Some(HASH_JOIN_HINT), None)
        .await
        .unwrap();
    let report = reconciler
        .reconcile(
            result,
            Intent {
                query_id: "q1".to_string(),
                sql: "SELECT 1".to_string(),
                hint: Some(HASH_JOIN_HINT.to_string()),
                predicted_latency_ms: Some(40.0),
                candidates: vec![
                    CandidatePlan {
                        plan: executed_tree,
                        predicted_latency_ms: 40.0,
                    },
                    CandidatePlan {
                        plan: alternative,
                        predicted_latency_ms: 35.0,
                    },
                ],
            },
        )
        .await
        .unwrap();

    assert_eq!(report.min_candidate_latency_ms, Some(35.0));
    assert_eq!(report.candidates.len(), 2);

    let chosen = &report.candidates[0];
    assert!(chosen.picked);
    assert!(chosen.executed);
    assert!(!chosen.cheapest);

    let cheaper = &report.candidates[1];
    assert!(cheaper.cheapest);
    assert!(!cheaper.picked);
    assert!(!cheaper.executed);
}

#[tokio::test]
async fn test_reconcile_all_contains_failures() {
    let backend: Arc<dyn Backend> = Arc::new(MockBackend::with_plan(hash_join_plan()));
    let reconciler = Reconciler::new(Arc::clone(&backend), true);
    let dispatcher = Dispatcher::new(settings());

    let good = dispatcher
        .dispatch(backend.as_ref(), "SELECT 1", Some(HASH_JOIN_HINT), None)
        .await
        .unwrap();
    // A hinted result with no plan document cannot be verified.
    let mut broken = good.clone();
    broken.plan = None;

    let reports = reconciler
        .reconcile_all(vec![
            (
                good,
                Intent {
                    query_id: "q1".to_string(),
                    sql: "SELECT 1".to_string(),
                    hint: Some(HASH_JOIN_HINT.to_string()),
                    ..Default::default()
                },
            ),
            (
                broken,
                Intent {
                    query_id: "q2".to_string(),
                    sql: "SELECT 1".to_string(),
                    hint: Some(HASH_JOIN_HINT.to_string()),
                    ..Default::default()
                },
            ),
        ])
        .await;

    assert_eq!(reports.len(), 2);
    assert!(reports[0].is_ok());
    assert!(matches!(reports[1], Err(ExecError::MissingPlan { .. })));
}
