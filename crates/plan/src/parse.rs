//! Recursive-descent parser over a backend's execution-plan output.
//!
//! The input is the self-describing nested record Postgres emits for
//! `EXPLAIN (FORMAT JSON)`: fields `Node Type`, `Total Cost`,
//! `Actual Total Time`, `Relation Name`/`Alias`, `Filter`, `Output`,
//! `Partial Mode` and `Plans`. Operator tags are normalized and
//! relation identity is backfilled at parse time so downstream
//! consumers stay free of backend-specific special cases.

use serde_json::Value;

use crate::error::PlanError;
use crate::node::{OperatorAttrs, PlanNode, TableRef};

/// Parses a plan document into a [`PlanNode`] tree.
///
/// Accepts the bare node record, the `{"Plan": ...}` wrapper, or the
/// one-element array Postgres returns for `EXPLAIN (FORMAT JSON)`.
pub fn parse_plan(raw: &Value) -> Result<PlanNode, PlanError> {
    parse_node(plan_record(raw))
}

/// Reads the top-level `Execution Time` (ms) of an analyzed plan
/// document, the backend profiler's own measurement.
pub fn execution_time_ms(raw: &Value) -> Option<f64> {
    unwrap_array(raw).get("Execution Time").and_then(Value::as_f64)
}

fn unwrap_array(raw: &Value) -> &Value {
    match raw {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

fn plan_record(raw: &Value) -> &Value {
    let doc = unwrap_array(raw);
    doc.get("Plan").unwrap_or(doc)
}

fn parse_node(record: &Value) -> Result<PlanNode, PlanError> {
    let operator = record
        .get("Node Type")
        .and_then(Value::as_str)
        .ok_or_else(|| PlanError::MalformedPlan {
            field: "Node Type",
            context: summarize(record),
        })?;
    let cost = record
        .get("Total Cost")
        .and_then(Value::as_f64)
        .ok_or_else(|| PlanError::MalformedPlan {
            field: "Total Cost",
            context: format!("on operator '{operator}'"),
        })?;

    let mut node = PlanNode::new(operator, cost);
    // Only available if the query was actually executed, not merely planned.
    node.actual_time_ms = record.get("Actual Total Time").and_then(Value::as_f64);

    if let Some(relation) = record.get("Relation Name").and_then(Value::as_str) {
        let alias = record
            .get("Alias")
            .and_then(Value::as_str)
            .unwrap_or(relation);
        node.table = Some(TableRef {
            name: relation.to_string(),
            alias: alias.to_string(),
        });
    }

    if node.operator == "Aggregate" {
        let mode = record
            .get("Partial Mode")
            .and_then(Value::as_str)
            .unwrap_or("Simple");
        if mode.contains("Partial") {
            // Fold the two-phase mode into the operator tag itself so
            // downstream logic never inspects a separate field. Partial
            // stages do not duplicate the top-level projection.
            node.operator = "PartialAggregate".to_string();
            node.attrs = OperatorAttrs::Aggregate { select_exprs: None };
        } else {
            node.attrs = OperatorAttrs::Aggregate {
                select_exprs: output_list(record),
            };
        }
    }

    if let Some(filter) = record.get("Filter").and_then(Value::as_str) {
        // A unary predicate only makes sense on a scan over a base
        // relation; anything else is a plan shape we do not understand.
        if !node.is_scan() || node.table.is_none() {
            let message = format!(
                "'Filter' on operator '{}' without a scanned relation",
                node.operator
            );
            tracing::warn!(operator = %node.operator, "{message}");
            return Err(PlanError::InvariantViolation { message });
        }
        node.attrs = OperatorAttrs::Scan {
            filter: Some(filter.to_string()),
            select_exprs: output_list(record),
        };
    } else if node.is_scan() {
        node.attrs = OperatorAttrs::Scan {
            filter: None,
            select_exprs: output_list(record),
        };
    }

    if let Some(children) = record.get("Plans").and_then(Value::as_array) {
        // Child order is load-bearing (join side); never re-sort.
        for child in children {
            node.children.push(parse_node(child)?);
        }
    }

    // Composite scans report the relation only on the outer node; the
    // inner index probe belongs to the same physical scan.
    if node.operator == "Bitmap Heap Scan" {
        let table = node.table.clone();
        for child in &mut node.children {
            if child.operator == "Bitmap Index Scan" && child.table.is_none() {
                child.table = table.clone();
            }
        }
    }

    Ok(node)
}

fn output_list(record: &Value) -> Option<Vec<String>> {
    record.get("Output").and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

fn summarize(record: &Value) -> String {
    let keys: Vec<&str> = record
        .as_object()
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();
    format!("record with keys {keys:?}")
}
