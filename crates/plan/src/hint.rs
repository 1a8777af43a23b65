//! Canonical hint strings.
//!
//! A hint string is a deterministic, byte-stable serialization of a
//! plan tree in pg_hint_plan vocabulary. It is used twice per query:
//! once to *request* a forced plan (prepended to the SQL as a comment
//! by the backend adapter) and once to *verify* the plan that actually
//! executed, by re-canonicalizing the executed tree and comparing
//! strings.
//!
//! Two modes:
//!
//! - `with_physical = false`: only the logical shape is encoded
//!   (relation set + join tree topology via `Leading`). Two plans that
//!   differ only in physical operator choice canonicalize identically,
//!   expressing "any plan with this join order is acceptable".
//! - `with_physical = true`: the concrete scan and join algorithms are
//!   encoded too, for byte-exact executed-vs-intended comparison.

use crate::node::PlanNode;

/// Serializes a plan tree into its canonical hint string.
///
/// Total and deterministic: a well-formed tree always canonicalizes,
/// and equal trees (under the mode) yield equal strings. A tree whose
/// scan/join skeleton is empty yields the empty string.
pub fn hint_str(root: &PlanNode, with_physical: bool) -> String {
    let Some(skeleton) = root.scan_join_skeleton() else {
        return String::new();
    };

    let mut parts: Vec<String> = Vec::new();
    if with_physical {
        collect_scan_hints(&skeleton, &mut parts);
        collect_join_hints(&skeleton, &mut parts);
    }
    parts.push(format!("Leading({})", join_order(&skeleton)));

    format!("/*+ {} */", parts.join(" "))
}

/// Depth-first parenthesized join order over table aliases.
fn join_order(node: &PlanNode) -> String {
    if node.is_scan() {
        return node
            .table
            .as_ref()
            .map(|t| t.alias.clone())
            .unwrap_or_default();
    }
    let inner: Vec<String> = node.children.iter().map(join_order).collect();
    format!("({})", inner.join(" "))
}

/// One scan hint per leaf, in leaf order. Scans are leaves here even
/// when they drive inner probes, so a bitmap pair emits one hint.
fn collect_scan_hints(node: &PlanNode, out: &mut Vec<String>) {
    if node.is_scan() {
        if let Some(table) = &node.table {
            out.push(format!("{}({})", scan_hint_name(&node.operator), table.alias));
        }
        return;
    }
    for child in &node.children {
        collect_scan_hints(child, out);
    }
}

/// One join hint per join node, post-order, listing the leaf aliases
/// beneath it.
fn collect_join_hints(node: &PlanNode, out: &mut Vec<String>) {
    if node.is_scan() {
        return;
    }
    for child in &node.children {
        collect_join_hints(child, out);
    }
    if node.is_join() {
        let aliases = node.leaf_aliases().join(" ");
        out.push(format!("{}({})", join_hint_name(&node.operator), aliases));
    }
}

fn scan_hint_name(operator: &str) -> String {
    match operator {
        "Seq Scan" => "SeqScan".to_string(),
        "Index Scan" => "IndexScan".to_string(),
        "Index Only Scan" => "IndexOnlyScan".to_string(),
        "Bitmap Heap Scan" => "BitmapScan".to_string(),
        "Tid Scan" => "TidScan".to_string(),
        other => other.replace(' ', ""),
    }
}

fn join_hint_name(operator: &str) -> String {
    match operator {
        "Hash Join" => "HashJoin".to_string(),
        "Merge Join" => "MergeJoin".to_string(),
        "Nested Loop" => "NestLoop".to_string(),
        other => other.replace(' ', ""),
    }
}
