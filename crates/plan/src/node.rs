//! One node of a relational execution plan.

/// Base-relation reference carried by scan nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: String,
}

/// Operator-specific extras, selected by the operator family.
///
/// Absence is meaningful: a scan without a filter is `filter: None`,
/// never an empty string.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OperatorAttrs {
    #[default]
    None,
    Scan {
        /// Unary predicate applied at the scan.
        filter: Option<String>,
        /// Declared output columns of the scan.
        select_exprs: Option<Vec<String>>,
    },
    Aggregate {
        /// Top-level projection list; recorded only on full (non-partial)
        /// aggregates so partial stages do not duplicate it.
        select_exprs: Option<Vec<String>>,
    },
}

/// One node of an execution plan tree.
///
/// `children` order encodes join side / union order and is never
/// re-sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub operator: String,
    /// Planner-estimated cost, in backend-defined units.
    pub cost: f64,
    /// Observed wall-time contribution; present only for analyzed runs.
    pub actual_time_ms: Option<f64>,
    pub table: Option<TableRef>,
    pub children: Vec<PlanNode>,
    pub attrs: OperatorAttrs,
}

const JOIN_OPERATORS: [&str; 3] = ["Nested Loop", "Hash Join", "Merge Join"];

impl PlanNode {
    pub fn new(operator: impl Into<String>, cost: f64) -> Self {
        Self {
            operator: operator.into(),
            cost,
            actual_time_ms: None,
            table: None,
            children: Vec::new(),
            attrs: OperatorAttrs::None,
        }
    }

    pub fn is_scan(&self) -> bool {
        self.operator.contains("Scan")
    }

    pub fn is_join(&self) -> bool {
        JOIN_OPERATORS.contains(&self.operator.as_str())
    }

    /// Table aliases of the scan leaves under this node, left to right.
    ///
    /// A scan node is a leaf even when it has inner children (a bitmap
    /// heap scan drives an index probe for the same relation), so each
    /// physical relation is counted once.
    pub fn leaf_aliases(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaf_aliases(&mut out);
        out
    }

    fn collect_leaf_aliases<'a>(&'a self, out: &mut Vec<&'a str>) {
        if self.is_scan() {
            if let Some(table) = &self.table {
                out.push(table.alias.as_str());
            }
            return;
        }
        for child in &self.children {
            child.collect_leaf_aliases(out);
        }
    }

    /// Prunes the tree down to its scan/join skeleton.
    ///
    /// Non-scan/join interior nodes (aggregates, sorts, gathers,
    /// materializations) are spliced out and their surviving children
    /// promoted. Scans keep their inner children but stop the descent;
    /// a scan without a relation reference cannot take part in a join
    /// order and is dropped. Returns `None` when nothing survives or
    /// when pruning yields a forest (e.g. under a set operation), which
    /// has no single join order to canonicalize.
    pub fn scan_join_skeleton(&self) -> Option<PlanNode> {
        let mut roots = self.skeleton_nodes();
        if roots.len() == 1 {
            roots.pop()
        } else {
            None
        }
    }

    fn skeleton_nodes(&self) -> Vec<PlanNode> {
        if self.is_scan() {
            return if self.table.is_some() {
                vec![self.clone()]
            } else {
                Vec::new()
            };
        }
        let kept: Vec<PlanNode> = self
            .children
            .iter()
            .flat_map(|c| c.skeleton_nodes())
            .collect();
        if self.is_join() {
            let mut node = self.clone();
            node.children = kept;
            vec![node]
        } else {
            kept
        }
    }
}
