//! Logical plan nodes.
//!
//! Nodes are built by `colplan-planner::LogicalPlanBuilder`, which resolves
//! every expression against the input schema before the node exists. A node
//! therefore always carries bound expressions and its cached output schema;
//! `Filter`, `Sort` and `Limit` pass their input schema through.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::{Expr, NamedExpr};
use crate::hash::{hash_serde, Hash256};
use crate::schema::{Field, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub expr: Expr,
    pub descending: bool,
    pub nulls_last: bool,
}

impl SortKey {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            descending: false,
            nulls_last: false,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            descending: true,
            nulls_last: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalPlan {
    Scan {
        source: String,
        schema: Schema,
    },
    Project {
        input: Box<LogicalPlan>,
        exprs: Vec<NamedExpr>,
        schema: Schema,
    },
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },
    Aggregate {
        input: Box<LogicalPlan>,
        keys: Vec<NamedExpr>,
        aggs: Vec<NamedExpr>,
        schema: Schema,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        left_on: Vec<Expr>,
        right_on: Vec<Expr>,
        suffix: String,
        schema: Schema,
    },
    Sort {
        input: Box<LogicalPlan>,
        keys: Vec<SortKey>,
    },
    Limit {
        input: Box<LogicalPlan>,
        n: usize,
    },
}

impl LogicalPlan {
    /// Cached output schema of this node.
    pub fn schema(&self) -> &Schema {
        use LogicalPlan::*;
        match self {
            Scan { schema, .. }
            | Project { schema, .. }
            | Aggregate { schema, .. }
            | Join { schema, .. } => schema,
            Filter { input, .. } | Sort { input, .. } | Limit { input, .. } => input.schema(),
        }
    }

    /// Returns the number of inputs for this node.
    pub fn inputs(&self) -> usize {
        use LogicalPlan::*;
        match self {
            Scan { .. } => 0,
            Project { .. } | Filter { .. } | Aggregate { .. } | Sort { .. } | Limit { .. } => 1,
            Join { .. } => 2,
        }
    }

    /// Short node label used by plan display and tracing.
    pub fn name(&self) -> &'static str {
        use LogicalPlan::*;
        match self {
            Scan { .. } => "scan",
            Project { .. } => "project",
            Filter { .. } => "filter",
            Aggregate { .. } => "aggregate",
            Join { .. } => "join",
            Sort { .. } => "sort",
            Limit { .. } => "limit",
        }
    }

    /// Stable content hash of the plan (structure, expressions, schemas).
    pub fn fingerprint(&self) -> Result<Hash256> {
        hash_serde(self)
    }
}

/// How a join lays out its output columns.
///
/// Left columns come first, unchanged. Right columns follow in order, except
/// that an INNER join coalesces a right key column into the left key of the
/// same name and omits it. Differently-named keys and LEFT-join keys keep
/// their own right column. A right column whose name is already taken
/// gets `suffix` appended until it is unique; collisions never fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLayout {
    /// `(index into right schema, output name)` for every emitted right column.
    pub right_columns: Vec<(usize, String)>,
    /// Right key column name → left key column name, for coalesced keys.
    pub coalesced: Vec<(String, String)>,
    pub schema: Schema,
}

impl JoinLayout {
    pub fn new(
        left: &Schema,
        right: &Schema,
        left_on: &[Expr],
        right_on: &[Expr],
        join_type: JoinType,
        suffix: &str,
    ) -> Result<Self> {
        if suffix.is_empty() {
            return Err(Error::Config("join suffix must not be empty".into()));
        }
        let mut coalesced: Vec<(String, String)> = Vec::new();
        if join_type == JoinType::Inner {
            for (l, r) in left_on.iter().zip(right_on.iter()) {
                if let (Expr::Column(lname), Expr::Column(rname)) = (l, r) {
                    if lname == rname && !coalesced.iter().any(|(rn, _)| rn == rname) {
                        coalesced.push((rname.clone(), lname.clone()));
                    }
                }
            }
        }

        let mut fields: Vec<Field> = left.fields.clone();
        let mut right_columns = Vec::new();
        for (idx, field) in right.fields.iter().enumerate() {
            if coalesced.iter().any(|(rn, _)| *rn == field.name) {
                continue;
            }
            let mut name = field.name.clone();
            while fields.iter().any(|f| f.name == name) {
                name.push_str(suffix);
            }
            fields.push(field.with_name(name.clone()));
            right_columns.push((idx, name));
        }

        Ok(Self {
            right_columns,
            coalesced,
            schema: Schema::try_new(fields)?,
        })
    }

    /// Output name of right-side column `name`, if it is emitted or coalesced.
    pub fn right_output_name(&self, right: &Schema, name: &str) -> Option<String> {
        if let Some((_, left)) = self.coalesced.iter().find(|(r, _)| r == name) {
            return Some(left.clone());
        }
        let idx = right.index_of(name)?;
        self.right_columns
            .iter()
            .find(|(i, _)| *i == idx)
            .map(|(_, out)| out.clone())
    }
}
