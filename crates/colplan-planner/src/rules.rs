//! Optimization rules over resolved logical plans.
//!
//! Rules never change any node's output schema or column order; they only
//! insert or rewrite nodes beneath it.

use colplan_core::config::PlannerConfig;
use colplan_core::dag::LogicalPlan;
use colplan_core::expr::{Expr, NamedExpr};
use colplan_core::schema::Schema;
use tracing::debug;

/// Apply the rules enabled in `config`.
pub fn optimize(plan: LogicalPlan, config: &PlannerConfig) -> LogicalPlan {
    if !config.projection_pushdown {
        return plan;
    }
    let required: Vec<String> = plan.schema().names().iter().map(|s| s.to_string()).collect();
    projection_pushdown(plan, &required)
}

/// Prune scan columns no ancestor reads.
///
/// `required` lists the output columns of `plan` that its ancestors use. A
/// pruning `Project` is inserted directly above each `Scan` that produces
/// more than that; nothing is pushed below a `Join`, whose sides keep their
/// full schemas so the join layout stays valid.
fn projection_pushdown(plan: LogicalPlan, required: &[String]) -> LogicalPlan {
    use LogicalPlan::*;

    match plan {
        Scan { source, schema } => prune_scan(source, schema, required),
        Project {
            input,
            exprs,
            schema,
        } => {
            let needed = union_refs(&[], exprs.iter().map(|e| &e.expr));
            Project {
                input: Box::new(projection_pushdown(*input, &needed)),
                exprs,
                schema,
            }
        }
        Filter { input, predicate } => {
            let needed = union_refs(required, std::iter::once(&predicate));
            Filter {
                input: Box::new(projection_pushdown(*input, &needed)),
                predicate,
            }
        }
        Aggregate {
            input,
            keys,
            aggs,
            schema,
        } => {
            let needed = union_refs(&[], keys.iter().chain(aggs.iter()).map(|e| &e.expr));
            Aggregate {
                input: Box::new(projection_pushdown(*input, &needed)),
                keys,
                aggs,
                schema,
            }
        }
        Join {
            left,
            right,
            join_type,
            left_on,
            right_on,
            suffix,
            schema,
        } => {
            let left_all = all_names(left.schema());
            let right_all = all_names(right.schema());
            Join {
                left: Box::new(projection_pushdown(*left, &left_all)),
                right: Box::new(projection_pushdown(*right, &right_all)),
                join_type,
                left_on,
                right_on,
                suffix,
                schema,
            }
        }
        Sort { input, keys } => {
            let needed = union_refs(required, keys.iter().map(|k| &k.expr));
            Sort {
                input: Box::new(projection_pushdown(*input, &needed)),
                keys,
            }
        }
        Limit { input, n } => Limit {
            input: Box::new(projection_pushdown(*input, required)),
            n,
        },
    }
}

fn prune_scan(source: String, schema: Schema, required: &[String]) -> LogicalPlan {
    let mut kept: Vec<_> = schema
        .fields
        .iter()
        .filter(|f| required.contains(&f.name))
        .cloned()
        .collect();
    // Row counts live in the columns; keep one even when nothing is read.
    if kept.is_empty() {
        kept.extend(schema.fields.first().cloned());
    }
    if kept.len() == schema.len() {
        return LogicalPlan::Scan { source, schema };
    }

    debug!(
        source = %source,
        kept = kept.len(),
        total = schema.len(),
        "pruned scan columns"
    );
    let exprs = kept.iter().map(|f| NamedExpr::column(f.name.clone())).collect();
    LogicalPlan::Project {
        input: Box::new(LogicalPlan::Scan { source, schema }),
        exprs,
        schema: Schema::new(kept),
    }
}

fn union_refs<'a>(
    base: &[String],
    exprs: impl Iterator<Item = &'a Expr>,
) -> Vec<String> {
    let mut out = base.to_vec();
    for expr in exprs {
        for name in expr.column_refs() {
            if !out.contains(&name) {
                out.push(name);
            }
        }
    }
    out
}

fn all_names(schema: &Schema) -> Vec<String> {
    schema.fields.iter().map(|f| f.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LogicalPlanBuilder;
    use colplan_core::dag::JoinType;
    use colplan_core::expr::{col, lit};
    use colplan_core::schema::{DataType, Field};

    fn wide() -> LogicalPlanBuilder {
        LogicalPlanBuilder::scan(
            "t",
            Schema::new(vec![
                Field::new("a", DataType::Int64, true),
                Field::new("b", DataType::Int64, true),
                Field::new("c", DataType::Utf8, true),
                Field::new("d", DataType::Float64, true),
            ]),
        )
        .expect("scan")
    }

    fn scan_input_names(plan: &LogicalPlan) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        collect(plan, &mut out);
        out
    }

    fn collect(plan: &LogicalPlan, out: &mut Vec<Vec<String>>) {
        use LogicalPlan::*;
        match plan {
            Project { input, schema, .. } if matches!(**input, Scan { .. }) => {
                out.push(all_names(schema));
            }
            Scan { schema, .. } => out.push(all_names(schema)),
            Project { input, .. }
            | Filter { input, .. }
            | Aggregate { input, .. }
            | Sort { input, .. }
            | Limit { input, .. } => collect(input, out),
            Join { left, right, .. } => {
                collect(left, out);
                collect(right, out);
            }
        }
    }

    #[test]
    fn prunes_scan_to_referenced_columns() {
        let plan = wide()
            .filter(col("b").gt(lit(1i64)))
            .and_then(|b| b.select([col("a")]))
            .expect("plan")
            .build();
        let before = plan.schema().clone();
        let optimized = optimize(plan, &PlannerConfig::default());
        assert_eq!(optimized.schema(), &before);
        assert_eq!(scan_input_names(&optimized), vec![vec!["a", "b"]]);
    }

    #[test]
    fn disabled_pushdown_is_identity() {
        let plan = wide().select([col("a")]).expect("plan").build();
        let cfg = PlannerConfig::default().with_projection_pushdown(false);
        assert_eq!(optimize(plan.clone(), &cfg), plan);
    }

    #[test]
    fn join_sides_keep_full_schema() {
        let right = wide().build();
        let plan = wide()
            .join(right, vec![col("a")], vec![col("a")], JoinType::Inner)
            .and_then(|b| b.select([col("b")]))
            .expect("plan")
            .build();
        let optimized = optimize(plan.clone(), &PlannerConfig::default());
        assert_eq!(optimized, plan);
    }

    #[test]
    fn count_only_keeps_one_column() {
        let plan = wide()
            .select([colplan_core::expr::count_star()])
            .expect("plan")
            .build();
        let optimized = optimize(plan, &PlannerConfig::default());
        assert_eq!(scan_input_names(&optimized), vec![vec!["a"]]);
    }
}
