//! Human-readable plan rendering, one node per line, children indented.

use std::fmt::Write;

use colplan_core::dag::{JoinType, LogicalPlan};
use colplan_core::expr::{Expr, NamedExpr};

pub fn explain(plan: &LogicalPlan) -> String {
    let mut out = String::new();
    render(plan, 0, &mut out);
    out
}

fn render(plan: &LogicalPlan, depth: usize, out: &mut String) {
    use LogicalPlan::*;

    let pad = "  ".repeat(depth);
    // Writing into a String cannot fail.
    let _ = match plan {
        Scan { source, schema } => writeln!(out, "{pad}SCAN {source} {schema}"),
        Project { exprs, .. } => writeln!(out, "{pad}PROJECT [{}]", named_list(exprs)),
        Filter { predicate, .. } => writeln!(out, "{pad}FILTER {predicate}"),
        Aggregate { keys, aggs, .. } => writeln!(
            out,
            "{pad}AGGREGATE keys=[{}] aggs=[{}]",
            named_list(keys),
            named_list(aggs)
        ),
        Join {
            join_type,
            left_on,
            right_on,
            suffix,
            ..
        } => {
            let kind = match join_type {
                JoinType::Inner => "INNER",
                JoinType::Left => "LEFT",
            };
            let on: Vec<String> = left_on
                .iter()
                .zip(right_on)
                .map(|(l, r)| format!("{l} = {r}"))
                .collect();
            writeln!(out, "{pad}{kind} JOIN on=[{}] suffix=\"{suffix}\"", on.join(", "))
        }
        Sort { keys, .. } => {
            let keys: Vec<String> = keys
                .iter()
                .map(|k| {
                    format!(
                        "{} {}{}",
                        k.expr,
                        if k.descending { "DESC" } else { "ASC" },
                        if k.nulls_last { " NULLS LAST" } else { "" }
                    )
                })
                .collect();
            writeln!(out, "{pad}SORT [{}]", keys.join(", "))
        }
        Limit { n, .. } => writeln!(out, "{pad}LIMIT {n}"),
    };

    match plan {
        Scan { .. } => {}
        Project { input, .. }
        | Filter { input, .. }
        | Aggregate { input, .. }
        | Sort { input, .. }
        | Limit { input, .. } => render(input, depth + 1, out),
        Join { left, right, .. } => {
            render(left, depth + 1, out);
            render(right, depth + 1, out);
        }
    }
}

fn named_list(exprs: &[NamedExpr]) -> String {
    exprs
        .iter()
        .map(|e| match &e.expr {
            Expr::Column(name) if *name == e.name => name.clone(),
            other => format!("{} := {other}", e.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LogicalPlanBuilder;
    use colplan_core::expr::{col, lit};
    use colplan_core::schema::{DataType, Field, Schema};

    #[test]
    fn renders_tree() {
        let plan = LogicalPlanBuilder::scan(
            "t",
            Schema::new(vec![
                Field::new("a", DataType::Int64, true),
                Field::new("b", DataType::Int64, true),
            ]),
        )
        .and_then(|b| b.filter(col("a").gt(lit(1i64))))
        .and_then(|b| b.select([col("a"), (col("b") + lit(1i64)).alias("c")]))
        .map(|b| b.limit(3))
        .expect("plan")
        .build();

        let text = explain(&plan);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "LIMIT 3");
        assert_eq!(lines[1], "  PROJECT [a, c := [col(\"b\") + lit(1)]]");
        assert_eq!(lines[2], "    FILTER [col(\"a\") > lit(1)]");
        assert_eq!(lines[3], "      SCAN t [a: i64, b: i64]");
    }
}
