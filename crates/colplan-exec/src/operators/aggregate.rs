//! Hash aggregation.
//!
//! Groups appear in the order their first row appears in the input. Each
//! aggregate expression is reduced once per group; an expression without
//! any aggregate function collects the group's values into a list.

use std::collections::HashMap;

use colplan_core::expr::{is_aggregate_function, Expr, NamedExpr};
use colplan_core::types::{hash_key, scalar_cmp, scalar_key_eq, Column, RowBatch, Scalar};

use super::{single_input, Operator};
use crate::eval::{binary, cast, evaluate, field_index, scalar_function, struct_field, unary};
use crate::runtime::ExecError;

pub struct Aggregate {
    pub keys: Vec<NamedExpr>,
    pub aggs: Vec<NamedExpr>,
}

impl Aggregate {
    pub fn new(keys: Vec<NamedExpr>, aggs: Vec<NamedExpr>) -> Self {
        Self { keys, aggs }
    }

    /// Row indices of every group, in first-appearance order.
    fn groups(&self, key_values: &[Vec<Scalar>], rows: usize) -> Vec<Vec<usize>> {
        if self.keys.is_empty() {
            return vec![(0..rows).collect()];
        }
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
        for row in 0..rows {
            let key: Vec<&Scalar> = key_values.iter().map(|c| &c[row]).collect();
            let bucket = buckets.entry(hash_key(&key)).or_default();
            let found = bucket.iter().copied().find(|&g| {
                let first = groups[g][0];
                key_values
                    .iter()
                    .zip(key.iter())
                    .all(|(c, v)| scalar_key_eq(&c[first], v))
            });
            match found {
                Some(g) => groups[g].push(row),
                None => {
                    bucket.push(groups.len());
                    groups.push(vec![row]);
                }
            }
        }
        groups
    }
}

impl Operator for Aggregate {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn eval(&self, inputs: &[RowBatch]) -> Result<RowBatch, ExecError> {
        let input = single_input(self, inputs)?;
        let key_values = self
            .keys
            .iter()
            .map(|k| evaluate(&k.expr, input))
            .collect::<Result<Vec<_>, _>>()?;
        let groups = self.groups(&key_values, input.num_rows());

        let mut columns: Vec<Column> = self
            .keys
            .iter()
            .zip(key_values.iter())
            .map(|(k, values)| {
                Column::new(
                    k.name.clone(),
                    groups.iter().map(|g| values[g[0]].clone()).collect(),
                )
            })
            .collect();

        for agg in &self.aggs {
            let values = groups
                .iter()
                .map(|rows| {
                    let group = input.take(rows);
                    if agg.expr.contains_aggregate() {
                        aggregate_value(&agg.expr, &group)
                    } else {
                        Ok(Scalar::List(evaluate(&agg.expr, &group)?))
                    }
                })
                .collect::<Result<Vec<_>, ExecError>>()?;
            columns.push(Column::new(agg.name.clone(), values));
        }
        Ok(RowBatch::new(columns))
    }
}

/// Value of `expr` for one group. Column references outside an aggregate
/// take the group's first value.
fn aggregate_value(expr: &Expr, group: &RowBatch) -> Result<Scalar, ExecError> {
    match expr {
        Expr::Function {
            name,
            args,
            distinct,
        } if is_aggregate_function(name) => {
            let values = match args.first() {
                Some(arg) => Some(evaluate(arg, group)?),
                None => None,
            };
            reduce(name, values, *distinct, group.num_rows())
        }
        Expr::Column(name) => group
            .column(name)
            .map(|c| c.values.first().cloned().unwrap_or(Scalar::Null))
            .ok_or_else(|| ExecError::MissingColumn(name.clone())),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Alias(base, _) => aggregate_value(base, group),
        Expr::Cast(base, dt) => cast(&aggregate_value(base, group)?, dt),
        Expr::BinaryOp { left, op, right } => binary(
            *op,
            &aggregate_value(left, group)?,
            &aggregate_value(right, group)?,
        ),
        Expr::UnaryOp { op, expr } => unary(*op, &aggregate_value(expr, group)?),
        Expr::StructField(base, selectors) => {
            struct_field(&aggregate_value(base, group)?, field_index(selectors)?)
        }
        Expr::Struct(members) => Ok(Scalar::Struct(
            members
                .iter()
                .map(|m| aggregate_value(m, group))
                .collect::<Result<_, _>>()?,
        )),
        Expr::Function { name, args, .. } => {
            let args = args
                .iter()
                .map(|a| aggregate_value(a, group))
                .collect::<Result<Vec<_>, _>>()?;
            scalar_function(name, &args)
        }
        other => Err(ExecError::Unsupported(format!(
            "expression {other} in aggregation"
        ))),
    }
}

fn reduce(
    name: &str,
    values: Option<Vec<Scalar>>,
    distinct: bool,
    rows: usize,
) -> Result<Scalar, ExecError> {
    let Some(values) = values else {
        return match name {
            "count" => Ok(Scalar::I64(rows as i64)),
            other => Err(ExecError::Invalid(format!("'{other}' needs an argument"))),
        };
    };
    let values = if distinct {
        dedup(values.into_iter().filter(|v| !v.is_null()))
    } else {
        values
    };

    match name {
        "count" => Ok(Scalar::I64(
            values.iter().filter(|v| !v.is_null()).count() as i64,
        )),
        "n_unique" => Ok(Scalar::I64(dedup(values).len() as i64)),
        "sum" => sum(values.into_iter().filter(|v| !v.is_null()).collect()),
        "mean" => {
            let nums = values
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| {
                    v.as_f64()
                        .ok_or_else(|| ExecError::Type(format!("mean over non-numeric {v}")))
                })
                .collect::<Result<Vec<f64>, _>>()?;
            if nums.is_empty() {
                Ok(Scalar::Null)
            } else {
                Ok(Scalar::F64(nums.iter().sum::<f64>() / nums.len() as f64))
            }
        }
        "min" => Ok(values
            .into_iter()
            .filter(|v| !v.is_null())
            .min_by(scalar_cmp)
            .unwrap_or(Scalar::Null)),
        "max" => Ok(values
            .into_iter()
            .filter(|v| !v.is_null())
            .max_by(scalar_cmp)
            .unwrap_or(Scalar::Null)),
        "first" => Ok(values.into_iter().next().unwrap_or(Scalar::Null)),
        "last" => Ok(values.into_iter().last().unwrap_or(Scalar::Null)),
        other => Err(ExecError::Unsupported(format!("aggregate '{other}'"))),
    }
}

/// Distinct values, first occurrence kept.
fn dedup(values: impl IntoIterator<Item = Scalar>) -> Vec<Scalar> {
    let mut seen: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut out: Vec<Scalar> = Vec::new();
    for value in values {
        let bucket = seen.entry(hash_key(&[&value])).or_default();
        if bucket.iter().any(|&i| scalar_key_eq(&out[i], &value)) {
            continue;
        }
        bucket.push(out.len());
        out.push(value);
    }
    out
}

fn sum(values: Vec<Scalar>) -> Result<Scalar, ExecError> {
    if values.is_empty() {
        return Ok(Scalar::Null);
    }
    if values
        .iter()
        .all(|v| matches!(v, Scalar::I32(_) | Scalar::I64(_)))
    {
        let mut total: i64 = 0;
        for v in &values {
            let x = v.as_i64().unwrap_or_default();
            total = total
                .checked_add(x)
                .ok_or_else(|| ExecError::Overflow("sum".into()))?;
        }
        return Ok(Scalar::I64(total));
    }
    let nums = values
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| ExecError::Type(format!("sum over non-numeric {v}")))
        })
        .collect::<Result<Vec<f64>, _>>()?;
    let total: f64 = nums.iter().sum();
    if values.iter().all(|v| matches!(v, Scalar::F32(_))) {
        Ok(Scalar::F32(total as f32))
    } else {
        Ok(Scalar::F64(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colplan_core::expr::{col, count_star, lit};

    fn input() -> RowBatch {
        let s = |v: &str| Scalar::Str(v.into());
        RowBatch::new(vec![
            Column::new("g", vec![s("b"), s("a"), s("b"), s("a"), s("c")]),
            Column::new(
                "x",
                vec![
                    Scalar::I64(1),
                    Scalar::I64(2),
                    Scalar::Null,
                    Scalar::I64(2),
                    Scalar::Null,
                ],
            ),
        ])
    }

    fn named(name: &str, expr: Expr) -> NamedExpr {
        NamedExpr::new(name, expr)
    }

    #[test]
    fn groups_in_first_appearance_order() {
        let op = Aggregate::new(
            vec![NamedExpr::column("g")],
            vec![
                named("n", count_star()),
                named("cnt", col("x").count()),
                named("s", col("x").sum()),
                named("d", col("x").count_distinct()),
            ],
        );
        let out = op.eval(&[input()]).expect("aggregate");
        let s = |v: &str| Scalar::Str(v.into());
        assert_eq!(out.columns[0].values, vec![s("b"), s("a"), s("c")]);
        assert_eq!(
            out.columns[1].values,
            vec![Scalar::I64(2), Scalar::I64(2), Scalar::I64(1)]
        );
        assert_eq!(
            out.columns[2].values,
            vec![Scalar::I64(1), Scalar::I64(2), Scalar::I64(0)]
        );
        assert_eq!(
            out.columns[3].values,
            vec![Scalar::I64(1), Scalar::I64(4), Scalar::Null]
        );
        assert_eq!(
            out.columns[4].values,
            vec![Scalar::I64(1), Scalar::I64(1), Scalar::I64(0)]
        );
    }

    #[test]
    fn global_aggregate_over_empty_input() {
        let empty = input().slice(0, 0);
        let op = Aggregate::new(
            vec![],
            vec![named("n", count_star()), named("m", col("x").max())],
        );
        let out = op.eval(&[empty]).expect("aggregate");
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.row(0), vec![Scalar::I64(0), Scalar::Null]);
    }

    #[test]
    fn expressions_over_aggregates_and_implicit_lists() {
        let op = Aggregate::new(
            vec![NamedExpr::column("g")],
            vec![
                named("m", col("x").mean() + lit(1i64)),
                named("x", col("x")),
            ],
        );
        let out = op.eval(&[input()]).expect("aggregate");
        assert_eq!(out.columns[1].values[1], Scalar::F64(3.0));
        assert_eq!(
            out.columns[2].values[0],
            Scalar::List(vec![Scalar::I64(1), Scalar::Null])
        );
    }
}
