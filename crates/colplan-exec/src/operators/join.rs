//! Equi hash join.
//!
//! Output order:
//! - inner: right rows in input order, each followed by its matching left
//!   rows in left order;
//! - left: left rows in input order, each followed by its matching right
//!   rows in right order, unmatched rows padded with nulls.
//!
//! A key containing null never matches.

use std::collections::HashMap;

use colplan_core::dag::{JoinLayout, JoinType};
use colplan_core::expr::Expr;
use colplan_core::types::{hash_key, scalar_key_eq, Column, RowBatch, Scalar};

use super::Operator;
use crate::eval::evaluate;
use crate::runtime::ExecError;

pub struct HashJoin {
    pub join_type: JoinType,
    pub left_on: Vec<Expr>,
    pub right_on: Vec<Expr>,
    pub layout: JoinLayout,
}

impl HashJoin {
    pub fn new(
        join_type: JoinType,
        left_on: Vec<Expr>,
        right_on: Vec<Expr>,
        layout: JoinLayout,
    ) -> Self {
        Self {
            join_type,
            left_on,
            right_on,
            layout,
        }
    }
}

struct KeyTable<'a> {
    keys: &'a [Vec<Scalar>],
    buckets: HashMap<u64, Vec<usize>>,
}

impl<'a> KeyTable<'a> {
    fn build(keys: &'a [Vec<Scalar>], rows: usize) -> Self {
        let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
        for row in 0..rows {
            if let Some(hash) = row_hash(keys, row) {
                buckets.entry(hash).or_default().push(row);
            }
        }
        Self { keys, buckets }
    }

    /// Build-side rows matching row `row` of `lookup`, in build order.
    fn matches(&self, lookup: &[Vec<Scalar>], row: usize) -> Vec<usize> {
        let Some(hash) = row_hash(lookup, row) else {
            return Vec::new();
        };
        self.buckets
            .get(&hash)
            .map(|rows| {
                rows.iter()
                    .copied()
                    .filter(|&b| {
                        self.keys
                            .iter()
                            .zip(lookup.iter())
                            .all(|(bk, pk)| scalar_key_eq(&bk[b], &pk[row]))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn row_hash(keys: &[Vec<Scalar>], row: usize) -> Option<u64> {
    let key: Vec<&Scalar> = keys.iter().map(|c| &c[row]).collect();
    if key.iter().any(|v| v.is_null()) {
        return None;
    }
    Some(hash_key(&key))
}

fn eval_keys(exprs: &[Expr], batch: &RowBatch) -> Result<Vec<Vec<Scalar>>, ExecError> {
    exprs.iter().map(|e| evaluate(e, batch)).collect()
}

impl Operator for HashJoin {
    fn name(&self) -> &'static str {
        "hash_join"
    }

    fn eval(&self, inputs: &[RowBatch]) -> Result<RowBatch, ExecError> {
        let [left, right] = inputs else {
            return Err(ExecError::Invalid(format!(
                "hash_join expects two inputs, got {}",
                inputs.len()
            )));
        };
        if self.left_on.len() != self.right_on.len() {
            return Err(ExecError::Invalid("join key lists differ in length".into()));
        }
        let left_keys = eval_keys(&self.left_on, left)?;
        let right_keys = eval_keys(&self.right_on, right)?;

        // (left row, right row); `None` pads with nulls.
        let mut pairs: Vec<(usize, Option<usize>)> = Vec::new();
        match self.join_type {
            JoinType::Inner => {
                let table = KeyTable::build(&left_keys, left.num_rows());
                for r in 0..right.num_rows() {
                    pairs.extend(table.matches(&right_keys, r).into_iter().map(|l| (l, Some(r))));
                }
            }
            JoinType::Left => {
                let table = KeyTable::build(&right_keys, right.num_rows());
                for l in 0..left.num_rows() {
                    let found = table.matches(&left_keys, l);
                    if found.is_empty() {
                        pairs.push((l, None));
                    } else {
                        pairs.extend(found.into_iter().map(|r| (l, Some(r))));
                    }
                }
            }
        }

        let left_rows: Vec<usize> = pairs.iter().map(|(l, _)| *l).collect();
        let mut columns = left.take(&left_rows).columns;
        for (idx, name) in &self.layout.right_columns {
            let source = right.columns.get(*idx).ok_or_else(|| {
                ExecError::Invalid(format!("right input has no column at position {idx}"))
            })?;
            let values = pairs
                .iter()
                .map(|(_, r)| match r {
                    Some(r) => source.values[*r].clone(),
                    None => Scalar::Null,
                })
                .collect();
            columns.push(Column::new(name.clone(), values));
        }
        Ok(RowBatch::new(columns))
    }
}
