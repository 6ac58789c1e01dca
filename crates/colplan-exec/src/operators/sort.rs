//! Sort operator: stable multi-key ordering.

use colplan_core::dag::SortKey;
use colplan_core::types::{sort_permutation, RowBatch, SortOptions};

use super::{single_input, Operator};
use crate::eval::evaluate;
use crate::runtime::ExecError;

pub struct Sort {
    pub keys: Vec<SortKey>,
}

impl Sort {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }
}

impl Operator for Sort {
    fn name(&self) -> &'static str {
        "sort"
    }

    fn eval(&self, inputs: &[RowBatch]) -> Result<RowBatch, ExecError> {
        let input = single_input(self, inputs)?;
        if self.keys.is_empty() {
            return Ok(input.clone());
        }
        let keys = self
            .keys
            .iter()
            .map(|k| {
                Ok((
                    evaluate(&k.expr, input)?,
                    SortOptions {
                        descending: k.descending,
                        nulls_last: k.nulls_last,
                    },
                ))
            })
            .collect::<Result<Vec<_>, ExecError>>()?;
        Ok(input.take(&sort_permutation(&keys)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colplan_core::expr::col;
    use colplan_core::types::{Column, Scalar};

    #[test]
    fn descending_with_nulls_last() {
        let input = RowBatch::new(vec![Column::new(
            "x",
            vec![Scalar::I64(1), Scalar::Null, Scalar::I64(3)],
        )]);
        let key = SortKey {
            expr: col("x"),
            descending: true,
            nulls_last: true,
        };
        let out = Sort::new(vec![key]).eval(&[input]).expect("sort");
        assert_eq!(
            out.columns[0].values,
            vec![Scalar::I64(3), Scalar::I64(1), Scalar::Null]
        );
    }
}
