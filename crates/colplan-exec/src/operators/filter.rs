//! Filter operator: keeps rows whose predicate is true (null drops the row).

use colplan_core::expr::Expr;
use colplan_core::types::{RowBatch, Scalar};

use super::{single_input, Operator};
use crate::eval::evaluate;
use crate::runtime::ExecError;

pub struct Filter {
    pub predicate: Expr,
}

impl Filter {
    pub fn new(predicate: Expr) -> Self {
        Self { predicate }
    }
}

impl Operator for Filter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn eval(&self, inputs: &[RowBatch]) -> Result<RowBatch, ExecError> {
        let input = single_input(self, inputs)?;
        let keep: Vec<usize> = evaluate(&self.predicate, input)?
            .iter()
            .enumerate()
            .filter(|(_, v)| matches!(v, Scalar::Bool(true)))
            .map(|(i, _)| i)
            .collect();
        Ok(input.take(&keep))
    }
}
