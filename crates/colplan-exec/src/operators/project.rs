//! Project operator: one output column per named expression.

use colplan_core::expr::NamedExpr;
use colplan_core::types::{Column, RowBatch};

use super::{single_input, Operator};
use crate::eval::evaluate;
use crate::runtime::ExecError;

pub struct Project {
    pub exprs: Vec<NamedExpr>,
}

impl Project {
    pub fn new(exprs: Vec<NamedExpr>) -> Self {
        Self { exprs }
    }
}

impl Operator for Project {
    fn name(&self) -> &'static str {
        "project"
    }

    fn eval(&self, inputs: &[RowBatch]) -> Result<RowBatch, ExecError> {
        let input = single_input(self, inputs)?;
        let columns = self
            .exprs
            .iter()
            .map(|e| Ok(Column::new(e.name.clone(), evaluate(&e.expr, input)?)))
            .collect::<Result<Vec<_>, ExecError>>()?;
        Ok(RowBatch::new(columns))
    }
}
