use colplan_core::types::RowBatch;

use super::{single_input, Operator};
use crate::runtime::ExecError;

/// First `n` rows.
pub struct Limit {
    pub n: usize,
}

impl Limit {
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl Operator for Limit {
    fn name(&self) -> &'static str {
        "limit"
    }

    fn eval(&self, inputs: &[RowBatch]) -> Result<RowBatch, ExecError> {
        Ok(single_input(self, inputs)?.slice(0, self.n))
    }
}
