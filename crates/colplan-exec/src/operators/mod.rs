//! Physical operators, one per logical node kind.
//!
//! Operators are synchronous and whole-batch: each receives its fully
//! materialized inputs and returns one `RowBatch`.

mod aggregate;
mod filter;
mod join;
mod limit;
mod project;
mod sort;

pub use aggregate::Aggregate;
pub use filter::Filter;
pub use join::HashJoin;
pub use limit::Limit;
pub use project::Project;
pub use sort::Sort;

use colplan_core::types::RowBatch;

use crate::runtime::ExecError;

pub trait Operator: Send + Sync {
    /// Stable operator name for tracing.
    fn name(&self) -> &'static str;

    /// Unary operators read `inputs[0]`; joins read `[left, right]`.
    fn eval(&self, inputs: &[RowBatch]) -> Result<RowBatch, ExecError>;
}

pub(crate) fn single_input<'a>(
    op: &dyn Operator,
    inputs: &'a [RowBatch],
) -> Result<&'a RowBatch, ExecError> {
    match inputs {
        [input] => Ok(input),
        _ => Err(ExecError::Invalid(format!(
            "{} expects one input, got {}",
            op.name(),
            inputs.len()
        ))),
    }
}
