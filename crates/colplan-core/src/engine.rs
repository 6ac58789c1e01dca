//! Interfaces consumed by the planning layer.
//!
//! The planner only needs schemas from storage and hands fully resolved plans
//! to an engine; neither side inspects the other's internals.

use crate::dag::LogicalPlan;
use crate::error::Result;
use crate::schema::Schema;
use crate::types::RowBatch;

/// Supplies the baseline schema of a scan source (file, table, frame).
pub trait ScanProvider: Send + Sync {
    fn schema_of(&self, source: &str) -> Result<Schema>;
}

/// Executes a fully resolved logical plan.
pub trait ExecutionEngine: Send + Sync {
    fn execute(&self, plan: &LogicalPlan) -> Result<RowBatch>;
}
