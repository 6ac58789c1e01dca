//! Runtime: in-memory tables and recursive plan execution.
//!
//! Behavior:
//! - Tables are registered as whole `RowBatch`es with their schema.
//! - `execute` walks the plan bottom-up, instantiating one operator per node.
//! - Every operator emits columns in its node's schema order.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, trace};

use colplan_core::dag::{JoinLayout, LogicalPlan};
use colplan_core::engine::{ExecutionEngine, ScanProvider};
use colplan_core::error::{Error, Result};
use colplan_core::schema::Schema;
use colplan_core::types::{Column, RowBatch};

use crate::operators::{self as ops, Operator};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("column '{0}' not found in input")]
    MissingColumn(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("cannot cast {value} to {to}")]
    Cast { value: String, to: String },
    #[error("integer overflow in {0}")]
    Overflow(String),
    #[error("unsupported in execution: {0}")]
    Unsupported(String),
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl From<ExecError> for Error {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::UnknownTable(name) => Error::UnknownTable(name),
            other => Error::Execution(other.to_string()),
        }
    }
}

/// A registered table.
#[derive(Debug, Clone)]
pub struct MemTable {
    pub schema: Schema,
    pub batch: RowBatch,
}

/// Engine over tables held in memory.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: RwLock<HashMap<String, MemTable>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `batch` as `name`. Column names must match `schema` in order
    /// and every column must have the same length.
    pub fn register_table(
        &self,
        name: impl Into<String>,
        schema: Schema,
        batch: RowBatch,
    ) -> Result<()> {
        let name = name.into();
        let schema = Schema::try_new(schema.fields)?;
        if batch.column_names() != schema.names() {
            return Err(Error::Schema(format!(
                "table '{name}': columns [{}] do not match schema [{}]",
                batch.column_names().join(", "),
                schema.names().join(", ")
            )));
        }
        let rows = batch.num_rows();
        if let Some(bad) = batch.columns.iter().find(|c| c.len() != rows) {
            return Err(Error::Schema(format!(
                "table '{name}': column '{}' has {} rows, expected {rows}",
                bad.name,
                bad.len()
            )));
        }

        debug!(table = %name, rows, columns = schema.len(), "registered table");
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, MemTable { schema, batch });
        Ok(())
    }

    /// `Scan` node over a registered table.
    pub fn scan(&self, name: &str) -> Result<LogicalPlan> {
        Ok(LogicalPlan::Scan {
            source: name.to_string(),
            schema: self.schema_of(name)?,
        })
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn run(&self, plan: &LogicalPlan) -> Result<RowBatch> {
        use LogicalPlan::*;

        let (op, inputs): (Box<dyn Operator>, Vec<RowBatch>) = match plan {
            Scan { source, schema } => return Ok(self.scan_batch(source, schema)?),
            Project { input, exprs, .. } => (
                Box::new(ops::Project::new(exprs.clone())),
                vec![self.run(input)?],
            ),
            Filter { input, predicate } => (
                Box::new(ops::Filter::new(predicate.clone())),
                vec![self.run(input)?],
            ),
            Aggregate {
                input, keys, aggs, ..
            } => (
                Box::new(ops::Aggregate::new(keys.clone(), aggs.clone())),
                vec![self.run(input)?],
            ),
            Join {
                left,
                right,
                join_type,
                left_on,
                right_on,
                suffix,
                ..
            } => {
                let layout = JoinLayout::new(
                    left.schema(),
                    right.schema(),
                    left_on,
                    right_on,
                    *join_type,
                    suffix,
                )?;
                (
                    Box::new(ops::HashJoin::new(
                        *join_type,
                        left_on.clone(),
                        right_on.clone(),
                        layout,
                    )),
                    vec![self.run(left)?, self.run(right)?],
                )
            }
            Sort { input, keys } => (
                Box::new(ops::Sort::new(keys.clone())),
                vec![self.run(input)?],
            ),
            Limit { input, n } => (Box::new(ops::Limit::new(*n)), vec![self.run(input)?]),
        };

        let out = op.eval(&inputs)?;
        trace!(op = op.name(), rows = out.num_rows(), "operator finished");
        Ok(out)
    }

    /// Columns of `source` in the order of `schema`.
    fn scan_batch(&self, source: &str, schema: &Schema) -> std::result::Result<RowBatch, ExecError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .get(source)
            .ok_or_else(|| ExecError::UnknownTable(source.to_string()))?;
        let columns = schema
            .fields
            .iter()
            .map(|f| {
                table
                    .batch
                    .column(&f.name)
                    .cloned()
                    .ok_or_else(|| ExecError::MissingColumn(f.name.clone()))
            })
            .collect::<std::result::Result<Vec<Column>, _>>()?;
        trace!(source, rows = table.batch.num_rows(), "scan");
        Ok(RowBatch::new(columns))
    }
}

impl ScanProvider for MemoryEngine {
    fn schema_of(&self, source: &str) -> Result<Schema> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .map(|t| t.schema.clone())
            .ok_or_else(|| Error::UnknownTable(source.to_string()))
    }
}

impl ExecutionEngine for MemoryEngine {
    fn execute(&self, plan: &LogicalPlan) -> Result<RowBatch> {
        let batch = self.run(plan)?;
        debug!(
            root = plan.name(),
            rows = batch.num_rows(),
            columns = batch.columns.len(),
            "plan executed"
        );
        Ok(batch)
    }
}
