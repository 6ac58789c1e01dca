//! Convenient re-exports for downstream crates.

pub use crate::config::PlannerConfig;
pub use crate::dag::{JoinLayout, JoinType, LogicalPlan, SortKey};
pub use crate::engine::{ExecutionEngine, ScanProvider};
pub use crate::error::{Error, Result};
pub use crate::expr::{
    all, col, cols, count_star, dtype_col, dtype_cols, exclude, field, lit, struct_, Exclusion,
    Expr, FieldSelector, NamedExpr, Operator, RenameOp, UnaryOperator,
};
pub use crate::schema::{DataType, Field, Schema, TypeClass, NUMERIC_TYPES};
pub use crate::types::{Column, RowBatch, Scalar};
