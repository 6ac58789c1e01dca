#![forbid(unsafe_code)]
//! colplan: column selectors, struct expansion and SQL lowered into
//! resolved logical plans.
//!
//! This crate only re-exports the workspace members:
//! - `colplan_core`: schemas, expressions, plan nodes, errors, config
//! - `colplan_planner`: selector resolution and `LogicalPlanBuilder`
//! - `colplan_sql`: `SqlContext`, the table registry and the SQL translator
//! - `colplan_exec`: the in-memory reference engine

pub use colplan_core;
pub use colplan_exec;
pub use colplan_planner;
pub use colplan_sql;

pub use colplan_core::prelude;
pub use colplan_core::{Error, Result};
pub use colplan_exec::MemoryEngine;
pub use colplan_planner::LogicalPlanBuilder;
pub use colplan_sql::{NamedTableRegistry, SqlContext};
