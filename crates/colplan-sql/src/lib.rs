#![forbid(unsafe_code)]
//! colplan-sql: SQL text → resolved `LogicalPlan`.
//!
//! Design:
//! - `sqlparser` (generic dialect) produces the AST; only single `SELECT`
//!   queries are translated, anything else is `Error::Unsupported`.
//! - SQL expressions are lowered to colplan `Expr`s and planned through
//!   `LogicalPlanBuilder`, so SQL and the expression API share one resolver.
//! - Tables live in a `NamedTableRegistry`; each translation reads one
//!   immutable snapshot of it.
//! - `SqlContext` adds an `ExecutionEngine` for `query` and `explain`.

mod error;

pub mod context;
pub mod registry;
pub mod translate;

pub use context::SqlContext;
pub use registry::{NamedTableRegistry, RegistrySnapshot};
pub use translate::{translate, SqlTranslator};
