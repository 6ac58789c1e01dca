#![forbid(unsafe_code)]
//! colplan-exec: reference in-memory engine for colplan logical plans.
//!
//! Design:
//! - `MemoryEngine` holds registered tables and implements both
//!   `ScanProvider` (schemas for planning) and `ExecutionEngine`.
//! - Plans run bottom-up; each node becomes one whole-batch `Operator`.
//! - Expression evaluation is row-wise over `Scalar`s with SQL null
//!   semantics.

pub mod eval;
pub mod operators;
pub mod runtime;

pub use runtime::{ExecError, MemTable, MemoryEngine};
