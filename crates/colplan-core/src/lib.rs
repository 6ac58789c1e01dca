#![forbid(unsafe_code)]
//! colplan-core: schemas, expression trees, logical plan nodes, row-batch
//! placeholders, errors, and configuration shared by every colplan crate.
//!
//! Pure data and small helpers only; resolution lives in `colplan-planner`
//! and SQL lowering in `colplan-sql`.

pub mod config;
pub mod dag;
pub mod engine;
pub mod error;
pub mod expr;
pub mod hash;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
