#![forbid(unsafe_code)]
//! colplan-planner: expressions → resolved logical plans.
//!
//! Design:
//! - Plan nodes are the `colplan-core::dag::LogicalPlan` enum.
//! - This crate adds:
//!     * the selector resolver (wildcards, regex, dtype sets, exclusions,
//!       struct field expansion, aggregation-context key skipping)
//!     * `LogicalPlanBuilder`, which resolves eagerly and caches schemas
//!     * optimization rules (projection pushdown)
//!     * a text renderer for plans
//!
//! No data is touched here; execution lives in `colplan-exec`.

pub mod builder;
pub mod explain;
pub mod resolve;
pub mod rules;

pub use builder::{GroupBy, LogicalPlanBuilder};
pub use explain::explain;
pub use resolve::{resolve, resolve_all, resolve_single, ResolutionContext, ResolutionMode, Resolved};
pub use rules::optimize;
