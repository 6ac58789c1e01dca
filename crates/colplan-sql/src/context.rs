//! `SqlContext`: a table registry plus an engine to run translated plans.

use std::fmt;
use std::sync::Arc;

use colplan_core::config::PlannerConfig;
use colplan_core::dag::LogicalPlan;
use colplan_core::engine::ExecutionEngine;
use colplan_core::error::Result;
use colplan_core::types::RowBatch;
use colplan_planner::{explain, optimize};
use tracing::{debug, info};

use crate::registry::NamedTableRegistry;
use crate::translate::SqlTranslator;

pub struct SqlContext {
    registry: NamedTableRegistry,
    engine: Arc<dyn ExecutionEngine>,
    config: PlannerConfig,
}

impl fmt::Debug for SqlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlContext")
            .field("tables", &self.registry.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqlContext {
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            registry: NamedTableRegistry::new(),
            engine,
            config: PlannerConfig::default(),
        }
    }

    /// Use `config` for later translations; fails if it does not validate.
    pub fn with_config(mut self, config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn register(&self, name: impl Into<String>, plan: LogicalPlan) {
        self.registry.register(name, plan);
    }

    pub fn register_many<I, S>(&self, tables: I)
    where
        I: IntoIterator<Item = (S, LogicalPlan)>,
        S: Into<String>,
    {
        self.registry.register_many(tables);
    }

    pub fn unregister(&self, name: &str) -> Option<LogicalPlan> {
        self.registry.unregister(name)
    }

    /// Registered table names, sorted.
    pub fn tables(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn registry(&self) -> &NamedTableRegistry {
        &self.registry
    }

    /// Translate against a snapshot of the registry and optimize.
    pub fn translate(&self, sql: &str) -> Result<LogicalPlan> {
        let translator = SqlTranslator::new(self.registry.snapshot(), self.config.clone());
        let plan = optimize(translator.translate(sql)?, &self.config);
        debug!(fingerprint = ?plan.fingerprint().ok().map(|h| h.to_hex()), "optimized plan");
        Ok(plan)
    }

    /// Translate, optimize and execute.
    pub fn query(&self, sql: &str) -> Result<RowBatch> {
        let plan = self.translate(sql)?;
        let batch = self.engine.execute(&plan)?;
        info!(rows = batch.num_rows(), columns = batch.columns.len(), "query finished");
        Ok(batch)
    }

    /// Rendered optimized plan for `sql`.
    pub fn explain(&self, sql: &str) -> Result<String> {
        Ok(explain(&self.translate(sql)?))
    }
}
