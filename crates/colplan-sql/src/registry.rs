//! Named-table registry shared between SQL contexts and translations.
//!
//! The map is copy-on-write: writers swap in a new `Arc<HashMap>` under the
//! write lock, readers clone the `Arc` under the read lock. A translation
//! holds one snapshot for its whole run.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use colplan_core::dag::LogicalPlan;
use tracing::debug;

/// Immutable view of the registered tables at one point in time.
pub type RegistrySnapshot = Arc<HashMap<String, LogicalPlan>>;

#[derive(Debug, Default)]
pub struct NamedTableRegistry {
    tables: RwLock<RegistrySnapshot>,
}

impl NamedTableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plan` under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, plan: LogicalPlan) {
        self.register_many([(name.into(), plan)]);
    }

    /// Register several tables in one atomic swap.
    pub fn register_many<I, S>(&self, tables: I)
    where
        I: IntoIterator<Item = (S, LogicalPlan)>,
        S: Into<String>,
    {
        let mut guard = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let map = Arc::make_mut(&mut guard);
        for (name, plan) in tables {
            let name = name.into();
            debug!(table = %name, schema = %plan.schema(), "registered table");
            map.insert(name, plan);
        }
    }

    /// Remove `name`, returning its plan if it was registered.
    pub fn unregister(&self, name: &str) -> Option<LogicalPlan> {
        let mut guard = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if !guard.contains_key(name) {
            return None;
        }
        let removed = Arc::make_mut(&mut guard).remove(name);
        debug!(table = %name, "unregistered table");
        removed
    }

    pub fn get(&self, name: &str) -> Option<LogicalPlan> {
        self.snapshot().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
