//! Planner configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Let `rules::optimize` prune unused scan columns. Never changes any
    /// resolved schema or column order.
    pub projection_pushdown: bool,

    /// Appended to right-side join columns whose names collide.
    pub join_suffix: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            projection_pushdown: true,
            join_suffix: "_right".to_string(),
        }
    }
}

impl PlannerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `COLPLAN_PROJECTION_PUSHDOWN`: `true`/`false`/`1`/`0`
    /// - `COLPLAN_JOIN_SUFFIX`: suffix for colliding right-side join columns
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("COLPLAN_PROJECTION_PUSHDOWN") {
            if let Some(v) = parse_flag(&s) {
                cfg.projection_pushdown = v;
            }
        }

        if let Ok(s) = std::env::var("COLPLAN_JOIN_SUFFIX") {
            if !s.is_empty() {
                cfg.join_suffix = s;
            }
        }

        cfg
    }

    pub fn with_projection_pushdown(mut self, enabled: bool) -> Self {
        self.projection_pushdown = enabled;
        self
    }

    pub fn with_join_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.join_suffix = suffix.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.join_suffix.is_empty() {
            return Err(Error::Config("join_suffix must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
