//! SQL text → resolved logical plan.
//!
//! Only single `SELECT` queries are translated. Every expression is lowered
//! into a colplan `Expr` and then goes through the same builder methods the
//! expression API uses, so both surfaces resolve names identically.

mod expr;
mod join;
mod select;

use colplan_core::config::PlannerConfig;
use colplan_core::dag::LogicalPlan;
use colplan_core::error::{Error, Result};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::error::syntax_error;
use crate::registry::{NamedTableRegistry, RegistrySnapshot};

/// Translate `sql` against the tables currently in `registry`.
///
/// Uses the default planner config and returns the unoptimized plan.
pub fn translate(sql: &str, registry: &NamedTableRegistry) -> Result<LogicalPlan> {
    SqlTranslator::new(registry.snapshot(), PlannerConfig::default()).translate(sql)
}

/// Translator bound to one registry snapshot.
#[derive(Debug, Clone)]
pub struct SqlTranslator {
    tables: RegistrySnapshot,
    config: PlannerConfig,
}

impl SqlTranslator {
    pub fn new(tables: RegistrySnapshot, config: PlannerConfig) -> Self {
        Self { tables, config }
    }

    pub fn translate(&self, sql: &str) -> Result<LogicalPlan> {
        let statements = Parser::parse_sql(&GenericDialect {}, sql).map_err(syntax_error)?;
        let statement = match statements.as_slice() {
            [one] => one,
            [] => return Err(Error::Unsupported("empty SQL text".into())),
            many => {
                return Err(Error::Unsupported(format!(
                    "expected one statement, got {}",
                    many.len()
                )))
            }
        };
        let plan = match statement {
            Statement::Query(query) => self.plan_query(query)?,
            other => {
                return Err(Error::Unsupported(format!(
                    "statement '{}'",
                    statement_kind(other)
                )))
            }
        };
        debug!(sql, schema = %plan.schema(), "translated SQL");
        Ok(plan)
    }

    fn plan_query(&self, query: &Query) -> Result<LogicalPlan> {
        if query.with.is_some() {
            return Err(Error::Unsupported("WITH (common table expressions)".into()));
        }
        if query.offset.is_some() {
            return Err(Error::Unsupported("OFFSET".into()));
        }
        if query.fetch.is_some() {
            return Err(Error::Unsupported("FETCH".into()));
        }
        if !query.limit_by.is_empty() {
            return Err(Error::Unsupported("LIMIT BY".into()));
        }
        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            SetExpr::SetOperation { op, .. } => {
                return Err(Error::Unsupported(format!("set operation {op}")))
            }
            SetExpr::Query(_) => return Err(Error::Unsupported("subqueries".into())),
            other => return Err(Error::Unsupported(format!("query body {other}"))),
        };
        let order_by = query
            .order_by
            .as_ref()
            .map(|o| o.exprs.as_slice())
            .unwrap_or(&[]);
        let limit = query.limit.as_ref().map(limit_value).transpose()?;
        self.plan_select(select, order_by, limit)
    }
}

fn limit_value(expr: &sqlparser::ast::Expr) -> Result<usize> {
    match expr::literal_limit(expr) {
        Some(n) => Ok(n),
        None => Err(Error::Unsupported(format!(
            "LIMIT must be a non-negative integer literal, got {expr}"
        ))),
    }
}

fn statement_kind(statement: &Statement) -> String {
    let text = statement.to_string();
    text.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}
