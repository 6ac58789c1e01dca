//! FROM clause: table scopes and equi-join planning.

use std::ops::ControlFlow;

use colplan_core::dag::{JoinLayout, JoinType, LogicalPlan};
use colplan_core::error::{Error, Result};
use colplan_core::schema::Schema;
use colplan_planner::LogicalPlanBuilder;
use sqlparser::ast::{
    visit_expressions, BinaryOperator, Expr as SqlExpr, Join, JoinConstraint, JoinOperator,
    ObjectName, TableFactor, TableWithJoins,
};
use tracing::debug;

use super::expr::lower;
use super::SqlTranslator;

/// One FROM item: the name queries use for it and where its columns ended up.
#[derive(Debug, Clone)]
pub(crate) struct TableScope {
    name: String,
    schema: Schema,
    /// Output column name for each column of `schema`, in order.
    outputs: Vec<String>,
}

impl TableScope {
    fn identity(name: String, schema: Schema) -> Self {
        let outputs = schema.fields.iter().map(|f| f.name.clone()).collect();
        Self {
            name,
            schema,
            outputs,
        }
    }
}

/// Tables visible to expressions of one SELECT.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scopes {
    tables: Vec<TableScope>,
}

impl Scopes {
    fn single(scope: TableScope) -> Self {
        Self {
            tables: vec![scope],
        }
    }

    fn push(&mut self, scope: TableScope) -> Result<()> {
        if self.has_table(&scope.name) {
            return Err(Error::Plan(format!(
                "table name '{}' is specified more than once; use an alias",
                scope.name
            )));
        }
        self.tables.push(scope);
        Ok(())
    }

    pub(crate) fn has_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    fn table(&self, name: &str) -> Result<&TableScope> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Output name of `table.column`.
    pub(crate) fn column(&self, table: &str, column: &str) -> Result<String> {
        let scope = self.table(table)?;
        let idx = scope
            .schema
            .index_of(column)
            .ok_or_else(|| Error::UnknownColumn(format!("{table}.{column}")))?;
        Ok(scope.outputs[idx].clone())
    }

    /// Output names of every column of `table`, for `table.*`.
    pub(crate) fn wildcard(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.table(table)?.outputs.clone())
    }
}

pub(crate) fn object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

impl SqlTranslator {
    /// Plan the FROM clause, returning the joined input and its scopes.
    pub(super) fn plan_from(&self, from: &[TableWithJoins]) -> Result<(LogicalPlanBuilder, Scopes)> {
        let item = match from {
            [item] => item,
            [] => return Err(Error::Unsupported("SELECT without FROM".into())),
            _ => {
                return Err(Error::Unsupported(
                    "comma-separated FROM items; use JOIN ... ON".into(),
                ))
            }
        };

        let (name, plan) = self.table_factor(&item.relation)?;
        let mut scopes = Scopes::default();
        scopes.push(TableScope::identity(name, plan.schema().clone()))?;
        let mut builder = LogicalPlanBuilder::from_plan(plan).with_config(self.config.clone());
        for join in &item.joins {
            builder = self.plan_join(builder, &mut scopes, join)?;
        }
        Ok((builder, scopes))
    }

    fn table_factor(&self, factor: &TableFactor) -> Result<(String, LogicalPlan)> {
        match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                if args.is_some() {
                    return Err(Error::Unsupported("table functions".into()));
                }
                let table = object_name(name);
                let plan = self
                    .tables
                    .get(&table)
                    .cloned()
                    .ok_or_else(|| Error::UnknownTable(table.clone()))?;
                let scope = match alias {
                    Some(alias) if !alias.columns.is_empty() => {
                        return Err(Error::Unsupported("column aliases in FROM".into()))
                    }
                    Some(alias) => alias.name.value.clone(),
                    None => table,
                };
                Ok((scope, plan))
            }
            TableFactor::Derived { .. } => Err(Error::Unsupported("subqueries in FROM".into())),
            other => Err(Error::Unsupported(format!("FROM item {other}"))),
        }
    }

    fn plan_join(
        &self,
        builder: LogicalPlanBuilder,
        scopes: &mut Scopes,
        join: &Join,
    ) -> Result<LogicalPlanBuilder> {
        let (join_type, constraint) = match &join.join_operator {
            JoinOperator::Inner(c) => (JoinType::Inner, c),
            JoinOperator::LeftOuter(c) => (JoinType::Left, c),
            other => return Err(Error::Unsupported(format!("join operator {other:?}"))),
        };
        let on = match constraint {
            JoinConstraint::On(on) => on,
            _ => return Err(Error::Unsupported("joins without an ON condition".into())),
        };

        let (right_name, right_plan) = self.table_factor(&join.relation)?;
        if scopes.has_table(&right_name) {
            return Err(Error::Plan(format!(
                "table name '{right_name}' is specified more than once; use an alias"
            )));
        }
        let right_scope = TableScope::identity(right_name, right_plan.schema().clone());
        let right_scopes = Scopes::single(right_scope.clone());

        let mut left_on = Vec::new();
        let mut right_on = Vec::new();
        let mut residual = Vec::new();
        for conjunct in conjuncts(on) {
            match equi_key(conjunct, scopes, builder.schema(), &right_scope)? {
                Some((l, r)) => {
                    left_on.push(lower(l, scopes)?);
                    right_on.push(lower(r, &right_scopes)?);
                }
                None => residual.push(conjunct),
            }
        }
        if left_on.is_empty() {
            return Err(Error::Unsupported(
                "join condition without an equality between both inputs".into(),
            ));
        }
        if join_type == JoinType::Left && !residual.is_empty() {
            return Err(Error::Unsupported("non-equi conditions in LEFT JOIN".into()));
        }

        let suffix = self.config.join_suffix.clone();
        let builder = builder.join_with_suffix(right_plan, left_on, right_on, join_type, &suffix)?;

        // Point the right scope at the names the join actually emitted.
        let LogicalPlan::Join {
            left,
            right,
            left_on,
            right_on,
            ..
        } = builder.plan()
        else {
            return Err(Error::Invariant("join builder produced a non-join node".into()));
        };
        let layout = JoinLayout::new(
            left.schema(),
            right.schema(),
            left_on,
            right_on,
            join_type,
            &suffix,
        )?;
        let mut right_scope = right_scope;
        right_scope.outputs = right_scope
            .schema
            .fields
            .iter()
            .map(|f| {
                layout
                    .right_output_name(&right_scope.schema, &f.name)
                    .ok_or_else(|| Error::Invariant(format!("right column '{}' lost in join", f.name)))
            })
            .collect::<Result<_>>()?;
        debug!(table = %right_scope.name, ?join_type, "planned join");
        scopes.push(right_scope)?;

        match residual
            .into_iter()
            .map(|c| lower(c, scopes))
            .reduce(|acc, e| Ok(acc?.and(e?)))
        {
            Some(predicate) => builder.filter(predicate?),
            None => Ok(builder),
        }
    }
}

fn conjuncts(expr: &SqlExpr) -> Vec<&SqlExpr> {
    match expr {
        SqlExpr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            let mut out = conjuncts(left);
            out.extend(conjuncts(right));
            out
        }
        SqlExpr::Nested(inner) => conjuncts(inner),
        other => vec![other],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Neither,
    Left,
    Right,
    Both,
}

impl Side {
    fn merge(self, other: Side) -> Side {
        match (self, other) {
            (Side::Neither, s) | (s, Side::Neither) => s,
            (a, b) if a == b => a,
            _ => Side::Both,
        }
    }
}

/// `l = r` where each operand reads from exactly one side of the join.
fn equi_key<'a>(
    conjunct: &'a SqlExpr,
    left: &Scopes,
    left_schema: &Schema,
    right: &TableScope,
) -> Result<Option<(&'a SqlExpr, &'a SqlExpr)>> {
    let SqlExpr::BinaryOp {
        left: l,
        op: BinaryOperator::Eq,
        right: r,
    } = conjunct
    else {
        return Ok(None);
    };
    Ok(
        match (side_of(l, left, left_schema, right)?, side_of(r, left, left_schema, right)?) {
            (Side::Left, Side::Right) => Some((&**l, &**r)),
            (Side::Right, Side::Left) => Some((&**r, &**l)),
            _ => None,
        },
    )
}

fn side_of(expr: &SqlExpr, left: &Scopes, left_schema: &Schema, right: &TableScope) -> Result<Side> {
    let unqualified = |name: &str| -> Result<Side> {
        match (left_schema.contains(name), right.schema.contains(name)) {
            (true, true) => Err(Error::AmbiguousColumn(name.to_string())),
            (true, false) => Ok(Side::Left),
            (false, true) => Ok(Side::Right),
            (false, false) => Err(Error::UnknownColumn(name.to_string())),
        }
    };

    let mut side = Side::Neither;
    let flow = visit_expressions(expr, |e| {
        let found = match e {
            SqlExpr::Identifier(ident) => unqualified(&ident.value),
            SqlExpr::CompoundIdentifier(idents) => match idents.as_slice() {
                [table, ..] if table.value == right.name => Ok(Side::Right),
                [table, ..] if left.has_table(&table.value) => Ok(Side::Left),
                [column, ..] => unqualified(&column.value),
                [] => Ok(Side::Neither),
            },
            _ => Ok(Side::Neither),
        };
        match found {
            Ok(s) => {
                side = side.merge(s);
                ControlFlow::Continue(())
            }
            Err(err) => ControlFlow::Break(err),
        }
    });
    match flow {
        ControlFlow::Break(err) => Err(err),
        ControlFlow::Continue(()) => Ok(side),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colplan_core::schema::{DataType, Field};

    fn scope(name: &str, cols: &[&str]) -> TableScope {
        TableScope::identity(
            name.to_string(),
            Schema::new(
                cols.iter()
                    .map(|c| Field::new(*c, DataType::Int64, true))
                    .collect(),
            ),
        )
    }

    #[test]
    fn duplicate_scope_names_are_rejected() {
        let mut scopes = Scopes::default();
        scopes.push(scope("t", &["a"])).expect("first");
        assert!(matches!(scopes.push(scope("t", &["b"])), Err(Error::Plan(_))));
    }

    #[test]
    fn qualified_lookup_errors() {
        let scopes = Scopes::single(scope("t", &["a"]));
        assert_eq!(scopes.column("t", "a").expect("a"), "a");
        assert_eq!(scopes.column("u", "a"), Err(Error::UnknownTable("u".into())));
        assert_eq!(
            scopes.column("t", "z"),
            Err(Error::UnknownColumn("t.z".into()))
        );
    }

    #[test]
    fn side_detection() {
        let left = Scopes::single(scope("l", &["a", "k"]));
        let right = scope("r", &["b", "k"]);
        let schema = left.tables[0].schema.clone();

        let parse = |sql: &str| {
            sqlparser::parser::Parser::new(&sqlparser::dialect::GenericDialect {})
                .try_with_sql(sql)
                .and_then(|mut p| p.parse_expr())
                .expect("parse")
        };
        assert_eq!(side_of(&parse("a + 1"), &left, &schema, &right), Ok(Side::Left));
        assert_eq!(side_of(&parse("r.k"), &left, &schema, &right), Ok(Side::Right));
        assert_eq!(side_of(&parse("a + b"), &left, &schema, &right), Ok(Side::Both));
        assert_eq!(
            side_of(&parse("k"), &left, &schema, &right),
            Err(Error::AmbiguousColumn("k".into()))
        );
    }
}
