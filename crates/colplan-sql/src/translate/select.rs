//! SELECT planning: projection, grouping, HAVING, ORDER BY, DISTINCT, LIMIT.

use colplan_core::dag::{LogicalPlan, SortKey};
use colplan_core::error::{Error, Result};
use colplan_core::expr::{is_aggregate_function, Exclusion, Expr};
use colplan_core::schema::Schema;
use colplan_planner::{resolve, resolve_all, LogicalPlanBuilder, ResolutionContext};
use sqlparser::ast::{
    Distinct, ExcludeSelectItem, Expr as SqlExpr, GroupByExpr, Ident, OrderByExpr, Select,
    SelectItem, WildcardAdditionalOptions,
};

use super::expr::{lower, ordinal};
use super::join::{object_name, Scopes};
use super::SqlTranslator;

/// One SELECT list entry after lowering.
struct Projection {
    expr: Expr,
    alias: Option<String>,
}

impl Projection {
    fn aliased(&self) -> Expr {
        match &self.alias {
            Some(alias) => self.expr.clone().alias(alias),
            None => self.expr.clone(),
        }
    }
}

enum OrderTarget {
    /// 1-based position in the SELECT output.
    Position(usize),
    Expr(Expr),
}

struct OrderKey {
    target: OrderTarget,
    descending: bool,
    nulls_last: bool,
}

impl SqlTranslator {
    pub(super) fn plan_select(
        &self,
        select: &Select,
        order_by: &[OrderByExpr],
        limit: Option<usize>,
    ) -> Result<LogicalPlan> {
        reject_unsupported(select)?;
        let distinct = match &select.distinct {
            None => false,
            Some(Distinct::Distinct) => true,
            Some(Distinct::On(_)) => return Err(Error::Unsupported("DISTINCT ON".into())),
        };

        let (mut input, scopes) = self.plan_from(&select.from)?;
        if let Some(selection) = &select.selection {
            input = input.filter(lower(selection, &scopes)?)?;
        }

        let items = projection(&select.projection, &scopes, &self.config.join_suffix)?;
        let keys = group_keys(&select.group_by, &items, input.schema(), &scopes)?;
        let having = select
            .having
            .as_ref()
            .map(|h| lower(h, &scopes))
            .transpose()?;
        let order = order_by
            .iter()
            .map(|o| order_key(o, &scopes))
            .collect::<Result<Vec<_>>>()?;

        let aggregated = !keys.is_empty()
            || items.iter().any(|i| i.expr.contains_aggregate())
            || having.as_ref().is_some_and(Expr::contains_aggregate);

        let mut builder = if aggregated {
            plan_grouped(input, keys, &items, having, order)?
        } else {
            if having.is_some() {
                return Err(Error::Plan(
                    "HAVING requires GROUP BY or an aggregate function".into(),
                ));
            }
            if order
                .iter()
                .any(|k| matches!(&k.target, OrderTarget::Expr(e) if e.contains_aggregate()))
            {
                return Err(Error::Plan(
                    "aggregate functions in ORDER BY require GROUP BY".into(),
                ));
            }
            let exprs = items.iter().map(Projection::aliased).collect();
            project_and_sort(input, exprs, &order)?
        };

        if distinct {
            let columns: Vec<Expr> = builder
                .schema()
                .fields
                .iter()
                .map(|f| Expr::Column(f.name.clone()))
                .collect();
            builder = builder.group_by(columns).agg(Vec::<Expr>::new())?;
        }
        if let Some(n) = limit {
            builder = builder.limit(n);
        }
        Ok(builder.build())
    }
}

fn reject_unsupported(select: &Select) -> Result<()> {
    let clause = if select.top.is_some() {
        "TOP"
    } else if select.into.is_some() {
        "SELECT INTO"
    } else if !select.lateral_views.is_empty() {
        "LATERAL VIEW"
    } else if !select.named_window.is_empty() {
        "WINDOW"
    } else if select.qualify.is_some() {
        "QUALIFY"
    } else {
        return Ok(());
    };
    Err(Error::Unsupported(clause.to_string()))
}

/// Lowered SELECT items. A qualified column whose output name an earlier
/// item already took (`f1.k, f2.k` over a coalesced join key) is aliased
/// with the join suffix.
fn projection(items: &[SelectItem], scopes: &Scopes, suffix: &str) -> Result<Vec<Projection>> {
    let mut taken: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let projection = match item {
            SelectItem::UnnamedExpr(e) => {
                let expr = lower(e, scopes)?;
                let alias = match (e, &expr) {
                    (SqlExpr::CompoundIdentifier(_), Expr::Column(name))
                        if taken.contains(name) =>
                    {
                        let mut alias = format!("{name}{suffix}");
                        while taken.contains(&alias) {
                            alias.push_str(suffix);
                        }
                        Some(alias)
                    }
                    _ => None,
                };
                Projection { expr, alias }
            }
            SelectItem::ExprWithAlias { expr, alias } => Projection {
                expr: lower(expr, scopes)?,
                alias: Some(alias.value.clone()),
            },
            SelectItem::Wildcard(opts) => Projection {
                expr: with_exclusions(Expr::Wildcard, opts)?,
                alias: None,
            },
            SelectItem::QualifiedWildcard(name, opts) => {
                let columns = scopes.wildcard(&object_name(name))?;
                Projection {
                    expr: with_exclusions(Expr::Columns(columns), opts)?,
                    alias: None,
                }
            }
        };
        match (&projection.alias, &projection.expr) {
            (Some(name), _) | (None, Expr::Column(name)) => taken.push(name.clone()),
            _ => {}
        }
        out.push(projection);
    }
    Ok(out)
}

fn with_exclusions(base: Expr, opts: &WildcardAdditionalOptions) -> Result<Expr> {
    let unsupported = [
        (opts.opt_ilike.is_some(), "ILIKE"),
        (opts.opt_except.is_some(), "EXCEPT"),
        (opts.opt_replace.is_some(), "REPLACE"),
        (opts.opt_rename.is_some(), "RENAME"),
    ];
    if let Some((_, option)) = unsupported.iter().find(|(set, _)| *set) {
        return Err(Error::Unsupported(format!("{option} in wildcard")));
    }
    let names: Vec<&Ident> = match &opts.opt_exclude {
        None => return Ok(base),
        Some(ExcludeSelectItem::Single(ident)) => vec![ident],
        Some(ExcludeSelectItem::Multiple(idents)) => idents.iter().collect(),
    };
    Ok(Expr::Exclude(
        Box::new(base),
        names
            .into_iter()
            .map(|ident| Exclusion::Name(ident.value.clone()))
            .collect(),
    ))
}

/// GROUP BY entries: positions and SELECT aliases refer to SELECT items.
fn group_keys(
    group_by: &GroupByExpr,
    items: &[Projection],
    input: &Schema,
    scopes: &Scopes,
) -> Result<Vec<Expr>> {
    let exprs = match group_by {
        GroupByExpr::All(_) => return Err(Error::Unsupported("GROUP BY ALL".into())),
        GroupByExpr::Expressions(exprs, modifiers) => {
            if !modifiers.is_empty() {
                return Err(Error::Unsupported("GROUP BY modifiers".into()));
            }
            exprs
        }
    };

    exprs
        .iter()
        .map(|e| {
            if let Some(pos) = ordinal(e)? {
                let item = items.get(pos - 1).ok_or_else(|| {
                    Error::Plan(format!("GROUP BY position {pos} is not in the select list"))
                })?;
                if item.expr.is_selector() || item.expr.contains_aggregate() {
                    return Err(Error::Plan(format!(
                        "GROUP BY position {pos} refers to a wildcard or an aggregate"
                    )));
                }
                return Ok(item.expr.clone());
            }
            if let SqlExpr::Identifier(ident) = e {
                if !input.contains(&ident.value) {
                    if let Some(item) = items
                        .iter()
                        .find(|i| i.alias.as_deref() == Some(ident.value.as_str()))
                    {
                        return Ok(item.expr.clone());
                    }
                }
            }
            lower(e, scopes)
        })
        .collect()
}

fn order_key(o: &OrderByExpr, scopes: &Scopes) -> Result<OrderKey> {
    let target = match ordinal(&o.expr)? {
        Some(pos) => OrderTarget::Position(pos),
        None => OrderTarget::Expr(lower(&o.expr, scopes)?),
    };
    Ok(OrderKey {
        target,
        descending: o.asc == Some(false),
        nulls_last: o.nulls_first == Some(false),
    })
}

/// Aggregations feeding one `Aggregate` node, including hidden ones that
/// only HAVING or ORDER BY read.
#[derive(Default)]
struct Aggregates {
    exprs: Vec<Expr>,
    /// Unaliased aggregate expression → output column.
    known: Vec<(Expr, String)>,
    hidden: usize,
}

impl Aggregates {
    /// Replace aggregate calls in `expr` with references to their outputs.
    fn substitute(&mut self, expr: Expr) -> Expr {
        if let Expr::Function { name, .. } = &expr {
            if is_aggregate_function(name) {
                return Expr::Column(self.output_of(expr));
            }
        }
        match expr {
            Expr::Function {
                name,
                args,
                distinct,
            } => Expr::Function {
                name,
                args: args.into_iter().map(|a| self.substitute(a)).collect(),
                distinct,
            },
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: Box::new(self.substitute(*left)),
                op,
                right: Box::new(self.substitute(*right)),
            },
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op,
                expr: Box::new(self.substitute(*expr)),
            },
            Expr::Cast(base, dt) => Expr::Cast(Box::new(self.substitute(*base)), dt),
            Expr::Alias(base, name) => Expr::Alias(Box::new(self.substitute(*base)), name),
            other => other,
        }
    }

    fn output_of(&mut self, agg: Expr) -> String {
        if let Some((_, out)) = self.known.iter().find(|(e, _)| *e == agg) {
            return out.clone();
        }
        let out = format!("__agg_{}", self.hidden);
        self.hidden += 1;
        self.exprs.push(agg.clone().alias(&out));
        self.known.push((agg, out.clone()));
        out
    }
}

fn plan_grouped(
    input: LogicalPlanBuilder,
    keys: Vec<Expr>,
    items: &[Projection],
    having: Option<Expr>,
    order: Vec<OrderKey>,
) -> Result<LogicalPlanBuilder> {
    let schema = input.schema().clone();
    let key_names: Vec<String> = resolve_all(&keys, &schema, &ResolutionContext::new())?
        .into_iter()
        .map(|r| r.name)
        .collect();
    let agg_ctx = ResolutionContext::aggregate(key_names.clone());

    let mut aggs = Aggregates::default();
    let mut outputs = Vec::with_capacity(items.len());
    for item in items {
        if item.expr.contains_aggregate() {
            let aliased = item.aliased();
            let resolved = resolve(&aliased, &schema, &agg_ctx)?;
            if let [single] = resolved.as_slice() {
                aggs.known.push((item.expr.clone(), single.name.clone()));
            }
            outputs.extend(resolved.into_iter().map(|r| Expr::Column(r.name)));
            aggs.exprs.push(aliased);
        } else {
            outputs.extend(key_projection(item, &keys, &key_names, &schema)?);
        }
    }

    let having = having.map(|h| aggs.substitute(h));
    let order: Vec<OrderKey> = order
        .into_iter()
        .map(|k| OrderKey {
            target: match k.target {
                OrderTarget::Expr(e) => OrderTarget::Expr(aggs.substitute(e)),
                position => position,
            },
            descending: k.descending,
            nulls_last: k.nulls_last,
        })
        .collect();

    let mut grouped = input.group_by(keys).agg(aggs.exprs)?;
    if let Some(predicate) = having {
        grouped = grouped.having(predicate)?;
    }
    project_and_sort(grouped, outputs, &order)
}

/// Re-express a non-aggregate SELECT item over the aggregation output.
fn key_projection(
    item: &Projection,
    keys: &[Expr],
    key_names: &[String],
    schema: &Schema,
) -> Result<Vec<Expr>> {
    if let Some(pos) = keys.iter().position(|k| *k == item.expr) {
        let column = Expr::Column(key_names[pos].clone());
        return Ok(vec![match &item.alias {
            Some(alias) if *alias != key_names[pos] => column.alias(alias),
            _ => column,
        }]);
    }

    resolve(&item.expr, schema, &ResolutionContext::new())?
        .into_iter()
        .map(|r| {
            if let Some(bad) = r
                .expr
                .column_refs()
                .into_iter()
                .find(|c| !key_names.contains(c))
            {
                return Err(Error::GroupByProjection(bad));
            }
            let name = item.alias.clone().unwrap_or(r.name);
            Ok(match r.expr {
                Expr::Column(c) if c == name => Expr::Column(c),
                other => other.alias(&name),
            })
        })
        .collect()
}

/// Project, then sort by the projected names; if a key only exists before
/// the projection, sort first and project after.
fn project_and_sort(
    input: LogicalPlanBuilder,
    exprs: Vec<Expr>,
    order: &[OrderKey],
) -> Result<LogicalPlanBuilder> {
    let projected = input.clone().select(exprs.clone())?;
    if order.is_empty() {
        return Ok(projected);
    }
    let outputs: Vec<String> = projected
        .schema()
        .fields
        .iter()
        .map(|f| f.name.clone())
        .collect();
    let keys = sort_keys(order, &outputs)?;
    match projected.sort(keys.clone()) {
        Ok(sorted) => Ok(sorted),
        Err(err) => input
            .sort(keys)
            .and_then(|sorted| sorted.select(exprs))
            .map_err(|_| err),
    }
}

fn sort_keys(order: &[OrderKey], outputs: &[String]) -> Result<Vec<SortKey>> {
    order
        .iter()
        .map(|k| {
            let expr = match &k.target {
                OrderTarget::Position(pos) => {
                    Expr::Column(outputs.get(pos - 1).cloned().ok_or_else(|| {
                        Error::Plan(format!("ORDER BY position {pos} is not in the select list"))
                    })?)
                }
                OrderTarget::Expr(e) => e.clone(),
            };
            Ok(SortKey {
                expr,
                descending: k.descending,
                nulls_last: k.nulls_last,
            })
        })
        .collect()
}
