//! Selector resolution.
//!
//! Turns user expressions (which may contain wildcards, regex and dtype
//! selectors, exclusions, multi-field struct access) into *bound*
//! expressions: one output column per [`Resolved`], each with a concrete
//! name, an inferred type, and an expression that references only concrete
//! columns. Bound expressions never contain selector variants or
//! `WithFields`; the latter is rewritten into a `Struct` over field accesses.
//!
//! Resolution is a pure function of `(expr, schema, context)`.

mod context;
pub mod infer;
mod selector;
mod structs;

pub use context::{ResolutionContext, ResolutionMode};

use colplan_core::error::{Error, Result};
use colplan_core::expr::{is_known_function, Expr, NamedExpr};
use colplan_core::schema::{DataType, Field, Schema};
use tracing::trace;

/// One concrete output column produced by resolving an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Bound expression; contains no selectors.
    pub expr: Expr,
}

impl Resolved {
    pub(crate) fn from_field(field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            data_type: field.data_type.clone(),
            nullable: field.nullable,
            expr: Expr::Column(field.name.clone()),
        }
    }

    pub fn field(&self) -> Field {
        Field::new(self.name.clone(), self.data_type.clone(), self.nullable)
    }

    pub fn into_named(self) -> NamedExpr {
        NamedExpr::new(self.name, self.expr)
    }

    fn renamed(self, name: String) -> Self {
        Self { name, ..self }
    }
}

/// Expand `expr` against `schema` into zero or more output columns.
pub fn resolve(expr: &Expr, schema: &Schema, ctx: &ResolutionContext) -> Result<Vec<Resolved>> {
    let out = expand(expr, schema, ctx)?;
    trace!(expr = %expr, outputs = out.len(), "resolved expression");
    Ok(out)
}

/// Resolve a list of expressions in order, rejecting duplicate output names.
pub fn resolve_all(
    exprs: &[Expr],
    schema: &Schema,
    ctx: &ResolutionContext,
) -> Result<Vec<Resolved>> {
    let mut out = Vec::new();
    for expr in exprs {
        out.extend(resolve(expr, schema, ctx)?);
    }
    check_unique(&out)?;
    Ok(out)
}

/// Resolve an expression that must produce exactly one column
/// (filter predicates, sort and join keys).
pub fn resolve_single(expr: &Expr, schema: &Schema, ctx: &ResolutionContext) -> Result<Resolved> {
    let mut out = resolve(expr, schema, ctx)?;
    if out.len() == 1 {
        Ok(out.remove(0))
    } else {
        Err(Error::Plan(format!(
            "expression {expr} must produce exactly one column, got {}",
            out.len()
        )))
    }
}

pub(crate) fn check_unique(items: &[Resolved]) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        if items[..i].iter().any(|prev| prev.name == item.name) {
            return Err(Error::AmbiguousColumn(item.name.clone()));
        }
    }
    Ok(())
}

fn expand(expr: &Expr, schema: &Schema, ctx: &ResolutionContext) -> Result<Vec<Resolved>> {
    match expr {
        Expr::Column(name) => Ok(vec![selector::column(schema, name)?]),
        Expr::Columns(names) => names
            .iter()
            .map(|name| selector::column(schema, name))
            .collect(),
        Expr::Wildcard => Ok(selector::wildcard(schema, ctx)),
        Expr::Regex(pattern) => selector::regex(schema, pattern, ctx),
        Expr::DtypeSelector(classes) => Ok(selector::dtype(schema, classes, ctx)),
        Expr::Exclude(base, exclusions) => {
            let excluded = selector::excluded_names(schema, exclusions)?;
            Ok(expand(base, schema, ctx)?
                .into_iter()
                .filter(|r| !excluded.contains(&r.name))
                .collect())
        }
        Expr::StructField(base, selectors) => {
            structs::field_access(expand(base, schema, ctx)?, selectors)
        }
        Expr::WithFields(base, modifiers) => {
            structs::with_fields(expand(base, schema, ctx)?, modifiers)
        }
        Expr::Struct(members) => Ok(vec![structs::build(members, schema, ctx)?]),
        Expr::Alias(base, name) => Ok(expand(base, schema, ctx)?
            .into_iter()
            .map(|r| r.renamed(name.clone()))
            .collect()),
        Expr::RenameOutputs(base, op) => Ok(expand(base, schema, ctx)?
            .into_iter()
            .map(|r| {
                let name = op.apply(&r.name);
                r.renamed(name)
            })
            .collect()),
        Expr::Function {
            name,
            args,
            distinct,
        } => expand_function(name, args, *distinct, schema, ctx),
        Expr::BinaryOp { left, op, right } => {
            let rows = combine(vec![
                expand(left, schema, ctx)?,
                expand(right, schema, ctx)?,
            ])?;
            rows.into_iter()
                .map(|mut row| {
                    let r = row.pop().ok_or_else(missing_operand)?;
                    let l = row.pop().ok_or_else(missing_operand)?;
                    Ok(Resolved {
                        data_type: infer::binary_type(*op, &l.data_type, &r.data_type)?,
                        name: l.name,
                        nullable: l.nullable || r.nullable,
                        expr: Expr::BinaryOp {
                            left: Box::new(l.expr),
                            op: *op,
                            right: Box::new(r.expr),
                        },
                    })
                })
                .collect()
        }
        Expr::UnaryOp { op, expr: inner } => expand(inner, schema, ctx)?
            .into_iter()
            .map(|r| {
                Ok(Resolved {
                    data_type: infer::unary_type(*op, &r.data_type)?,
                    name: r.name,
                    nullable: r.nullable,
                    expr: Expr::UnaryOp {
                        op: *op,
                        expr: Box::new(r.expr),
                    },
                })
            })
            .collect(),
        Expr::Literal(value) => Ok(vec![Resolved {
            name: "literal".to_string(),
            data_type: value.data_type(),
            nullable: value.is_null(),
            expr: Expr::Literal(value.clone()),
        }]),
        Expr::Cast(base, dt) => Ok(expand(base, schema, ctx)?
            .into_iter()
            .map(|r| Resolved {
                name: r.name,
                data_type: dt.clone(),
                nullable: true,
                expr: Expr::Cast(Box::new(r.expr), dt.clone()),
            })
            .collect()),
    }
}

fn expand_function(
    name: &str,
    args: &[Expr],
    distinct: bool,
    schema: &Schema,
    ctx: &ResolutionContext,
) -> Result<Vec<Resolved>> {
    if !is_known_function(name) {
        return Err(Error::Plan(format!("unknown function '{name}'")));
    }
    if args.is_empty() {
        if name != "count" {
            return Err(Error::Plan(format!("{name}() requires an argument")));
        }
        return Ok(vec![Resolved {
            name: name.to_string(),
            data_type: DataType::Int64,
            nullable: false,
            expr: Expr::Function {
                name: name.to_string(),
                args: Vec::new(),
                distinct,
            },
        }]);
    }

    let lists = args
        .iter()
        .map(|arg| expand(arg, schema, ctx))
        .collect::<Result<Vec<_>>>()?;
    combine(lists)?
        .into_iter()
        .map(|row| {
            let types: Vec<DataType> = row.iter().map(|r| r.data_type.clone()).collect();
            let data_type = infer::function_type(name, &types)?;
            let out_name = row
                .first()
                .map(|r| r.name.clone())
                .unwrap_or_else(|| name.to_string());
            Ok(Resolved {
                name: out_name,
                data_type,
                nullable: true,
                expr: Expr::Function {
                    name: name.to_string(),
                    args: row.into_iter().map(|r| r.expr).collect(),
                    distinct,
                },
            })
        })
        .collect()
}

/// Line up the outputs of several operands.
///
/// Single-output operands broadcast; multi-output operands zip and must
/// agree in width. An operand with zero outputs empties the result.
fn combine(lists: Vec<Vec<Resolved>>) -> Result<Vec<Vec<Resolved>>> {
    if lists.iter().any(Vec::is_empty) {
        return Ok(Vec::new());
    }
    let width = lists.iter().map(Vec::len).max().unwrap_or(0);
    if let Some(bad) = lists.iter().find(|l| l.len() != 1 && l.len() != width) {
        return Err(Error::Schema(format!(
            "cannot combine operands producing {} and {width} columns",
            bad.len()
        )));
    }
    Ok((0..width)
        .map(|i| {
            lists
                .iter()
                .map(|l| if l.len() == 1 { l[0].clone() } else { l[i].clone() })
                .collect()
        })
        .collect())
}

fn missing_operand() -> Error {
    Error::Invariant("binary operator lost an operand".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use colplan_core::expr::{all, col, cols, dtype_col, exclude, lit};
    use colplan_core::schema::{TypeClass, NUMERIC_TYPES};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Float64, true),
            Field::new("c", DataType::Boolean, true),
            Field::new("name", DataType::Utf8, true),
        ])
    }

    fn names(out: &[Resolved]) -> Vec<&str> {
        out.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_wildcard_keeps_schema_order() {
        let out = resolve(&all(), &schema(), &ResolutionContext::new()).expect("resolve");
        assert_eq!(names(&out), vec!["a", "b", "c", "name"]);
        assert!(out.iter().all(|r| matches!(r.expr, Expr::Column(_))));
    }

    #[test]
    fn test_unknown_column() {
        let err = resolve(&col("zzz"), &schema(), &ResolutionContext::new()).unwrap_err();
        assert_eq!(err, Error::UnknownColumn("zzz".into()));
    }

    #[test]
    fn test_exclude_by_dtype_and_name() {
        let ctx = ResolutionContext::new();
        let out = resolve(&all().exclude([DataType::Boolean]), &schema(), &ctx).expect("resolve");
        assert_eq!(names(&out), vec!["a", "b", "name"]);

        let out = resolve(&exclude(NUMERIC_TYPES), &schema(), &ctx).expect("resolve");
        assert_eq!(names(&out), vec!["c", "name"]);

        // Absent names are ignored.
        let out = resolve(&exclude(["a", "nope"]), &schema(), &ctx).expect("resolve");
        assert_eq!(names(&out), vec!["b", "c", "name"]);
    }

    #[test]
    fn test_function_over_selector_broadcasts_literal() {
        let expr = (dtype_col(DataType::Int64) + lit(1i64)).prefix("p_");
        let out = resolve(&expr, &schema(), &ResolutionContext::new()).expect("resolve");
        assert_eq!(names(&out), vec!["p_a"]);
        assert_eq!(out[0].data_type, DataType::Int64);

        let expr = Expr::DtypeSelector(vec![TypeClass::Numeric]).max();
        let out = resolve(&expr, &schema(), &ResolutionContext::new()).expect("resolve");
        assert_eq!(names(&out), vec!["a", "b"]);
    }

    #[test]
    fn test_mismatched_selector_widths() {
        let expr = cols(["a", "b"]) + cols(["a", "b", "c"]);
        let err = resolve(&expr, &schema(), &ResolutionContext::new()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_resolve_all_rejects_duplicates() {
        let err = resolve_all(
            &[col("a"), col("b").alias("a")],
            &schema(),
            &ResolutionContext::new(),
        )
        .unwrap_err();
        assert_eq!(err, Error::AmbiguousColumn("a".into()));
    }

    #[test]
    fn test_aggregate_context_skips_keys_for_implicit_selectors() {
        let ctx = ResolutionContext::aggregate(vec!["a".into()]);
        let out = resolve(&all(), &schema(), &ctx).expect("resolve");
        assert_eq!(names(&out), vec!["b", "c", "name"]);
        // Explicit names are never skipped.
        let out = resolve(&cols(["a", "c"]), &schema(), &ctx).expect("resolve");
        assert_eq!(names(&out), vec!["a", "c"]);
    }

    #[test]
    fn test_count_star_and_single() {
        let ctx = ResolutionContext::new();
        let out = resolve_single(&colplan_core::expr::count_star(), &schema(), &ctx).expect("count");
        assert_eq!(out.name, "count");
        assert_eq!(out.data_type, DataType::Int64);
        assert!(matches!(
            resolve_single(&all(), &schema(), &ctx),
            Err(Error::Plan(_))
        ));
    }
}
