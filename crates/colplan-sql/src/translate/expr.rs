//! Lowering of SQL expressions into colplan expressions.

use colplan_core::error::{Error, Result};
use colplan_core::expr::{count_star, function, lit, Expr, FieldSelector};
use colplan_core::schema::DataType;
use colplan_core::types::Scalar;
use sqlparser::ast::{
    BinaryOperator, DataType as SqlDataType, DuplicateTreatment, Expr as SqlExpr, FunctionArg,
    FunctionArgExpr, FunctionArguments, Ident, TrimWhereField, UnaryOperator, Value,
};

use super::join::Scopes;

pub(crate) fn lower(expr: &SqlExpr, scopes: &Scopes) -> Result<Expr> {
    match expr {
        SqlExpr::Identifier(ident) => Ok(Expr::Column(ident.value.clone())),
        SqlExpr::CompoundIdentifier(idents) => compound(idents, scopes),
        SqlExpr::Value(value) => Ok(Expr::Literal(literal(value)?)),
        SqlExpr::Nested(inner) => lower(inner, scopes),
        SqlExpr::BinaryOp { left, op, right } => {
            let (l, r) = (lower(left, scopes)?, lower(right, scopes)?);
            Ok(match op {
                BinaryOperator::Plus => l + r,
                BinaryOperator::Minus => l - r,
                BinaryOperator::Multiply => l * r,
                BinaryOperator::Divide => l / r,
                BinaryOperator::Modulo => l % r,
                BinaryOperator::Eq => l.eq(r),
                BinaryOperator::NotEq => l.neq(r),
                BinaryOperator::Lt => l.lt(r),
                BinaryOperator::LtEq => l.lt_eq(r),
                BinaryOperator::Gt => l.gt(r),
                BinaryOperator::GtEq => l.gt_eq(r),
                BinaryOperator::And => l.and(r),
                BinaryOperator::Or => l.or(r),
                other => return Err(Error::Unsupported(format!("operator {other}"))),
            })
        }
        SqlExpr::UnaryOp { op, expr: inner } => match op {
            UnaryOperator::Not => Ok(lower(inner, scopes)?.not()),
            UnaryOperator::Plus => lower(inner, scopes),
            UnaryOperator::Minus => match lower(inner, scopes)? {
                Expr::Literal(Scalar::I64(v)) => Ok(lit(-v)),
                Expr::Literal(Scalar::F64(v)) => Ok(lit(-v)),
                other => Ok(-other),
            },
            other => Err(Error::Unsupported(format!("unary operator {other}"))),
        },
        SqlExpr::IsNull(inner) => Ok(lower(inner, scopes)?.is_null()),
        SqlExpr::IsNotNull(inner) => Ok(lower(inner, scopes)?.is_not_null()),
        SqlExpr::Between {
            expr: inner,
            negated,
            low,
            high,
        } => {
            let x = lower(inner, scopes)?;
            let (lo, hi) = (lower(low, scopes)?, lower(high, scopes)?);
            if *negated {
                Ok(x.clone().lt(lo).or(x.gt(hi)))
            } else {
                Ok(x.is_between(lo, hi))
            }
        }
        SqlExpr::Cast {
            expr: inner,
            data_type,
            ..
        } => Ok(lower(inner, scopes)?.cast(data_type_of(data_type)?)),
        SqlExpr::Trim {
            expr: inner,
            trim_where,
            trim_what,
            trim_characters,
        } => {
            if trim_characters.is_some() {
                return Err(Error::Unsupported("TRIM with a character list".into()));
            }
            let side = match trim_where {
                Some(TrimWhereField::Leading) => "leading",
                Some(TrimWhereField::Trailing) => "trailing",
                Some(TrimWhereField::Both) | None => "both",
            };
            let chars = match trim_what {
                Some(what) => lower(what, scopes)?,
                None => Expr::Literal(Scalar::Null),
            };
            Ok(function("trim", vec![lower(inner, scopes)?, chars, lit(side)]))
        }
        SqlExpr::Function(func) => {
            if func.over.is_some() {
                return Err(Error::Unsupported("window functions".into()));
            }
            if func.filter.is_some() {
                return Err(Error::Unsupported("FILTER clause on aggregates".into()));
            }
            let raw = func.name.to_string().to_lowercase();
            let name = function_name(&raw)
                .ok_or_else(|| Error::Unsupported(format!("function '{raw}'")))?;

            let (args, distinct) = match &func.args {
                FunctionArguments::None => (Vec::new(), false),
                FunctionArguments::List(list) => {
                    let distinct =
                        matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct));
                    let mut args = Vec::with_capacity(list.args.len());
                    for arg in &list.args {
                        match arg {
                            FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => {
                                args.push(lower(e, scopes)?)
                            }
                            FunctionArg::Unnamed(FunctionArgExpr::Wildcard) if name == "count" => {
                                return Ok(count_star());
                            }
                            other => {
                                return Err(Error::Unsupported(format!(
                                    "function argument {other}"
                                )))
                            }
                        }
                    }
                    (args, distinct)
                }
                FunctionArguments::Subquery(_) => {
                    return Err(Error::Unsupported("subqueries".into()))
                }
            };
            Ok(Expr::Function {
                name: name.to_string(),
                args,
                distinct,
            })
        }
        other => Err(Error::Unsupported(format!("SQL expression {other}"))),
    }
}

/// `t.col` maps through the table scope; anything else is struct access
/// (`s.field`, `t.s.field`).
fn compound(idents: &[Ident], scopes: &Scopes) -> Result<Expr> {
    let (base, rest) = match idents {
        [table, column, rest @ ..] if scopes.has_table(&table.value) => (
            Expr::Column(scopes.column(&table.value, &column.value)?),
            rest,
        ),
        [column, rest @ ..] => (Expr::Column(column.value.clone()), rest),
        [] => return Err(Error::Invariant("empty compound identifier".into())),
    };
    Ok(rest.iter().fold(base, |acc, field| {
        Expr::StructField(Box::new(acc), vec![FieldSelector::Name(field.value.clone())])
    }))
}

pub(crate) fn literal(value: &Value) -> Result<Scalar> {
    match value {
        Value::Number(n, _) => {
            if let Ok(v) = n.parse::<i64>() {
                Ok(Scalar::I64(v))
            } else {
                n.parse::<f64>()
                    .map(Scalar::F64)
                    .map_err(|_| Error::Plan(format!("invalid numeric literal '{n}'")))
            }
        }
        Value::SingleQuotedString(s) => Ok(Scalar::Str(s.clone())),
        Value::Boolean(b) => Ok(Scalar::Bool(*b)),
        Value::Null => Ok(Scalar::Null),
        other => Err(Error::Unsupported(format!("literal {other}"))),
    }
}

/// 1-based position written as a bare integer literal (`GROUP BY 1`).
pub(crate) fn ordinal(expr: &SqlExpr) -> Result<Option<usize>> {
    match expr {
        SqlExpr::Value(Value::Number(n, _)) => match n.parse::<usize>() {
            Ok(0) | Err(_) => Err(Error::Plan(format!(
                "column position must be a positive integer, got {n}"
            ))),
            Ok(pos) => Ok(Some(pos)),
        },
        _ => Ok(None),
    }
}

pub(crate) fn literal_limit(expr: &SqlExpr) -> Option<usize> {
    match expr {
        SqlExpr::Value(Value::Number(n, _)) => n.parse().ok(),
        _ => None,
    }
}

fn function_name(raw: &str) -> Option<&'static str> {
    Some(match raw {
        "count" => "count",
        "sum" => "sum",
        "avg" | "mean" => "mean",
        "min" => "min",
        "max" => "max",
        "first" => "first",
        "last" => "last",
        "lower" => "lower",
        "upper" => "upper",
        "length" | "char_length" | "character_length" => "length",
        "abs" => "abs",
        "sqrt" => "sqrt",
        _ => return None,
    })
}

fn data_type_of(dt: &SqlDataType) -> Result<DataType> {
    let text = dt.to_string().to_uppercase();
    let base = text.split('(').next().unwrap_or("").trim();
    Ok(match base {
        "BOOLEAN" | "BOOL" => DataType::Boolean,
        "SMALLINT" | "INT2" | "INT4" | "INTEGER" | "INT" => DataType::Int32,
        "BIGINT" | "INT8" | "INT64" => DataType::Int64,
        "REAL" | "FLOAT4" | "FLOAT32" => DataType::Float32,
        "FLOAT" | "FLOAT8" | "FLOAT64" | "DOUBLE" | "DOUBLE PRECISION" => DataType::Float64,
        "TEXT" | "STRING" | "VARCHAR" | "CHAR" | "CHARACTER VARYING" => DataType::Utf8,
        "BYTEA" | "BLOB" | "BINARY" | "VARBINARY" => DataType::Binary,
        "DATE" => DataType::Date64,
        "DECIMAL" | "NUMERIC" => DataType::Decimal128,
        _ => return Err(Error::Unsupported(format!("CAST to {dt}"))),
    })
}
