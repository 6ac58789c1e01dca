//! Evaluation of bound expressions over row batches.
//!
//! Expressions reaching the engine are bound: concrete columns, literals,
//! aliases, positional struct access, struct construction, functions,
//! operators and casts. Nulls propagate through arithmetic, comparisons and
//! scalar functions; `AND`/`OR` use three-valued logic.

use std::cmp::Ordering;

use colplan_core::expr::{is_aggregate_function, Expr, FieldSelector, Operator, UnaryOperator};
use colplan_core::schema::DataType;
use colplan_core::types::{scalar_cmp, RowBatch, Scalar};

use crate::runtime::ExecError;

/// Evaluate `expr` for every row of `batch`.
pub fn evaluate(expr: &Expr, batch: &RowBatch) -> Result<Vec<Scalar>, ExecError> {
    let rows = batch.num_rows();
    match expr {
        Expr::Column(name) => batch
            .column(name)
            .map(|c| c.values.clone())
            .ok_or_else(|| ExecError::MissingColumn(name.clone())),
        Expr::Literal(value) => Ok(vec![value.clone(); rows]),
        Expr::Alias(base, _) => evaluate(base, batch),
        Expr::Cast(base, dt) => evaluate(base, batch)?
            .iter()
            .map(|v| cast(v, dt))
            .collect(),
        Expr::BinaryOp { left, op, right } => {
            let (l, r) = (evaluate(left, batch)?, evaluate(right, batch)?);
            l.iter().zip(r.iter()).map(|(a, b)| binary(*op, a, b)).collect()
        }
        Expr::UnaryOp { op, expr } => evaluate(expr, batch)?
            .iter()
            .map(|v| unary(*op, v))
            .collect(),
        Expr::StructField(base, selectors) => {
            let idx = field_index(selectors)?;
            evaluate(base, batch)?
                .iter()
                .map(|v| struct_field(v, idx))
                .collect()
        }
        Expr::Struct(members) => {
            let columns = members
                .iter()
                .map(|m| evaluate(m, batch))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((0..rows)
                .map(|i| Scalar::Struct(columns.iter().map(|c| c[i].clone()).collect()))
                .collect())
        }
        Expr::Function { name, .. } if is_aggregate_function(name) => Err(
            ExecError::Unsupported(format!("aggregate '{name}' outside an aggregation")),
        ),
        Expr::Function { name, args, .. } => {
            let columns = args
                .iter()
                .map(|a| evaluate(a, batch))
                .collect::<Result<Vec<_>, _>>()?;
            (0..rows)
                .map(|i| {
                    let row: Vec<Scalar> = columns.iter().map(|c| c[i].clone()).collect();
                    scalar_function(name, &row)
                })
                .collect()
        }
        other => Err(ExecError::Unsupported(format!("unbound expression {other}"))),
    }
}

pub(crate) fn field_index(selectors: &[FieldSelector]) -> Result<usize, ExecError> {
    match selectors {
        [FieldSelector::Index(i)] if *i >= 0 => Ok(*i as usize),
        other => Err(ExecError::Unsupported(format!("unbound struct access {other:?}"))),
    }
}

pub(crate) fn struct_field(value: &Scalar, idx: usize) -> Result<Scalar, ExecError> {
    match value {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Struct(values) => values
            .get(idx)
            .cloned()
            .ok_or_else(|| ExecError::Invalid(format!("struct has no field at position {idx}"))),
        other => Err(ExecError::Type(format!(
            "field access on non-struct value {other}"
        ))),
    }
}

pub fn binary(op: Operator, a: &Scalar, b: &Scalar) -> Result<Scalar, ExecError> {
    use Scalar::*;
    match op {
        Operator::And => Ok(match (a.as_bool(), b.as_bool()) {
            (Some(false), _) | (_, Some(false)) => Bool(false),
            (Some(true), Some(true)) => Bool(true),
            _ => Null,
        }),
        Operator::Or => Ok(match (a.as_bool(), b.as_bool()) {
            (Some(true), _) | (_, Some(true)) => Bool(true),
            (Some(false), Some(false)) => Bool(false),
            _ => Null,
        }),
        _ if a.is_null() || b.is_null() => Ok(Null),
        op if op.is_comparison() => compare(op, a, b),
        op => arithmetic(op, a, b),
    }
}

fn compare(op: Operator, a: &Scalar, b: &Scalar) -> Result<Scalar, ExecError> {
    use Scalar::*;
    let ord = match (a, b) {
        (Str(x), Str(y)) => Some(x.cmp(y)),
        (Bool(x), Bool(y)) => Some(x.cmp(y)),
        (Bin(_), Bin(_)) | (List(_), List(_)) | (Struct(_), Struct(_)) => Some(scalar_cmp(a, b)),
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => match (a.as_f64(), b.as_f64()) {
                // NaN is unordered
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => {
                    return Err(ExecError::Type(format!(
                        "cannot compare {} with {}",
                        a.data_type(),
                        b.data_type()
                    )))
                }
            },
        },
    };
    let result = match ord {
        None => op == Operator::NotEq,
        Some(ord) => match op {
            Operator::Eq => ord == Ordering::Equal,
            Operator::NotEq => ord != Ordering::Equal,
            Operator::Lt => ord == Ordering::Less,
            Operator::LtEq => ord != Ordering::Greater,
            Operator::Gt => ord == Ordering::Greater,
            Operator::GtEq => ord != Ordering::Less,
            other => {
                return Err(ExecError::Invalid(format!(
                    "'{}' is not a comparison",
                    other.symbol()
                )))
            }
        },
    };
    Ok(Bool(result))
}

fn arithmetic(op: Operator, a: &Scalar, b: &Scalar) -> Result<Scalar, ExecError> {
    use Scalar::*;
    if op == Operator::Divide {
        let (x, y) = floats(op, a, b)?;
        return Ok(F64(x / y));
    }
    match (a, b) {
        (I32(x), I32(y)) => match checked_int(op, *x as i64, *y as i64)? {
            Some(v) => i32::try_from(v)
                .map(I32)
                .map_err(|_| ExecError::Overflow(format!("{x} {} {y}", op.symbol()))),
            None => Ok(Null),
        },
        (F32(x), F32(y)) => Ok(F32(float_op(op, *x as f64, *y as f64) as f32)),
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Ok(checked_int(op, x, y)?.map(I64).unwrap_or(Null)),
            _ => {
                let (x, y) = floats(op, a, b)?;
                Ok(F64(float_op(op, x, y)))
            }
        },
    }
}

/// Integer arithmetic; `None` for modulo by zero.
fn checked_int(op: Operator, x: i64, y: i64) -> Result<Option<i64>, ExecError> {
    let result = match op {
        Operator::Plus => x.checked_add(y),
        Operator::Minus => x.checked_sub(y),
        Operator::Multiply => x.checked_mul(y),
        Operator::Modulo if y == 0 => return Ok(None),
        Operator::Modulo => x.checked_rem(y),
        other => {
            return Err(ExecError::Invalid(format!(
                "'{}' is not arithmetic",
                other.symbol()
            )))
        }
    };
    result
        .map(Some)
        .ok_or_else(|| ExecError::Overflow(format!("{x} {} {y}", op.symbol())))
}

fn float_op(op: Operator, x: f64, y: f64) -> f64 {
    match op {
        Operator::Plus => x + y,
        Operator::Minus => x - y,
        Operator::Multiply => x * y,
        Operator::Modulo => x % y,
        _ => x / y,
    }
}

fn floats(op: Operator, a: &Scalar, b: &Scalar) -> Result<(f64, f64), ExecError> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ExecError::Type(format!(
            "operator '{}' is not defined for {} and {}",
            op.symbol(),
            a.data_type(),
            b.data_type()
        ))),
    }
}

pub fn unary(op: UnaryOperator, value: &Scalar) -> Result<Scalar, ExecError> {
    use Scalar::*;
    match (op, value) {
        (UnaryOperator::IsNull, v) => Ok(Bool(v.is_null())),
        (UnaryOperator::IsNotNull, v) => Ok(Bool(!v.is_null())),
        (_, Null) => Ok(Null),
        (UnaryOperator::Not, Bool(b)) => Ok(Bool(!b)),
        (UnaryOperator::Negate, I32(v)) => v
            .checked_neg()
            .map(I32)
            .ok_or_else(|| ExecError::Overflow(format!("-{v}"))),
        (UnaryOperator::Negate, I64(v)) => v
            .checked_neg()
            .map(I64)
            .ok_or_else(|| ExecError::Overflow(format!("-{v}"))),
        (UnaryOperator::Negate, F32(v)) => Ok(F32(-v)),
        (UnaryOperator::Negate, F64(v)) => Ok(F64(-v)),
        (op, v) => Err(ExecError::Type(format!(
            "{op:?} is not defined for {}",
            v.data_type()
        ))),
    }
}

/// Row-wise functions. A null first argument yields null.
pub fn scalar_function(name: &str, args: &[Scalar]) -> Result<Scalar, ExecError> {
    use Scalar::*;
    let first = args.first().unwrap_or(&Null);
    if first.is_null() {
        return Ok(Null);
    }
    match name {
        "lower" => Ok(Str(text(name, first)?.to_lowercase())),
        "upper" => Ok(Str(text(name, first)?.to_uppercase())),
        "length" => Ok(I64(text(name, first)?.chars().count() as i64)),
        "trim" => {
            let chars = match args.get(1) {
                None | Some(Null) => None,
                Some(Str(set)) => Some(set.as_str()),
                Some(other) => {
                    return Err(ExecError::Type(format!(
                        "trim characters must be a string, got {other}"
                    )))
                }
            };
            let side = args.get(2).and_then(Scalar::as_str).unwrap_or("both");
            Ok(Str(trim(text(name, first)?, chars, side)))
        }
        "abs" => match first {
            I32(v) => v
                .checked_abs()
                .map(I32)
                .ok_or_else(|| ExecError::Overflow(format!("abs({v})"))),
            I64(v) => v
                .checked_abs()
                .map(I64)
                .ok_or_else(|| ExecError::Overflow(format!("abs({v})"))),
            F32(v) => Ok(F32(v.abs())),
            F64(v) => Ok(F64(v.abs())),
            other => Err(ExecError::Type(format!("abs of {}", other.data_type()))),
        },
        "sqrt" => first
            .as_f64()
            .map(|v| F64(v.sqrt()))
            .ok_or_else(|| ExecError::Type(format!("sqrt of {}", first.data_type()))),
        other => Err(ExecError::Unsupported(format!("function '{other}'"))),
    }
}

fn text<'a>(func: &str, value: &'a Scalar) -> Result<&'a str, ExecError> {
    value
        .as_str()
        .ok_or_else(|| ExecError::Type(format!("{func} expects a string, got {}", value.data_type())))
}

/// Strip `chars` (whitespace when `None`) from the requested side(s).
fn trim(s: &str, chars: Option<&str>, side: &str) -> String {
    let strip = |c: char| match chars {
        Some(set) => set.contains(c),
        None => c.is_whitespace(),
    };
    match side {
        "leading" => s.trim_start_matches(strip),
        "trailing" => s.trim_end_matches(strip),
        _ => s.trim_matches(strip),
    }
    .to_string()
}

pub fn cast(value: &Scalar, to: &DataType) -> Result<Scalar, ExecError> {
    use Scalar::*;
    if value.is_null() {
        return Ok(Null);
    }
    let fail = || ExecError::Cast {
        value: value.to_string(),
        to: to.to_string(),
    };
    Ok(match to {
        DataType::Null => Null,
        DataType::Boolean => match value {
            Bool(b) => Bool(*b),
            Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Bool(true),
                "false" => Bool(false),
                _ => return Err(fail()),
            },
            other => Bool(other.as_f64().ok_or_else(fail)? != 0.0),
        },
        DataType::Int64 | DataType::Date64 => I64(to_i64(value).ok_or_else(fail)?),
        DataType::Int32 => I32(
            to_i64(value)
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(fail)?,
        ),
        DataType::Float64 | DataType::Decimal128 => F64(to_f64(value).ok_or_else(fail)?),
        DataType::Float32 => F32(to_f64(value).ok_or_else(fail)? as f32),
        DataType::Utf8 => match value {
            Str(s) => Str(s.clone()),
            other => Str(other.to_string()),
        },
        DataType::Binary => match value {
            Bin(b) => Bin(b.clone()),
            Str(s) => Bin(s.as_bytes().to_vec()),
            _ => return Err(fail()),
        },
        DataType::List(_) | DataType::Struct(_) => match value {
            List(_) | Struct(_) => value.clone(),
            _ => return Err(fail()),
        },
    })
}

fn to_i64(value: &Scalar) -> Option<i64> {
    match value {
        Scalar::I32(_) | Scalar::I64(_) => value.as_i64(),
        Scalar::F32(_) | Scalar::F64(_) => {
            let f = value.as_f64()?.trunc();
            (f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
        }
        Scalar::Bool(b) => Some(*b as i64),
        Scalar::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_f64(value: &Scalar) -> Option<f64> {
    value.as_f64().or(match value {
        Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Scalar::Str(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use colplan_core::expr::{col, lit};
    use colplan_core::types::Column;

    #[test]
    fn three_valued_logic() {
        let t = Scalar::Bool(true);
        let f = Scalar::Bool(false);
        let n = Scalar::Null;
        assert_eq!(binary(Operator::And, &n, &f).unwrap(), f);
        assert_eq!(binary(Operator::And, &n, &t).unwrap(), n);
        assert_eq!(binary(Operator::Or, &n, &t).unwrap(), t);
        assert_eq!(binary(Operator::Or, &n, &f).unwrap(), n);
        assert_eq!(binary(Operator::Gt, &n, &Scalar::I64(1)).unwrap(), n);
        assert_eq!(unary(UnaryOperator::Not, &n).unwrap(), n);
        assert_eq!(unary(UnaryOperator::IsNull, &n).unwrap(), t);
    }

    #[test]
    fn numeric_promotion() {
        assert_eq!(
            binary(Operator::Plus, &Scalar::I64(2), &Scalar::F64(0.5)).unwrap(),
            Scalar::F64(2.5)
        );
        assert_eq!(
            binary(Operator::Divide, &Scalar::I64(7), &Scalar::I64(2)).unwrap(),
            Scalar::F64(3.5)
        );
        assert_eq!(
            binary(Operator::Modulo, &Scalar::I64(7), &Scalar::I64(0)).unwrap(),
            Scalar::Null
        );
        assert!(matches!(
            binary(Operator::Plus, &Scalar::I64(i64::MAX), &Scalar::I64(1)),
            Err(ExecError::Overflow(_))
        ));
        assert_eq!(
            binary(Operator::Lt, &Scalar::I32(3), &Scalar::F64(3.5)).unwrap(),
            Scalar::Bool(true)
        );
    }

    #[test]
    fn trim_sides_and_sets() {
        let s = |v: &str| Scalar::Str(v.to_string());
        assert_eq!(
            scalar_function("trim", &[s("  x  "), Scalar::Null, s("both")]).unwrap(),
            s("x")
        );
        assert_eq!(
            scalar_function("trim", &[s("vegetables"), s("v"), s("leading")]).unwrap(),
            s("egetables")
        );
        assert_eq!(
            scalar_function("trim", &[s("xxaxx"), s("x"), s("trailing")]).unwrap(),
            s("xxa")
        );
        assert_eq!(scalar_function("length", &[s("héllo")]).unwrap(), Scalar::I64(5));
    }

    #[test]
    fn casts() {
        assert_eq!(
            cast(&Scalar::Str(" 42 ".into()), &DataType::Int64).unwrap(),
            Scalar::I64(42)
        );
        assert_eq!(cast(&Scalar::F64(2.9), &DataType::Int32).unwrap(), Scalar::I32(2));
        assert_eq!(
            cast(&Scalar::I64(1), &DataType::Utf8).unwrap(),
            Scalar::Str("1".into())
        );
        assert!(matches!(
            cast(&Scalar::Str("abc".into()), &DataType::Float64),
            Err(ExecError::Cast { .. })
        ));
    }

    #[test]
    fn evaluates_columns_and_struct_access() {
        let batch = RowBatch::new(vec![
            Column::new("a", vec![Scalar::I64(1), Scalar::I64(2)]),
            Column::new(
                "s",
                vec![
                    Scalar::Struct(vec![Scalar::I64(10), Scalar::Str("p".into())]),
                    Scalar::Null,
                ],
            ),
        ]);
        assert_eq!(
            evaluate(&(col("a") * lit(3i64)), &batch).unwrap(),
            vec![Scalar::I64(3), Scalar::I64(6)]
        );
        assert_eq!(
            evaluate(&col("s").field_at(1), &batch).unwrap(),
            vec![Scalar::Str("p".into()), Scalar::Null]
        );
        assert!(matches!(
            evaluate(&col("zz"), &batch),
            Err(ExecError::MissingColumn(_))
        ));
        assert!(matches!(
            evaluate(&col("a").sum(), &batch),
            Err(ExecError::Unsupported(_))
        ));
    }
}
