//! Output type inference for bound expressions.

use colplan_core::error::{Error, Result};
use colplan_core::expr::{Operator, UnaryOperator};
use colplan_core::schema::DataType;

/// Result type of `name(args..)`.
pub fn function_type(name: &str, args: &[DataType]) -> Result<DataType> {
    let first = args.first().cloned().unwrap_or(DataType::Null);
    match name {
        "count" | "n_unique" => Ok(DataType::Int64),
        "min" | "max" | "first" | "last" => Ok(first),
        "sum" => {
            require_numeric(name, &first)?;
            Ok(match first {
                DataType::Int32 => DataType::Int64,
                other => other,
            })
        }
        "mean" | "sqrt" => {
            require_numeric(name, &first)?;
            Ok(DataType::Float64)
        }
        "abs" => {
            require_numeric(name, &first)?;
            Ok(first)
        }
        "trim" | "lower" | "upper" => {
            require_text(name, &first)?;
            Ok(DataType::Utf8)
        }
        "length" => {
            require_text(name, &first)?;
            Ok(DataType::Int64)
        }
        other => Err(Error::Plan(format!("unknown function '{other}'"))),
    }
}

pub fn binary_type(op: Operator, left: &DataType, right: &DataType) -> Result<DataType> {
    if op.is_comparison() {
        return Ok(DataType::Boolean);
    }
    if op.is_logical() {
        for side in [left, right] {
            if !matches!(side, DataType::Boolean | DataType::Null) {
                return Err(Error::Schema(format!(
                    "operator '{}' expects boolean operands, got {side}",
                    op.symbol()
                )));
            }
        }
        return Ok(DataType::Boolean);
    }

    match (left, right) {
        (DataType::Null, other) | (other, DataType::Null) => Ok(other.clone()),
        (l, r) if l.is_numeric() && r.is_numeric() => Ok(arithmetic_type(op, l, r)),
        (l, r) => Err(Error::Schema(format!(
            "operator '{}' is not defined for {l} and {r}",
            op.symbol()
        ))),
    }
}

fn arithmetic_type(op: Operator, l: &DataType, r: &DataType) -> DataType {
    use DataType::*;
    if op == Operator::Divide {
        return Float64;
    }
    match (l, r) {
        (Float32, Float32) => Float32,
        (l, r) if l.is_float() || r.is_float() => Float64,
        (Decimal128, _) | (_, Decimal128) => Float64,
        (Int32, Int32) => Int32,
        _ => Int64,
    }
}

pub fn unary_type(op: UnaryOperator, input: &DataType) -> Result<DataType> {
    match op {
        UnaryOperator::IsNull | UnaryOperator::IsNotNull => Ok(DataType::Boolean),
        UnaryOperator::Not => match input {
            DataType::Boolean | DataType::Null => Ok(DataType::Boolean),
            other => Err(Error::Schema(format!("cannot negate non-boolean {other}"))),
        },
        UnaryOperator::Negate => {
            require_numeric("negate", input)?;
            Ok(input.clone())
        }
    }
}

fn require_numeric(func: &str, dt: &DataType) -> Result<()> {
    if dt.is_numeric() || *dt == DataType::Null {
        Ok(())
    } else {
        Err(Error::Schema(format!("{func} expects a numeric input, got {dt}")))
    }
}

fn require_text(func: &str, dt: &DataType) -> Result<()> {
    if matches!(dt, DataType::Utf8 | DataType::Null) {
        Ok(())
    } else {
        Err(Error::Schema(format!("{func} expects a string input, got {dt}")))
    }
}
