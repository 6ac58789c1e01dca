//! CSV loading with per-column type inference.
//!
//! A column is `Int64` if every non-empty field parses as an integer, else
//! `Float64`, else `Boolean` (`true`/`false`, any case), else `Utf8`. Empty
//! fields are nulls.

use std::io::Read;
use std::path::Path;

use colplan_core::schema::{DataType, Field, Schema};
use colplan_core::types::{Column, RowBatch, Scalar};

pub type LoadResult<T> = Result<T, Box<dyn std::error::Error>>;

pub fn load_csv(path: &Path) -> LoadResult<(Schema, RowBatch)> {
    let file = std::fs::File::open(path)
        .map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    read_csv(file)
}

pub fn read_csv<R: Read>(reader: R) -> LoadResult<(Schema, RowBatch)> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record?;
        if record.len() != headers.len() {
            return Err(format!(
                "row has {} fields, header has {}",
                record.len(),
                headers.len()
            )
            .into());
        }
        for (col, value) in raw.iter_mut().zip(record.iter()) {
            col.push(value.to_string());
        }
    }

    let mut fields = Vec::with_capacity(headers.len());
    let mut columns = Vec::with_capacity(headers.len());
    for (name, values) in headers.into_iter().zip(raw) {
        let data_type = infer_type(&values);
        let nullable = values.iter().any(|v| v.is_empty());
        let values = values.iter().map(|v| parse_value(v, &data_type)).collect();
        fields.push(Field::new(name.clone(), data_type, nullable));
        columns.push(Column::new(name, values));
    }
    Ok((Schema::try_new(fields)?, RowBatch::new(columns)))
}

fn infer_type(values: &[String]) -> DataType {
    let present: Vec<&str> = values
        .iter()
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .collect();
    if present.is_empty() {
        DataType::Utf8
    } else if present.iter().all(|v| v.parse::<i64>().is_ok()) {
        DataType::Int64
    } else if present.iter().all(|v| v.parse::<f64>().is_ok()) {
        DataType::Float64
    } else if present.iter().all(|v| parse_bool(v).is_some()) {
        DataType::Boolean
    } else {
        DataType::Utf8
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_value(v: &str, data_type: &DataType) -> Scalar {
    if v.is_empty() {
        return Scalar::Null;
    }
    let parsed = match data_type {
        DataType::Int64 => v.parse().ok().map(Scalar::I64),
        DataType::Float64 => v.parse().ok().map(Scalar::F64),
        DataType::Boolean => parse_bool(v).map(Scalar::Bool),
        _ => None,
    };
    parsed.unwrap_or_else(|| Scalar::Str(v.to_string()))
}
