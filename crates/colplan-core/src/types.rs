//! Lightweight logical value/column placeholders to avoid bringing Arrow into core.
//!
//! The reference engine in `colplan-exec` evaluates plans over these. They are
//! row-oriented `Vec<Scalar>` columns; real engines convert to Arrow arrays.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{DataType, Field, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    List(Vec<Scalar>),
    /// Positional struct value; names live in the column's `DataType::Struct`.
    Struct(Vec<Scalar>),
}

impl Scalar {
    /// Type of a literal value. Nested values get positional field names.
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Null,
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Bin(_) => DataType::Binary,
            Scalar::List(items) => DataType::List(Box::new(
                items
                    .iter()
                    .map(Scalar::data_type)
                    .find(|dt| *dt != DataType::Null)
                    .unwrap_or(DataType::Null),
            )),
            Scalar::Struct(values) => DataType::Struct(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Field::new(format!("field_{i}"), v.data_type(), true))
                    .collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view used for arithmetic and cross-type comparison.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I32(v) => Some(*v as f64),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I32(v) => Some(*v as i64),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v:?}"),
            Scalar::F64(v) => write!(f, "{v:?}"),
            Scalar::Str(s) => write!(f, "{s}"),
            Scalar::Bin(bytes) => write!(f, "{bytes:?}"),
            Scalar::List(items) | Scalar::Struct(items) => {
                let open = if matches!(self, Scalar::List(_)) { '[' } else { '{' };
                let close = if open == '[' { ']' } else { '}' };
                write!(f, "{open}")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "{close}")
            }
        }
    }
}

/// Minimal column representation. Replace with Arrow arrays downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Minimal row batch. Column order follows the producing node's schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowBatch {
    pub columns: Vec<Column>,
}

impl RowBatch {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Zero-row batch carrying the column names of `schema`.
    pub fn empty(schema: &Schema) -> Self {
        Self {
            columns: schema
                .fields
                .iter()
                .map(|f| Column::new(f.name.clone(), vec![]))
                .collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Values of one row, in column order.
    pub fn row(&self, idx: usize) -> Vec<Scalar> {
        self.columns
            .iter()
            .map(|c| c.values.get(idx).cloned().unwrap_or(Scalar::Null))
            .collect()
    }

    pub fn rows(&self) -> Vec<Vec<Scalar>> {
        (0..self.num_rows()).map(|i| self.row(i)).collect()
    }

    /// Gather rows by index (indices may repeat).
    pub fn take(&self, indices: &[usize]) -> RowBatch {
        RowBatch {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: indices.iter().map(|&i| c.values[i].clone()).collect(),
                })
                .collect(),
        }
    }

    pub fn slice(&self, offset: usize, len: usize) -> RowBatch {
        let start = offset.min(self.num_rows());
        let end = start.saturating_add(len).min(self.num_rows());
        RowBatch {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values[start..end].to_vec(),
                })
                .collect(),
        }
    }
}

/// Per-key ordering options for [`sort_permutation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    pub descending: bool,
    pub nulls_last: bool,
}

/// Stable permutation that orders rows by `keys` (left-to-right significant).
///
/// Each key is one full column of values; all keys must have equal length.
pub fn sort_permutation(keys: &[(Vec<Scalar>, SortOptions)]) -> Vec<usize> {
    let rows = keys.first().map(|(values, _)| values.len()).unwrap_or(0);
    let mut indices: Vec<usize> = (0..rows).collect();
    // `sort_by` is stable, so ties keep input order.
    indices.sort_by(|&a, &b| {
        for (values, opts) in keys {
            let (x, y) = (&values[a], &values[b]);
            let ord = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => null_order(opts),
                (false, true) => null_order(opts).reverse(),
                (false, false) => {
                    let ord = scalar_cmp(x, y);
                    if opts.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    indices
}

fn null_order(opts: &SortOptions) -> Ordering {
    if opts.nulls_last {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// Compare two scalars for sorting.
///
/// Nulls are sorted first, numbers compare across int/float widths, then
/// mixed types fall back to variant order.
pub fn scalar_cmp(a: &Scalar, b: &Scalar) -> Ordering {
    use Scalar::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Bool(x), Bool(y)) => x.cmp(y),
        (I32(x), I32(y)) => x.cmp(y),
        (I64(x), I64(y)) => x.cmp(y),
        (Str(x), Str(y)) => x.cmp(y),
        (Bin(x), Bin(y)) => x.cmp(y),
        (List(x), List(y)) | (Struct(x), Struct(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                match scalar_cmp(l, r) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => {
                if x.is_nan() && y.is_nan() {
                    Ordering::Equal
                } else if x.is_nan() {
                    Ordering::Greater
                } else if y.is_nan() {
                    Ordering::Less
                } else {
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            }
            // Mixed types: order by variant order
            _ => scalar_type_order(a).cmp(&scalar_type_order(b)),
        },
    }
}

/// Equality used for grouping and join keys: numeric values compare by value.
pub fn scalar_key_eq(a: &Scalar, b: &Scalar) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Assign a numeric order to scalar types for mixed-type comparisons.
fn scalar_type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F32(_) => 4,
        F64(_) => 5,
        Str(_) => 6,
        Bin(_) => 7,
        List(_) => 8,
        Struct(_) => 9,
    }
}

/// Hash a composite key (grouping or join) into a `u64` bucket id.
///
/// Integer and integral float values hash identically so that hashing agrees
/// with [`scalar_key_eq`]; buckets must still be confirmed with it.
pub fn hash_key(values: &[&Scalar]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    for value in values {
        hash_scalar(value, &mut hasher);
    }
    let hash = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(head)
}

/// Hash a scalar value into a hasher.
fn hash_scalar(scalar: &Scalar, hasher: &mut blake3::Hasher) {
    use Scalar::*;

    match scalar {
        Null => {
            hasher.update(&[0]);
        }
        Bool(b) => {
            hasher.update(&[1, *b as u8]);
        }
        I32(_) | I64(_) | F32(_) | F64(_) => {
            let v = scalar.as_f64().unwrap_or(f64::NAN);
            hasher.update(&[2]);
            hasher.update(&v.to_bits().to_le_bytes());
        }
        Str(s) => {
            hasher.update(&[6]);
            hasher.update(s.as_bytes());
            hasher.update(&[0xff]);
        }
        Bin(b) => {
            hasher.update(&[7]);
            hasher.update(&(b.len() as u64).to_le_bytes());
            hasher.update(b);
        }
        List(items) | Struct(items) => {
            hasher.update(&[scalar_type_order(scalar)]);
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                hash_scalar(item, hasher);
            }
        }
    }
}
