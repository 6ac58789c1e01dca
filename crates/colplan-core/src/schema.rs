//! Logical schema types. Pure data; no Arrow dependency here.
//!
//! A `Schema` is an ordered, name-unique list of fields. Column order is the
//! emission order of every plan node, so nothing in this module reorders.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
    Date64,
    Decimal128,
    List(Box<DataType>),
    /// Field order is significant (positional access and `*` expansion).
    Struct(Vec<Field>),
}

impl DataType {
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float() || matches!(self, DataType::Decimal128)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date64)
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, DataType::List(_) | DataType::Struct(_))
    }

    /// Fields of a struct type, `None` for every other type.
    pub fn struct_fields(&self) -> Option<&[Field]> {
        match self {
            DataType::Struct(fields) => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "null"),
            DataType::Boolean => write!(f, "bool"),
            DataType::Int32 => write!(f, "i32"),
            DataType::Int64 => write!(f, "i64"),
            DataType::Float32 => write!(f, "f32"),
            DataType::Float64 => write!(f, "f64"),
            DataType::Utf8 => write!(f, "str"),
            DataType::Binary => write!(f, "binary"),
            DataType::Date64 => write!(f, "date"),
            DataType::Decimal128 => write!(f, "decimal"),
            DataType::List(inner) => write!(f, "list[{inner}]"),
            DataType::Struct(fields) => {
                write!(f, "struct[")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.data_type)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    /// Build a schema without checking name uniqueness.
    ///
    /// Plan nodes go through [`Schema::try_new`]; this constructor is for
    /// sources whose field list is already known to be valid.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Build a schema, rejecting duplicate column names.
    pub fn try_new(fields: Vec<Field>) -> Result<Self> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::AmbiguousColumn(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field.name, field.data_type)?;
        }
        write!(f, "]")
    }
}

/// One member of a type-class set used by dtype selectors and exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeClass {
    Exact(DataType),
    Numeric,
    Integer,
    Float,
    Text,
    Temporal,
    List,
    Struct,
}

impl TypeClass {
    pub fn matches(&self, dt: &DataType) -> bool {
        match self {
            TypeClass::Exact(expected) => expected == dt,
            TypeClass::Numeric => dt.is_numeric(),
            TypeClass::Integer => dt.is_integer(),
            TypeClass::Float => dt.is_float(),
            TypeClass::Text => matches!(dt, DataType::Utf8),
            TypeClass::Temporal => dt.is_temporal(),
            TypeClass::List => matches!(dt, DataType::List(_)),
            TypeClass::Struct => matches!(dt, DataType::Struct(_)),
        }
    }

    /// True if any class in `set` matches `dt`.
    pub fn any_matches(set: &[TypeClass], dt: &DataType) -> bool {
        set.iter().any(|class| class.matches(dt))
    }
}

impl From<DataType> for TypeClass {
    fn from(dt: DataType) -> Self {
        TypeClass::Exact(dt)
    }
}

/// Exact numeric types, for selectors written as a set of concrete types.
pub const NUMERIC_TYPES: [DataType; 5] = [
    DataType::Int32,
    DataType::Int64,
    DataType::Float32,
    DataType::Float64,
    DataType::Decimal128,
];
