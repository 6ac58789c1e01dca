//! Expression tree for column-producing computations, including selectors.
//!
//! Selector variants (`Wildcard`, `Regex`, `Columns`, `DtypeSelector`,
//! `Exclude`, multi-field `StructField`) expand to zero or more concrete
//! columns; the resolver in `colplan-planner` rewrites them into *bound*
//! expressions that contain only concrete references.
//!
//! The `^...$` regex convention is recognised only by the builder functions in
//! this module (`col`, `exclude`, `Expr::field`, ...). Once an `Expr` exists,
//! a `Column` name is always literal.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

use serde::{Deserialize, Serialize};

use crate::schema::{DataType, TypeClass};
use crate::types::Scalar;

/// Function names that reduce a group of rows to one value.
pub const AGGREGATE_FUNCTIONS: [&str; 8] =
    ["count", "sum", "mean", "min", "max", "first", "last", "n_unique"];

/// Row-wise functions understood by the planner and the reference engine.
pub const SCALAR_FUNCTIONS: [&str; 6] = ["trim", "lower", "upper", "length", "abs", "sqrt"];

pub fn is_aggregate_function(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.contains(&name)
}

pub fn is_known_function(name: &str) -> bool {
    is_aggregate_function(name) || SCALAR_FUNCTIONS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

impl Operator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::NotEq
                | Operator::Lt
                | Operator::LtEq
                | Operator::Gt
                | Operator::GtEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::And => "&",
            Operator::Or => "|",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Negate,
    IsNull,
    IsNotNull,
}

/// One entry of an `Exclude` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Exclusion {
    /// Literal column name; names absent from the schema are ignored.
    Name(String),
    Types(Vec<TypeClass>),
    /// Nested selector, resolved against the schema the `Exclude` node sees.
    Selector(Expr),
}

impl From<&str> for Exclusion {
    fn from(name: &str) -> Self {
        if is_regex_convention(name) {
            Exclusion::Selector(Expr::Regex(name.to_string()))
        } else {
            Exclusion::Name(name.to_string())
        }
    }
}

impl From<String> for Exclusion {
    fn from(name: String) -> Self {
        Exclusion::from(name.as_str())
    }
}

impl From<DataType> for Exclusion {
    fn from(dt: DataType) -> Self {
        Exclusion::Types(vec![TypeClass::Exact(dt)])
    }
}

impl From<TypeClass> for Exclusion {
    fn from(class: TypeClass) -> Self {
        Exclusion::Types(vec![class])
    }
}

impl From<Vec<TypeClass>> for Exclusion {
    fn from(classes: Vec<TypeClass>) -> Self {
        Exclusion::Types(classes)
    }
}

impl From<Expr> for Exclusion {
    fn from(expr: Expr) -> Self {
        match expr {
            Expr::Column(name) => Exclusion::Name(name),
            other => Exclusion::Selector(other),
        }
    }
}

/// Which struct fields a `StructField` access selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSelector {
    Name(String),
    /// Position in declaration order; negative values count from the end.
    Index(i64),
    Pattern(String),
    All,
}

impl From<&str> for FieldSelector {
    fn from(spec: &str) -> Self {
        if spec == "*" {
            FieldSelector::All
        } else if is_regex_convention(spec) {
            FieldSelector::Pattern(spec.to_string())
        } else {
            FieldSelector::Name(spec.to_string())
        }
    }
}

impl From<String> for FieldSelector {
    fn from(spec: String) -> Self {
        FieldSelector::from(spec.as_str())
    }
}

impl From<i64> for FieldSelector {
    fn from(idx: i64) -> Self {
        FieldSelector::Index(idx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenameOp {
    Prefix(String),
    Suffix(String),
}

impl RenameOp {
    pub fn apply(&self, name: &str) -> String {
        match self {
            RenameOp::Prefix(p) => format!("{p}{name}"),
            RenameOp::Suffix(s) => format!("{name}{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Column(String),
    Wildcard,
    /// Anchored pattern, kept exactly as written (`^...$`).
    Regex(String),
    /// Explicit name list; emitted in the given order.
    Columns(Vec<String>),
    DtypeSelector(Vec<TypeClass>),
    Exclude(Box<Expr>, Vec<Exclusion>),
    StructField(Box<Expr>, Vec<FieldSelector>),
    /// Rebuild a struct with fields overridden/added by the modifiers, which
    /// are evaluated against the struct's own fields.
    WithFields(Box<Expr>, Vec<Expr>),
    Struct(Vec<Expr>),
    Alias(Box<Expr>, String),
    RenameOutputs(Box<Expr>, RenameOp),
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    BinaryOp {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Literal(Scalar),
    Cast(Box<Expr>, DataType),
}

/// A bound expression together with the name of the column it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpr {
    pub name: String,
    pub expr: Expr,
}

impl NamedExpr {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }

    /// Plain pass-through of an input column.
    pub fn column(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            expr: Expr::Column(name.clone()),
            name,
        }
    }
}

fn is_regex_convention(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('^') && name.ends_with('$')
}

/// Column reference; `"*"` selects everything and `^...$` is a regex selector.
pub fn col(name: &str) -> Expr {
    if name == "*" {
        Expr::Wildcard
    } else if is_regex_convention(name) {
        Expr::Regex(name.to_string())
    } else {
        Expr::Column(name.to_string())
    }
}

/// Explicit, ordered list of column names.
pub fn cols<I, S>(names: I) -> Expr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Expr::Columns(names.into_iter().map(Into::into).collect())
}

pub fn all() -> Expr {
    Expr::Wildcard
}

/// Every column of exactly type `dt`.
pub fn dtype_col(dt: DataType) -> Expr {
    Expr::DtypeSelector(vec![TypeClass::Exact(dt)])
}

pub fn dtype_cols<I>(classes: I) -> Expr
where
    I: IntoIterator<Item = TypeClass>,
{
    Expr::DtypeSelector(classes.into_iter().collect())
}

/// Every column except the given exclusions.
pub fn exclude<I, E>(items: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: Into<Exclusion>,
{
    Expr::Wildcard.exclude(items)
}

/// Reference to a struct field inside `with_fields`.
pub fn field(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

pub fn lit(value: impl Into<Scalar>) -> Expr {
    Expr::Literal(value.into())
}

pub fn struct_<I>(exprs: I) -> Expr
where
    I: IntoIterator<Item = Expr>,
{
    Expr::Struct(exprs.into_iter().collect())
}

/// Row count per group (`COUNT(*)`).
pub fn count_star() -> Expr {
    function("count", vec![])
}

pub fn function(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.to_string(),
        args,
        distinct: false,
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::I32(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

macro_rules! unary_fn {
    ($($method:ident => $name:literal),* $(,)?) => {
        $(
            pub fn $method(self) -> Expr {
                function($name, vec![self])
            }
        )*
    };
}

impl Expr {
    pub fn alias(self, name: &str) -> Expr {
        Expr::Alias(Box::new(self), name.to_string())
    }

    /// `name.prefix`: prepend to every output name.
    pub fn prefix(self, prefix: &str) -> Expr {
        Expr::RenameOutputs(Box::new(self), RenameOp::Prefix(prefix.to_string()))
    }

    /// `name.suffix`: append to every output name.
    pub fn suffix(self, suffix: &str) -> Expr {
        Expr::RenameOutputs(Box::new(self), RenameOp::Suffix(suffix.to_string()))
    }

    pub fn exclude<I, E>(self, items: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: Into<Exclusion>,
    {
        Expr::Exclude(Box::new(self), items.into_iter().map(Into::into).collect())
    }

    /// Struct field access by name, `"*"` (all fields) or `^...$` pattern.
    pub fn field(self, spec: &str) -> Expr {
        Expr::StructField(Box::new(self), vec![FieldSelector::from(spec)])
    }

    pub fn field_at(self, idx: i64) -> Expr {
        Expr::StructField(Box::new(self), vec![FieldSelector::Index(idx)])
    }

    /// Several struct fields at once; always expands to one column per field.
    pub fn fields<I, F>(self, specs: I) -> Expr
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldSelector>,
    {
        Expr::StructField(Box::new(self), specs.into_iter().map(Into::into).collect())
    }

    pub fn with_fields<I>(self, modifiers: I) -> Expr
    where
        I: IntoIterator<Item = Expr>,
    {
        Expr::WithFields(Box::new(self), modifiers.into_iter().collect())
    }

    pub fn cast(self, dt: DataType) -> Expr {
        Expr::Cast(Box::new(self), dt)
    }

    fn binary(self, op: Operator, other: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(other),
        }
    }

    pub fn eq(self, other: Expr) -> Expr {
        self.binary(Operator::Eq, other)
    }

    pub fn neq(self, other: Expr) -> Expr {
        self.binary(Operator::NotEq, other)
    }

    pub fn lt(self, other: Expr) -> Expr {
        self.binary(Operator::Lt, other)
    }

    pub fn lt_eq(self, other: Expr) -> Expr {
        self.binary(Operator::LtEq, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        self.binary(Operator::Gt, other)
    }

    pub fn gt_eq(self, other: Expr) -> Expr {
        self.binary(Operator::GtEq, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        self.binary(Operator::And, other)
    }

    pub fn or(self, other: Expr) -> Expr {
        self.binary(Operator::Or, other)
    }

    /// Inclusive range check: `self >= low AND self <= high`.
    pub fn is_between(self, low: Expr, high: Expr) -> Expr {
        self.clone().gt_eq(low).and(self.lt_eq(high))
    }

    fn unary(self, op: UnaryOperator) -> Expr {
        Expr::UnaryOp {
            op,
            expr: Box::new(self),
        }
    }

    pub fn not(self) -> Expr {
        self.unary(UnaryOperator::Not)
    }

    pub fn is_null(self) -> Expr {
        self.unary(UnaryOperator::IsNull)
    }

    pub fn is_not_null(self) -> Expr {
        self.unary(UnaryOperator::IsNotNull)
    }

    unary_fn! {
        count => "count",
        sum => "sum",
        mean => "mean",
        min => "min",
        max => "max",
        first => "first",
        last => "last",
        n_unique => "n_unique",
        sqrt => "sqrt",
        abs => "abs",
        lower => "lower",
        upper => "upper",
        length => "length",
    }

    /// `COUNT(DISTINCT self)`.
    pub fn count_distinct(self) -> Expr {
        Expr::Function {
            name: "count".to_string(),
            args: vec![self],
            distinct: true,
        }
    }

    /// True for variants whose output count depends on the schema.
    pub fn is_selector(&self) -> bool {
        match self {
            Expr::Wildcard
            | Expr::Regex(_)
            | Expr::Columns(_)
            | Expr::DtypeSelector(_)
            | Expr::Exclude(..) => true,
            Expr::StructField(_, selectors) => {
                selectors.len() != 1
                    || matches!(selectors[0], FieldSelector::All | FieldSelector::Pattern(_))
            }
            _ => false,
        }
    }

    /// True if any aggregate function appears in this tree.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if let Expr::Function { name, .. } = e {
                found |= is_aggregate_function(name);
            }
        });
        found
    }

    /// Pre-order walk over this tree.
    ///
    /// `WithFields` modifiers are skipped: they reference struct fields, not
    /// columns of the enclosing schema.
    pub fn visit<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match self {
            Expr::Column(_)
            | Expr::Wildcard
            | Expr::Regex(_)
            | Expr::Columns(_)
            | Expr::DtypeSelector(_)
            | Expr::Literal(_) => {}
            Expr::Exclude(base, _)
            | Expr::StructField(base, _)
            | Expr::WithFields(base, _)
            | Expr::Alias(base, _)
            | Expr::RenameOutputs(base, _)
            | Expr::Cast(base, _) => base.visit(f),
            Expr::UnaryOp { expr, .. } => expr.visit(f),
            Expr::Struct(exprs) | Expr::Function { args: exprs, .. } => {
                for e in exprs {
                    e.visit(f);
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
        }
    }

    /// Concrete column names referenced by a bound expression, first-seen order.
    pub fn column_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = Vec::new();
        self.visit(&mut |e| match e {
            Expr::Column(name) => {
                if !refs.contains(name) {
                    refs.push(name.clone());
                }
            }
            Expr::Columns(names) => {
                for name in names {
                    if !refs.contains(name) {
                        refs.push(name.clone());
                    }
                }
            }
            _ => {}
        });
        refs
    }

    /// Output name of a single-output expression, before any schema lookup.
    ///
    /// Derived names follow the leftmost input column; selectors have none.
    pub fn output_name(&self) -> Option<String> {
        match self {
            Expr::Column(name) | Expr::Alias(_, name) => Some(name.clone()),
            Expr::RenameOutputs(base, op) => base.output_name().map(|n| op.apply(&n)),
            Expr::Function { name, args, .. } => match args.first() {
                Some(first) => first.output_name(),
                None => Some(name.clone()),
            },
            Expr::BinaryOp { left, .. } => left.output_name(),
            Expr::UnaryOp { expr, .. } => expr.output_name(),
            Expr::Cast(base, _) | Expr::WithFields(base, _) => base.output_name(),
            Expr::Struct(exprs) => exprs.first().and_then(Expr::output_name),
            Expr::Literal(_) => Some("literal".to_string()),
            Expr::StructField(_, selectors) => match selectors.as_slice() {
                [FieldSelector::Name(name)] => Some(name.clone()),
                _ => None,
            },
            Expr::Wildcard
            | Expr::Regex(_)
            | Expr::Columns(_)
            | Expr::DtypeSelector(_)
            | Expr::Exclude(..) => None,
        }
    }
}

impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        self.binary(Operator::Plus, rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        self.binary(Operator::Minus, rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        self.binary(Operator::Multiply, rhs)
    }
}

impl Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        self.binary(Operator::Divide, rhs)
    }
}

impl Rem for Expr {
    type Output = Expr;
    fn rem(self, rhs: Expr) -> Expr {
        self.binary(Operator::Modulo, rhs)
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        self.unary(UnaryOperator::Negate)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "col(\"{name}\")"),
            Expr::Wildcard => write!(f, "*"),
            Expr::Regex(p) => write!(f, "col(\"{p}\")"),
            Expr::Columns(names) => write!(f, "cols({})", names.join(", ")),
            Expr::DtypeSelector(classes) => write!(f, "dtype_cols({classes:?})"),
            Expr::Exclude(base, ex) => write!(f, "{base}.exclude({ex:?})"),
            Expr::StructField(base, selectors) => match selectors.as_slice() {
                [FieldSelector::Name(name)] => write!(f, "{base}.field(\"{name}\")"),
                _ => write!(f, "{base}.fields({selectors:?})"),
            },
            Expr::WithFields(base, mods) => {
                write!(f, "{base}.with_fields([")?;
                for (i, m) in mods.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, "])")
            }
            Expr::Struct(exprs) => {
                write!(f, "struct(")?;
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Expr::Alias(base, name) => write!(f, "{base}.alias(\"{name}\")"),
            Expr::RenameOutputs(base, RenameOp::Prefix(p)) => write!(f, "{base}.prefix(\"{p}\")"),
            Expr::RenameOutputs(base, RenameOp::Suffix(s)) => write!(f, "{base}.suffix(\"{s}\")"),
            Expr::Function {
                name,
                args,
                distinct,
            } => {
                write!(f, "{name}(")?;
                if *distinct {
                    write!(f, "distinct ")?;
                }
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Expr::BinaryOp { left, op, right } => write!(f, "[{left} {} {right}]", op.symbol()),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => write!(f, "not({expr})"),
                UnaryOperator::Negate => write!(f, "-({expr})"),
                UnaryOperator::IsNull => write!(f, "{expr}.is_null()"),
                UnaryOperator::IsNotNull => write!(f, "{expr}.is_not_null()"),
            },
            Expr::Literal(Scalar::Str(s)) => write!(f, "lit(\"{s}\")"),
            Expr::Literal(v) => write!(f, "lit({v})"),
            Expr::Cast(base, dt) => write!(f, "{base}.cast({dt})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_parses_conventions_once() {
        assert_eq!(col("*"), Expr::Wildcard);
        assert_eq!(col("^foo.*$"), Expr::Regex("^foo.*$".into()));
        assert_eq!(col("foo"), Expr::Column("foo".into()));
        // A lone caret is a literal name.
        assert_eq!(col("^"), Expr::Column("^".into()));
    }

    #[test]
    fn exclusion_from_names_and_types() {
        assert_eq!(Exclusion::from("a"), Exclusion::Name("a".into()));
        assert_eq!(
            Exclusion::from("^a.*$"),
            Exclusion::Selector(Expr::Regex("^a.*$".into()))
        );
        assert_eq!(
            Exclusion::from(DataType::Boolean),
            Exclusion::Types(vec![TypeClass::Exact(DataType::Boolean)])
        );
    }

    #[test]
    fn field_selectors() {
        assert_eq!(FieldSelector::from("*"), FieldSelector::All);
        assert_eq!(
            FieldSelector::from("^aa.+|cc.+$"),
            FieldSelector::Pattern("^aa.+|cc.+$".into())
        );
        assert!(col("s").field("*").is_selector());
        assert!(!col("s").field("x").is_selector());
        assert!(!col("s").fields(["x"]).is_selector());
        assert!(col("s").fields(["x", "y"]).is_selector());
    }

    #[test]
    fn derived_output_names_follow_leftmost_input() {
        assert_eq!(col("calories").max().output_name().as_deref(), Some("calories"));
        assert_eq!(
            (col("a") + col("b")).output_name().as_deref(),
            Some("a")
        );
        assert_eq!(count_star().output_name().as_deref(), Some("count"));
        assert_eq!(lit(1i64).output_name().as_deref(), Some("literal"));
        assert_eq!(col("a").prefix("agg_").output_name().as_deref(), Some("agg_a"));
        assert_eq!(all().output_name(), None);
    }

    #[test]
    fn aggregate_detection_and_refs() {
        let e = col("a").sum().gt(lit(3i64)).and(col("b").is_not_null());
        assert!(e.contains_aggregate());
        assert_eq!(e.column_refs(), vec!["a".to_string(), "b".to_string()]);
        let w = col("s").with_fields([field("x").sqrt()]);
        assert_eq!(w.column_refs(), vec!["s".to_string()]);
    }
}
