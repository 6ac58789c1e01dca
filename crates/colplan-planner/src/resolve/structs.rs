//! Struct construction, field access and `with_fields` rewriting.

use std::collections::BTreeSet;

use colplan_core::error::{Error, Result};
use colplan_core::expr::{Expr, FieldSelector};
use colplan_core::schema::{DataType, Field, Schema};

use super::selector::compile;
use super::{resolve_all, Resolved, ResolutionContext};

/// Expand field selectors over every resolved struct base.
///
/// Outputs are named after the fields; the base column's name is dropped.
pub(crate) fn field_access(bases: Vec<Resolved>, selectors: &[FieldSelector]) -> Result<Vec<Resolved>> {
    let mut out = Vec::new();
    for base in bases {
        let fields = struct_fields(&base)?;
        for idx in select_fields(fields, selectors)? {
            let field = &fields[idx];
            out.push(Resolved {
                name: field.name.clone(),
                data_type: field.data_type.clone(),
                nullable: true,
                expr: field_expr(&base.expr, idx),
            });
        }
    }
    Ok(out)
}

/// Rebuild each struct base with overridden or appended fields.
///
/// Modifiers are resolved against the struct's own fields. Existing fields
/// keep their position; new fields are appended in modifier order.
pub(crate) fn with_fields(bases: Vec<Resolved>, modifiers: &[Expr]) -> Result<Vec<Resolved>> {
    let mut out = Vec::with_capacity(bases.len());
    for base in bases {
        let fields = struct_fields(&base)?.to_vec();
        let inner = Schema::new(fields.clone());
        let resolved = resolve_all(modifiers, &inner, &ResolutionContext::new())?;

        let mut members: Vec<(Field, Expr)> = fields
            .iter()
            .enumerate()
            .map(|(idx, f)| (f.clone(), field_expr(&base.expr, idx)))
            .collect();
        for m in resolved {
            let expr = rebind_columns(&m.expr, &|name: &str| {
                inner.index_of(name).map(|idx| field_expr(&base.expr, idx))
            });
            let field = m.field();
            match members.iter().position(|(f, _)| f.name == field.name) {
                Some(pos) => members[pos] = (field, expr),
                None => members.push((field, expr)),
            }
        }

        out.push(Resolved {
            name: base.name,
            data_type: DataType::Struct(members.iter().map(|(f, _)| f.clone()).collect()),
            nullable: base.nullable,
            expr: Expr::Struct(
                members
                    .into_iter()
                    .map(|(f, e)| Expr::Alias(Box::new(e), f.name))
                    .collect(),
            ),
        });
    }
    Ok(out)
}

/// `struct(members..)`: one column named after the first member.
pub(crate) fn build(members: &[Expr], schema: &Schema, ctx: &ResolutionContext) -> Result<Resolved> {
    let resolved = resolve_all(members, schema, ctx)?;
    let name = resolved
        .first()
        .map(|r| r.name.clone())
        .ok_or_else(|| Error::Plan("struct() needs at least one member column".into()))?;
    Ok(Resolved {
        name,
        data_type: DataType::Struct(resolved.iter().map(Resolved::field).collect()),
        nullable: false,
        expr: Expr::Struct(
            resolved
                .into_iter()
                .map(|r| Expr::Alias(Box::new(r.expr), r.name))
                .collect(),
        ),
    })
}

fn struct_fields(base: &Resolved) -> Result<&[Field]> {
    base.data_type.struct_fields().ok_or_else(|| {
        Error::Schema(format!(
            "cannot access fields of non-struct column '{}' ({})",
            base.name, base.data_type
        ))
    })
}

fn field_expr(base: &Expr, idx: usize) -> Expr {
    Expr::StructField(Box::new(base.clone()), vec![FieldSelector::Index(idx as i64)])
}

/// Field positions chosen by `selectors`, in declaration order.
fn select_fields(fields: &[Field], selectors: &[FieldSelector]) -> Result<Vec<usize>> {
    let available = || fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>();
    let mut picked = BTreeSet::new();
    for selector in selectors {
        match selector {
            FieldSelector::Name(name) => {
                let idx = fields.iter().position(|f| f.name == *name).ok_or_else(|| {
                    Error::UnknownStructField {
                        field: name.clone(),
                        available: available(),
                    }
                })?;
                picked.insert(idx);
            }
            FieldSelector::Index(raw) => {
                let len = fields.len() as i64;
                let idx = if *raw < 0 { len + raw } else { *raw };
                if idx < 0 || idx >= len {
                    return Err(Error::UnknownStructField {
                        field: raw.to_string(),
                        available: available(),
                    });
                }
                picked.insert(idx as usize);
            }
            FieldSelector::Pattern(pattern) => {
                let re = compile(pattern)?;
                picked.extend(
                    fields
                        .iter()
                        .enumerate()
                        .filter(|(_, f)| re.is_match(&f.name))
                        .map(|(i, _)| i),
                );
            }
            FieldSelector::All => picked.extend(0..fields.len()),
        }
    }
    Ok(picked.into_iter().collect())
}

/// Replace column references using `lookup`; unmatched references stay.
fn rebind_columns(expr: &Expr, lookup: &dyn Fn(&str) -> Option<Expr>) -> Expr {
    let rebind = |e: &Expr| Box::new(rebind_columns(e, lookup));
    match expr {
        Expr::Column(name) => lookup(name).unwrap_or_else(|| expr.clone()),
        Expr::StructField(base, sel) => Expr::StructField(rebind(base), sel.clone()),
        Expr::WithFields(base, mods) => Expr::WithFields(rebind(base), mods.clone()),
        Expr::Exclude(base, ex) => Expr::Exclude(rebind(base), ex.clone()),
        Expr::Alias(base, name) => Expr::Alias(rebind(base), name.clone()),
        Expr::RenameOutputs(base, op) => Expr::RenameOutputs(rebind(base), op.clone()),
        Expr::Cast(base, dt) => Expr::Cast(rebind(base), dt.clone()),
        Expr::Struct(members) => {
            Expr::Struct(members.iter().map(|m| rebind_columns(m, lookup)).collect())
        }
        Expr::Function {
            name,
            args,
            distinct,
        } => Expr::Function {
            name: name.clone(),
            args: args.iter().map(|a| rebind_columns(a, lookup)).collect(),
            distinct: *distinct,
        },
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: rebind(left),
            op: *op,
            right: rebind(right),
        },
        Expr::UnaryOp { op, expr: inner } => Expr::UnaryOp {
            op: *op,
            expr: rebind(inner),
        },
        Expr::Wildcard
        | Expr::Regex(_)
        | Expr::Columns(_)
        | Expr::DtypeSelector(_)
        | Expr::Literal(_) => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use colplan_core::expr::{col, field, struct_};

    fn schema() -> Schema {
        Schema::new(vec![Field::new(
            "s",
            DataType::Struct(vec![
                Field::new("aaa", DataType::Int64, true),
                Field::new("bbb", DataType::Utf8, true),
                Field::new("ccc", DataType::Float64, true),
            ]),
            true,
        )])
    }

    fn names(out: &[Resolved]) -> Vec<&str> {
        out.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn single_and_multi_field_access() {
        let ctx = ResolutionContext::new();
        let out = resolve(&col("s").field("bbb"), &schema(), &ctx).expect("field");
        assert_eq!(names(&out), vec!["bbb"]);
        assert_eq!(out[0].data_type, DataType::Utf8);

        let out = resolve(&col("s").fields(["ccc", "aaa"]), &schema(), &ctx).expect("fields");
        assert_eq!(names(&out), vec!["aaa", "ccc"]);

        let out = resolve(&col("s").field("^aa.+|cc.+$"), &schema(), &ctx).expect("pattern");
        assert_eq!(names(&out), vec!["aaa", "ccc"]);

        let out = resolve(&col("s").field_at(-1), &schema(), &ctx).expect("index");
        assert_eq!(names(&out), vec!["ccc"]);
    }

    #[test]
    fn unknown_field_lists_available() {
        let err = resolve(&col("s").field("zzz"), &schema(), &ResolutionContext::new()).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownStructField {
                field: "zzz".into(),
                available: vec!["aaa".into(), "bbb".into(), "ccc".into()],
            }
        );
        assert!(resolve(&col("s").field_at(3), &schema(), &ResolutionContext::new()).is_err());
    }

    #[test]
    fn field_access_on_scalar_column_fails() {
        let flat = Schema::new(vec![Field::new("x", DataType::Int64, true)]);
        let err = resolve(&col("x").field("*"), &flat, &ResolutionContext::new()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn with_fields_overrides_in_place_and_appends() {
        let expr = col("s").with_fields([
            field("aaa").cast(DataType::Float64),
            (field("aaa") + field("ccc")).alias("ddd"),
        ]);
        let out = resolve(&expr, &schema(), &ResolutionContext::new()).expect("with_fields");
        assert_eq!(names(&out), vec!["s"]);
        let fields = out[0].data_type.struct_fields().expect("struct");
        let field_names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(field_names, vec!["aaa", "bbb", "ccc", "ddd"]);
        assert_eq!(fields[0].data_type, DataType::Float64);
        // The bound form references only the base column.
        assert_eq!(out[0].expr.column_refs(), vec!["s".to_string()]);
    }

    #[test]
    fn struct_is_named_after_first_member() {
        let flat = Schema::new(vec![
            Field::new("A", DataType::Int64, true),
            Field::new("B", DataType::Utf8, true),
        ]);
        let out = resolve(&struct_([col("A"), col("B")]), &flat, &ResolutionContext::new())
            .expect("struct");
        assert_eq!(names(&out), vec!["A"]);
        let expanded = resolve(
            &struct_([col("A"), col("B")]).field("*").prefix("foo_"),
            &flat,
            &ResolutionContext::new(),
        )
        .expect("expand");
        assert_eq!(names(&expanded), vec!["foo_A", "foo_B"]);
    }
}
