//! Schema-level selectors: names, wildcard, regex, dtype sets, exclusions.

use std::collections::HashSet;

use colplan_core::error::{Error, Result};
use colplan_core::expr::Exclusion;
use colplan_core::schema::{Schema, TypeClass};
use regex::Regex;

use super::{expand, Resolved, ResolutionContext};

pub(crate) fn column(schema: &Schema, name: &str) -> Result<Resolved> {
    schema
        .field_by_name(name)
        .map(Resolved::from_field)
        .ok_or_else(|| Error::UnknownColumn(name.to_string()))
}

pub(crate) fn wildcard(schema: &Schema, ctx: &ResolutionContext) -> Vec<Resolved> {
    schema
        .fields
        .iter()
        .filter(|f| !ctx.skips_implicit(&f.name))
        .map(Resolved::from_field)
        .collect()
}

pub(crate) fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn regex(
    schema: &Schema,
    pattern: &str,
    ctx: &ResolutionContext,
) -> Result<Vec<Resolved>> {
    let re = compile(pattern)?;
    Ok(schema
        .fields
        .iter()
        .filter(|f| re.is_match(&f.name) && !ctx.skips_implicit(&f.name))
        .map(Resolved::from_field)
        .collect())
}

pub(crate) fn dtype(
    schema: &Schema,
    classes: &[TypeClass],
    ctx: &ResolutionContext,
) -> Vec<Resolved> {
    schema
        .fields
        .iter()
        .filter(|f| TypeClass::any_matches(classes, &f.data_type) && !ctx.skips_implicit(&f.name))
        .map(Resolved::from_field)
        .collect()
}

/// Names removed by an exclusion list, resolved against the schema the
/// `Exclude` node receives.
pub(crate) fn excluded_names(schema: &Schema, exclusions: &[Exclusion]) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    for exclusion in exclusions {
        match exclusion {
            Exclusion::Name(name) => {
                names.insert(name.clone());
            }
            Exclusion::Types(classes) => {
                names.extend(
                    schema
                        .fields
                        .iter()
                        .filter(|f| TypeClass::any_matches(classes, &f.data_type))
                        .map(|f| f.name.clone()),
                );
            }
            Exclusion::Selector(expr) => {
                let ctx = ResolutionContext::new();
                names.extend(expand(expr, schema, &ctx)?.into_iter().map(|r| r.name));
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use colplan_core::schema::{DataType, Field};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("aaa", DataType::Int64, true),
            Field::new("bbb", DataType::Int64, true),
            Field::new("ccc", DataType::Utf8, true),
        ])
    }

    #[test]
    fn regex_alternation_matches_either_branch() {
        let out = regex(&schema(), "^aa.+|cc.+$", &ResolutionContext::new()).expect("regex");
        let names: Vec<_> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["aaa", "ccc"]);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = regex(&schema(), "^a(b$", &ResolutionContext::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { pattern, .. } if pattern == "^a(b$"));
    }

    #[test]
    fn regex_exclusion() {
        let ex = vec![Exclusion::from("^b.*$")];
        let names = excluded_names(&schema(), &ex).expect("exclusions");
        assert!(names.contains("bbb"));
        assert_eq!(names.len(), 1);
    }
}
