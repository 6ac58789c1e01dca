//! SQL queries executed end to end over the `foods` fixture.

mod test_data_gen;

use std::sync::Arc;

use colplan_core::error::Error;
use colplan_core::schema::{DataType, Field, Schema};
use colplan_core::types::{Column, RowBatch, Scalar};
use colplan_exec::MemoryEngine;
use test_data_gen::{context_for, floats, foods_context, ints, strs, values};

#[test]
fn group_by_having_order_by() {
    let ctx = foods_context();
    let out = ctx
        .query(
            "SELECT category, count(category) AS n, max(calories), min(fats_g) \
             FROM foods GROUP BY category HAVING n > 5 ORDER BY n, category DESC",
        )
        .expect("query");
    assert_eq!(out.column_names(), vec!["category", "n", "calories", "fats_g"]);
    assert_eq!(values(&out, "category"), strs(&["vegetables", "fruit", "seafood"]));
    assert_eq!(values(&out, "n"), ints(&[7, 7, 8]));
    assert_eq!(values(&out, "calories"), ints(&[45, 130, 200]));
    assert_eq!(values(&out, "fats_g"), floats(&[0.0, 0.0, 1.5]));
}

#[test]
fn having_and_order_by_hidden_aggregates() {
    let out = foods_context()
        .query(
            "SELECT category FROM foods GROUP BY category \
             HAVING count(*) > 5 ORDER BY max(calories) DESC",
        )
        .expect("query");
    assert_eq!(out.column_names(), vec!["category"]);
    assert_eq!(values(&out, "category"), strs(&["seafood", "fruit", "vegetables"]));
}

#[test]
fn count_distinct_per_group() {
    let engine = Arc::new(MemoryEngine::new());
    let schema = Schema::new(vec![
        Field::new("group", DataType::Utf8, false),
        Field::new("attr", DataType::Utf8, false),
    ]);
    let batch = RowBatch::new(vec![
        Column::new("group", strs(&["a", "b", "c", "c", "b"])),
        Column::new("attr", strs(&["x", "y", "x", "y", "y"])),
    ]);
    engine.register_table("test", schema, batch).expect("register");
    let out = context_for(engine)
        .query(
            "SELECT \"group\", count(DISTINCT attr) AS n_dist_attr FROM test \
             GROUP BY \"group\" HAVING n_dist_attr > 1",
        )
        .expect("query");
    assert_eq!(values(&out, "group"), strs(&["c"]));
    assert_eq!(values(&out, "n_dist_attr"), ints(&[2]));
}

#[test]
fn global_aggregates() {
    let out = foods_context()
        .query("SELECT count(*) AS n, sum(calories) AS total, max(sugars_g) AS s FROM foods")
        .expect("query");
    assert_eq!(out.num_rows(), 1);
    assert_eq!(out.row(0), vec![Scalar::I64(27), Scalar::I64(2392), Scalar::I64(25)]);
}

#[test]
fn between_is_inclusive() {
    let ctx = foods_context();
    let out = ctx
        .query("SELECT category, calories FROM foods WHERE calories BETWEEN 20 AND 31 LIMIT 4")
        .expect("between");
    assert_eq!(values(&out, "calories"), ints(&[20, 30, 25, 30]));
    assert_eq!(
        values(&out, "category"),
        strs(&["vegetables", "fruit", "vegetables", "fruit"])
    );

    let out = ctx
        .query("SELECT calories FROM foods WHERE calories NOT BETWEEN 20 AND 31 LIMIT 4")
        .expect("not between");
    assert_eq!(values(&out, "calories"), ints(&[45, 150, 100, 60]));
}

#[test]
fn not_between_is_the_complement() {
    let ctx = foods_context();
    let inside = ctx
        .query("SELECT calories FROM foods WHERE calories BETWEEN 20 AND 31")
        .expect("between");
    let outside = ctx
        .query("SELECT calories FROM foods WHERE calories NOT BETWEEN 20 AND 31")
        .expect("not between");
    assert_eq!(inside.num_rows(), 8);
    assert_eq!(inside.num_rows() + outside.num_rows(), 27);
    let outside_values = values(&outside, "calories");
    assert!(values(&inside, "calories")
        .iter()
        .all(|v| !outside_values.contains(v)));
}

#[test]
fn trim_leading_keeps_interior_characters() {
    let out = foods_context()
        .query("SELECT TRIM(LEADING 'v' FROM category) FROM foods LIMIT 2")
        .expect("trim");
    assert_eq!(out.column_names(), vec!["category"]);
    assert_eq!(values(&out, "category"), strs(&["egetables", "seafood"]));

    let out = foods_context()
        .query("SELECT TRIM(BOTH 's' FROM category) AS c FROM foods LIMIT 2")
        .expect("trim both");
    assert_eq!(values(&out, "c"), strs(&["vegetable", "eafood"]));
}

#[test]
fn order_by_column_outside_the_projection() {
    let out = foods_context()
        .query("SELECT category FROM foods ORDER BY calories DESC, category LIMIT 4")
        .expect("query");
    assert_eq!(out.column_names(), vec!["category"]);
    assert_eq!(
        values(&out, "category"),
        strs(&["seafood", "seafood", "seafood", "seafood"])
    );
}

#[test]
fn select_distinct_keeps_first_appearance() {
    let out = foods_context()
        .query("SELECT DISTINCT category FROM foods")
        .expect("distinct");
    assert_eq!(
        values(&out, "category"),
        strs(&["vegetables", "seafood", "meat", "fruit"])
    );
}

#[test]
fn arithmetic_and_filters() {
    let out = foods_context()
        .query("SELECT category, calories * 2 AS doubled FROM foods WHERE sugars_g > 20")
        .expect("query");
    assert_eq!(values(&out, "category"), strs(&["fruit"]));
    assert_eq!(values(&out, "doubled"), ints(&[260]));
}

#[test]
fn wildcard_exclude() {
    let out = foods_context()
        .query("SELECT * EXCLUDE (fats_g, sugars_g) FROM foods LIMIT 1")
        .expect("query");
    assert_eq!(out.column_names(), vec!["category", "calories"]);
    assert_eq!(out.row(0), vec![Scalar::Str("vegetables".into()), Scalar::I64(45)]);
}

#[test]
fn translation_errors_surface_before_execution() {
    let ctx = foods_context();
    assert_eq!(
        ctx.query("SELECT * FROM drinks").unwrap_err(),
        Error::UnknownTable("drinks".into())
    );
    assert_eq!(
        ctx.query("SELECT category, calories, count(*) FROM foods GROUP BY category")
            .unwrap_err(),
        Error::GroupByProjection("calories".into())
    );
    assert!(matches!(
        ctx.query("SELEC * FROM foods"),
        Err(Error::SqlSyntax { .. })
    ));
}

#[test]
fn explain_renders_the_optimized_plan() {
    let text = foods_context()
        .explain("SELECT category FROM foods WHERE calories > 100")
        .expect("explain");
    assert!(text.contains("SCAN foods"), "{text}");
    assert!(text.contains("FILTER"), "{text}");
}
