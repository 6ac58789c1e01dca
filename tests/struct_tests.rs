//! Struct construction, field expansion and `with_fields`, executed.

mod test_data_gen;

use colplan_core::config::PlannerConfig;
use colplan_core::engine::ExecutionEngine;
use colplan_core::error::Error;
use colplan_core::expr::{all, col, cols, field, lit, struct_};
use colplan_core::schema::DataType;
use colplan_core::types::Scalar;
use colplan_planner::{optimize, LogicalPlanBuilder};
use test_data_gen::{foods_batch, foods_engine, foods_schema, ints};

fn foods() -> LogicalPlanBuilder {
    LogicalPlanBuilder::scan("foods", foods_schema()).expect("scan")
}

#[test]
fn struct_then_star_reproduces_the_frame() {
    let engine = foods_engine();
    let plan = foods()
        .select([struct_([all()]).alias("row")])
        .expect("struct")
        .select([col("row").field("*")])
        .expect("expand")
        .build();
    assert_eq!(plan.schema(), &foods_schema());
    assert_eq!(engine.execute(&plan).expect("execute"), foods_batch());
}

#[test]
fn single_and_multiple_field_access() {
    let engine = foods_engine();
    let packed = foods()
        .select([struct_([cols(["calories", "sugars_g"])]).alias("n")])
        .expect("struct");
    assert!(matches!(
        packed.schema().fields[0].data_type,
        DataType::Struct(_)
    ));

    let plan = packed
        .clone()
        .select([col("n").field("sugars_g")])
        .expect("by name")
        .limit(3)
        .build();
    let out = engine.execute(&plan).expect("execute");
    assert_eq!(out.column_names(), vec!["sugars_g"]);
    assert_eq!(out.columns[0].values, ints(&[2, 0, 0]));

    let plan = packed
        .clone()
        .select([col("n").field_at(-1).alias("last"), col("n").fields([1i64, 0])])
        .expect("by index")
        .limit(1)
        .build();
    let out = engine.execute(&plan).expect("execute");
    assert_eq!(out.column_names(), vec!["last", "calories", "sugars_g"]);
    assert_eq!(out.row(0), ints(&[2, 45, 2]));

    let err = packed.select([col("n").field("protein")]).unwrap_err();
    assert_eq!(
        err,
        Error::UnknownStructField {
            field: "protein".into(),
            available: vec!["calories".into(), "sugars_g".into()],
        }
    );
}

#[test]
fn with_fields_overrides_and_appends() {
    let engine = foods_engine();
    let plan = foods()
        .select([struct_([cols(["calories", "sugars_g"])]).alias("n")])
        .expect("struct")
        .select([col("n")
            .with_fields([
                (field("calories") * lit(10i64)).alias("calories"),
                (field("sugars_g") + field("calories")).alias("total"),
            ])
            .field("*")])
        .expect("with_fields")
        .limit(1)
        .build();
    let out = engine.execute(&plan).expect("execute");
    assert_eq!(out.column_names(), vec!["calories", "sugars_g", "total"]);
    assert_eq!(out.row(0), vec![Scalar::I64(450), Scalar::I64(2), Scalar::I64(47)]);
}

#[test]
fn dropping_the_struct_base_is_pushdown_safe() {
    let engine = foods_engine();
    let builder = foods()
        .with_columns([struct_([cols(["calories", "sugars_g"])]).alias("nutrients")])
        .expect("pack")
        .with_columns([col("nutrients").field("calories").alias("kcal")])
        .expect("unpack")
        .drop(["nutrients"])
        .expect("drop")
        .filter(col("kcal").gt(lit(100i64)))
        .expect("filter");

    let plain = builder.clone().build();
    let pushed = optimize(plain.clone(), &PlannerConfig::default());
    let untouched = optimize(
        plain.clone(),
        &PlannerConfig::default().with_projection_pushdown(false),
    );
    assert_eq!(untouched, plain);
    assert_eq!(pushed.schema(), plain.schema());

    let a = engine.execute(&plain).expect("plain");
    let b = engine.execute(&pushed).expect("pushed");
    assert_eq!(a, b);
    assert_eq!(
        a.column_names(),
        vec!["category", "calories", "fats_g", "sugars_g", "kcal"]
    );
    assert_eq!(a.num_rows(), 11);
}
