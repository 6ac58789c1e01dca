//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use colplan_core::dag::LogicalPlan;
use colplan_core::schema::{DataType, Field, Schema};
use colplan_core::types::{Column, RowBatch, Scalar};
use colplan_exec::MemoryEngine;
use colplan_sql::SqlContext;

/// category, calories, fats_g, sugars_g
const FOODS: [(&str, i64, f64, i64); 27] = [
    ("vegetables", 45, 0.5, 2),
    ("seafood", 150, 5.0, 0),
    ("meat", 100, 5.0, 0),
    ("fruit", 60, 0.0, 11),
    ("seafood", 140, 5.0, 1),
    ("meat", 120, 10.0, 1),
    ("vegetables", 20, 0.0, 2),
    ("fruit", 30, 0.0, 5),
    ("seafood", 130, 5.0, 0),
    ("fruit", 50, 0.0, 11),
    ("meat", 110, 7.0, 0),
    ("vegetables", 25, 0.0, 2),
    ("fruit", 30, 0.0, 3),
    ("vegetables", 22, 0.0, 3),
    ("vegetables", 25, 0.0, 4),
    ("seafood", 100, 5.0, 0),
    ("seafood", 200, 10.0, 0),
    ("seafood", 200, 7.0, 2),
    ("fruit", 60, 0.0, 11),
    ("meat", 110, 7.0, 0),
    ("vegetables", 25, 0.0, 3),
    ("seafood", 200, 7.0, 2),
    ("seafood", 130, 1.5, 0),
    ("fruit", 130, 0.0, 25),
    ("meat", 100, 7.0, 0),
    ("vegetables", 30, 0.0, 5),
    ("fruit", 50, 0.0, 11),
];

pub fn foods_schema() -> Schema {
    Schema::new(vec![
        Field::new("category", DataType::Utf8, true),
        Field::new("calories", DataType::Int64, true),
        Field::new("fats_g", DataType::Float64, true),
        Field::new("sugars_g", DataType::Int64, true),
    ])
}

pub fn foods_batch() -> RowBatch {
    RowBatch::new(vec![
        Column::new(
            "category",
            FOODS.iter().map(|r| Scalar::Str(r.0.to_string())).collect(),
        ),
        Column::new("calories", FOODS.iter().map(|r| Scalar::I64(r.1)).collect()),
        Column::new("fats_g", FOODS.iter().map(|r| Scalar::F64(r.2)).collect()),
        Column::new("sugars_g", FOODS.iter().map(|r| Scalar::I64(r.3)).collect()),
    ])
}

/// Engine with `foods`, `foods1` and `foods2` all holding the fixture.
pub fn foods_engine() -> Arc<MemoryEngine> {
    let engine = Arc::new(MemoryEngine::new());
    for name in ["foods", "foods1", "foods2"] {
        engine
            .register_table(name, foods_schema(), foods_batch())
            .expect("register foods");
    }
    engine
}

/// Register every table of `engine` into a fresh context.
pub fn context_for(engine: Arc<MemoryEngine>) -> SqlContext {
    let ctx = SqlContext::new(engine.clone());
    let tables: Vec<(String, LogicalPlan)> = engine
        .table_names()
        .into_iter()
        .map(|name| {
            let plan = engine.scan(&name).expect("scan");
            (name, plan)
        })
        .collect();
    ctx.register_many(tables);
    ctx
}

pub fn foods_context() -> SqlContext {
    context_for(foods_engine())
}

pub fn values(batch: &RowBatch, name: &str) -> Vec<Scalar> {
    batch
        .column(name)
        .unwrap_or_else(|| panic!("missing column {name}"))
        .values
        .clone()
}

pub fn strs(items: &[&str]) -> Vec<Scalar> {
    items.iter().map(|s| Scalar::Str(s.to_string())).collect()
}

pub fn ints(items: &[i64]) -> Vec<Scalar> {
    items.iter().map(|v| Scalar::I64(*v)).collect()
}

pub fn floats(items: &[f64]) -> Vec<Scalar> {
    items.iter().map(|v| Scalar::F64(*v)).collect()
}
