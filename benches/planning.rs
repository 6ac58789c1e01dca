use criterion::{criterion_group, criterion_main, Criterion};
use colplan_core::engine::ExecutionEngine;
use colplan_core::expr::{all, col, exclude, lit};
use colplan_core::schema::{DataType, Field, Schema};
use colplan_core::types::{Column, RowBatch, Scalar};
use colplan_exec::MemoryEngine;
use colplan_planner::LogicalPlanBuilder;
use colplan_sql::SqlContext;
use std::sync::Arc;

fn wide_schema(columns: usize) -> Schema {
    Schema::new(
        (0..columns)
            .map(|i| {
                let dt = if i % 3 == 0 { DataType::Utf8 } else { DataType::Int64 };
                Field::new(format!("c{i}"), dt, true)
            })
            .collect(),
    )
}

fn make_batch(rows: usize) -> RowBatch {
    let mut groups = Vec::with_capacity(rows);
    let mut values = Vec::with_capacity(rows);
    for i in 0..rows {
        groups.push(Scalar::Str(format!("group-{}", i % 16)));
        values.push(Scalar::I64((i % 100) as i64));
    }
    RowBatch::new(vec![Column::new("g", groups), Column::new("v", values)])
}

fn bench_resolve(c: &mut Criterion) {
    let schema = wide_schema(256);
    c.bench_function("resolve_wide_selectors", |b| {
        b.iter(|| {
            let _ = LogicalPlanBuilder::scan("t", schema.clone())
                .and_then(|p| p.select([exclude([DataType::Utf8]), col("c0")]))
                .and_then(|p| p.select([col("^c1.*$"), all().exclude(["^c1.*$"]).suffix("_x")]))
                .unwrap();
        })
    });
}

fn bench_sql(c: &mut Criterion) {
    let engine = Arc::new(MemoryEngine::new());
    let schema = Schema::new(vec![
        Field::new("g", DataType::Utf8, true),
        Field::new("v", DataType::Int64, true),
    ]);
    engine.register_table("t", schema, make_batch(4096)).unwrap();
    let ctx = SqlContext::new(engine.clone());
    ctx.register("t", engine.scan("t").unwrap());
    let sql = "SELECT g, count(*) AS n, sum(v) AS s FROM t WHERE v > 10 \
               GROUP BY g HAVING n > 1 ORDER BY s DESC LIMIT 5";

    c.bench_function("sql_translate", |b| {
        b.iter(|| {
            let _ = ctx.translate(sql).unwrap();
        })
    });
    c.bench_function("sql_query_4096_rows", |b| {
        b.iter(|| {
            let _ = ctx.query(sql).unwrap();
        })
    });

    let plan = LogicalPlanBuilder::from_provider(engine.as_ref(), "t")
        .unwrap()
        .filter(col("v").lt(lit(50i64)))
        .unwrap()
        .build_optimized();
    c.bench_function("execute_filter", |b| {
        b.iter(|| {
            let _ = engine.execute(&plan).unwrap();
        })
    });
}

criterion_group!(benches, bench_resolve, bench_sql);
criterion_main!(benches);
