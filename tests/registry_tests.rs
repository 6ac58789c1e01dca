//! Registry sharing: snapshots per translation and concurrent use.

mod test_data_gen;

use std::sync::Arc;
use std::thread;

use colplan_core::config::PlannerConfig;
use colplan_core::dag::LogicalPlan;
use colplan_core::error::Error;
use colplan_sql::{NamedTableRegistry, SqlTranslator};
use test_data_gen::{foods_context, foods_schema, ints, values};

fn scan(name: &str) -> LogicalPlan {
    LogicalPlan::Scan {
        source: name.to_string(),
        schema: foods_schema(),
    }
}

#[test]
fn translator_sees_only_its_snapshot() {
    let registry = NamedTableRegistry::new();
    registry.register("foods", scan("foods"));
    let translator = SqlTranslator::new(registry.snapshot(), PlannerConfig::default());

    registry.register("later", scan("foods"));
    assert_eq!(
        translator.translate("SELECT * FROM later").unwrap_err(),
        Error::UnknownTable("later".into())
    );
    assert!(colplan_sql::translate("SELECT * FROM later", &registry).is_ok());

    registry.unregister("foods");
    assert!(translator.translate("SELECT * FROM foods").is_ok());
    assert!(!registry.contains("foods"));
}

#[test]
fn registered_plans_act_as_views() {
    let ctx = foods_context();
    let heavy = ctx
        .translate("SELECT category, calories FROM foods WHERE calories >= 200")
        .expect("view");
    ctx.register("heavy", heavy);
    let out = ctx.query("SELECT calories FROM heavy").expect("query view");
    assert_eq!(values(&out, "calories"), ints(&[200, 200, 200]));
    assert!(ctx.tables().contains(&"heavy".to_string()));
}

#[test]
fn concurrent_registration_and_queries() {
    let ctx = Arc::new(foods_context());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                ctx.register(format!("alias_{i}"), scan("foods"));
                let out = ctx
                    .query(&format!("SELECT count(*) AS n FROM alias_{i}"))
                    .expect("query");
                assert_eq!(values(&out, "n"), ints(&[27]));
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }
    assert_eq!(ctx.tables().len(), 3 + 8);
}
