//! colplan CLI: run SQL over CSV files with the in-memory engine.

mod load;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colplan_core::config::PlannerConfig;
use colplan_core::types::{RowBatch, Scalar};
use colplan_exec::MemoryEngine;
use colplan_sql::SqlContext;
use tracing::info;

#[derive(Parser)]
#[command(name = "colplan")]
#[command(about = "Resolve column selectors and translate SQL into logical plans", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Table to register, as NAME=PATH.csv (repeatable)
    #[arg(short, long = "table", value_parser = parse_table_arg)]
    tables: Vec<(String, PathBuf)>,

    /// SQL text to translate
    #[arg(short, long)]
    sql: String,

    /// Disable projection pushdown (overrides COLPLAN_PROJECTION_PUSHDOWN)
    #[arg(long)]
    no_pushdown: bool,

    /// Suffix for colliding right-side join columns (overrides COLPLAN_JOIN_SUFFIX)
    #[arg(long)]
    join_suffix: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Jsonl,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a query and print the result
    Query {
        #[command(flatten)]
        args: QueryArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// Show the optimized logical plan for a query (EXPLAIN)
    Explain {
        #[command(flatten)]
        args: QueryArgs,
    },

    /// Translate a query without executing it
    Validate {
        #[command(flatten)]
        args: QueryArgs,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Query { args, format } => run_query(&args, format),
        Commands::Explain { args } => explain_query(&args),
        Commands::Validate { args } => validate_query(&args).map(|schema| {
            println!("✓ Query is valid");
            println!("  Output: {schema}");
        }),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_table_arg(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{s}'")),
    }
}

fn planner_config(args: &QueryArgs, base: PlannerConfig) -> PlannerConfig {
    let mut config = base;
    if args.no_pushdown {
        config.projection_pushdown = false;
    }
    if let Some(suffix) = &args.join_suffix {
        config.join_suffix = suffix.clone();
    }
    config
}

fn context(args: &QueryArgs) -> Result<SqlContext, Box<dyn std::error::Error>> {
    let engine = Arc::new(MemoryEngine::new());
    for (name, path) in &args.tables {
        let (schema, batch) = load::load_csv(path)?;
        info!(table = %name, path = %path.display(), rows = batch.num_rows(), "loaded CSV");
        engine.register_table(name.clone(), schema, batch)?;
    }
    let config = planner_config(args, PlannerConfig::from_env());
    let ctx = SqlContext::new(engine.clone()).with_config(config)?;
    for name in engine.table_names() {
        ctx.register(name.clone(), engine.scan(&name)?);
    }
    Ok(ctx)
}

fn run_query(args: &QueryArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let batch = context(args)?.query(&args.sql)?;
    let stdout = io::stdout();
    match format {
        OutputFormat::Csv => write_csv(&batch, stdout.lock()),
        OutputFormat::Jsonl => write_jsonl(&batch, &mut stdout.lock()),
    }
}

fn explain_query(args: &QueryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let plan = context(args)?.explain(&args.sql)?;
    println!("Logical Plan");
    println!("============");
    println!("{plan}");
    Ok(())
}

fn validate_query(args: &QueryArgs) -> Result<String, Box<dyn std::error::Error>> {
    let plan = context(args)?.translate(&args.sql)?;
    Ok(plan.schema().to_string())
}

fn write_csv<W: io::Write>(batch: &RowBatch, out: W) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(batch.column_names())?;
    for row in batch.rows() {
        wtr.write_record(row.iter().map(|v| match v {
            Scalar::Null => String::new(),
            other => other.to_string(),
        }))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_jsonl<W: io::Write>(batch: &RowBatch, out: &mut W) -> Result<(), Box<dyn std::error::Error>> {
    let names = batch.column_names();
    for row in batch.rows() {
        let object: serde_json::Map<String, serde_json::Value> = names
            .iter()
            .zip(row.iter())
            .map(|(name, value)| (name.to_string(), json_value(value)))
            .collect();
        serde_json::to_writer(&mut *out, &object)?;
        writeln!(out)?;
    }
    Ok(())
}

fn json_value(value: &Scalar) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::I32(v) => Value::from(*v),
        Scalar::I64(v) => Value::from(*v),
        Scalar::F32(v) => Value::from(*v as f64),
        Scalar::F64(v) => Value::from(*v),
        Scalar::Str(s) => Value::String(s.clone()),
        Scalar::Bin(bytes) => Value::from(bytes.clone()),
        Scalar::List(items) | Scalar::Struct(items) => {
            Value::Array(items.iter().map(json_value).collect())
        }
    }
}
