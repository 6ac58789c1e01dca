//! Fluent construction of resolved logical plans.
//!
//! Every method resolves its expressions against the current output schema
//! immediately, so a node only exists once its schema is known. Errors are
//! returned at the call that introduced them.

use colplan_core::config::PlannerConfig;
use colplan_core::dag::{JoinLayout, JoinType, LogicalPlan, SortKey};
use colplan_core::engine::ScanProvider;
use colplan_core::error::{Error, Result};
use colplan_core::expr::{Expr, NamedExpr};
use colplan_core::schema::{DataType, Schema};
use tracing::debug;

use crate::resolve::{resolve_all, resolve_single, Resolved, ResolutionContext};
use crate::rules;

#[derive(Debug, Clone)]
pub struct LogicalPlanBuilder {
    plan: LogicalPlan,
    config: PlannerConfig,
}

impl LogicalPlanBuilder {
    /// Start from a named source with a known schema.
    pub fn scan(source: impl Into<String>, schema: Schema) -> Result<Self> {
        let schema = Schema::try_new(schema.fields)?;
        Ok(Self::from_plan(LogicalPlan::Scan {
            source: source.into(),
            schema,
        }))
    }

    /// Start from a source whose schema the provider knows.
    pub fn from_provider(provider: &dyn ScanProvider, source: &str) -> Result<Self> {
        Self::scan(source, provider.schema_of(source)?)
    }

    pub fn from_plan(plan: LogicalPlan) -> Self {
        Self {
            plan,
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Output schema of the plan built so far.
    pub fn schema(&self) -> &Schema {
        self.plan.schema()
    }

    pub fn plan(&self) -> &LogicalPlan {
        &self.plan
    }

    /// Project `exprs`. If every output aggregates, this becomes a global
    /// aggregation producing one row.
    pub fn select<I>(self, exprs: I) -> Result<Self>
    where
        I: IntoIterator<Item = Expr>,
    {
        let exprs: Vec<Expr> = exprs.into_iter().collect();
        let resolved = resolve_all(&exprs, self.schema(), &ResolutionContext::new())?;
        let aggregated = resolved
            .iter()
            .filter(|r| r.expr.contains_aggregate())
            .count();
        match aggregated {
            0 => self.project(resolved),
            n if n == resolved.len() => self.aggregate(Vec::new(), resolved),
            _ => Err(Error::Plan(
                "cannot mix aggregated and row-wise expressions without group_by".into(),
            )),
        }
    }

    /// Add or replace columns. Replaced columns keep their position; new
    /// columns are appended in order.
    pub fn with_columns<I>(self, exprs: I) -> Result<Self>
    where
        I: IntoIterator<Item = Expr>,
    {
        let exprs: Vec<Expr> = exprs.into_iter().collect();
        let mut added = resolve_all(&exprs, self.schema(), &ResolutionContext::new())?;
        if let Some(agg) = added.iter().find(|r| r.expr.contains_aggregate()) {
            return Err(Error::Plan(format!(
                "aggregate '{}' is not allowed in with_columns",
                agg.name
            )));
        }

        let mut out = Vec::with_capacity(self.schema().len() + added.len());
        for field in &self.schema().fields {
            match added.iter().position(|r| r.name == field.name) {
                Some(pos) => out.push(added.remove(pos)),
                None => out.push(Resolved::from_field(field)),
            }
        }
        out.extend(added);
        self.project(out)
    }

    /// Remove the named columns; every name must exist.
    pub fn drop<I, S>(self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if let Some(missing) = names.iter().find(|n| !self.schema().contains(n)) {
            return Err(Error::UnknownColumn(missing.clone()));
        }
        let kept = self
            .schema()
            .fields
            .iter()
            .filter(|f| !names.contains(&f.name))
            .map(Resolved::from_field)
            .collect();
        self.project(kept)
    }

    pub fn filter(self, predicate: Expr) -> Result<Self> {
        let bound = resolve_single(&predicate, self.schema(), &ResolutionContext::new())?;
        if bound.expr.contains_aggregate() {
            return Err(Error::Plan(format!(
                "aggregate functions are not allowed in filter: {predicate}"
            )));
        }
        if !matches!(bound.data_type, DataType::Boolean | DataType::Null) {
            return Err(Error::Schema(format!(
                "filter predicate must be boolean, got {}",
                bound.data_type
            )));
        }
        Ok(self.push(|input| LogicalPlan::Filter {
            input,
            predicate: bound.expr,
        }))
    }

    /// Filter over the output of the nearest aggregation.
    pub fn having(self, predicate: Expr) -> Result<Self> {
        let mut node = &self.plan;
        while let LogicalPlan::Filter { input, .. } = node {
            node = input;
        }
        if !matches!(node, LogicalPlan::Aggregate { .. }) {
            return Err(Error::Plan("having requires a preceding aggregation".into()));
        }
        self.filter(predicate)
    }

    pub fn group_by<I>(self, keys: I) -> GroupBy
    where
        I: IntoIterator<Item = Expr>,
    {
        GroupBy {
            input: self,
            keys: keys.into_iter().collect(),
        }
    }

    /// Equi-join using the configured suffix for colliding right columns.
    pub fn join(
        self,
        right: LogicalPlan,
        left_on: Vec<Expr>,
        right_on: Vec<Expr>,
        join_type: JoinType,
    ) -> Result<Self> {
        let suffix = self.config.join_suffix.clone();
        self.join_with_suffix(right, left_on, right_on, join_type, &suffix)
    }

    pub fn join_with_suffix(
        self,
        right: LogicalPlan,
        left_on: Vec<Expr>,
        right_on: Vec<Expr>,
        join_type: JoinType,
        suffix: &str,
    ) -> Result<Self> {
        if left_on.is_empty() || left_on.len() != right_on.len() {
            return Err(Error::Plan(format!(
                "join needs matching key lists, got {} left and {} right",
                left_on.len(),
                right_on.len()
            )));
        }
        let ctx = ResolutionContext::new();
        let bind = |keys: &[Expr], schema: &Schema| -> Result<Vec<Expr>> {
            keys.iter()
                .map(|k| {
                    let r = resolve_single(k, schema, &ctx)?;
                    if r.expr.contains_aggregate() {
                        return Err(Error::Plan(format!("aggregate in join key: {k}")));
                    }
                    Ok(r.expr)
                })
                .collect()
        };
        let left_keys = bind(&left_on, self.schema())?;
        let right_keys = bind(&right_on, right.schema())?;
        let layout = JoinLayout::new(
            self.schema(),
            right.schema(),
            &left_keys,
            &right_keys,
            join_type,
            suffix,
        )?;

        Ok(self.push(|left| LogicalPlan::Join {
            left,
            right: Box::new(right),
            join_type,
            left_on: left_keys,
            right_on: right_keys,
            suffix: suffix.to_string(),
            schema: layout.schema,
        }))
    }

    pub fn sort<I>(self, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = SortKey>,
    {
        let ctx = ResolutionContext::new();
        let keys = keys
            .into_iter()
            .map(|k| {
                let bound = resolve_single(&k.expr, self.schema(), &ctx)?;
                Ok(SortKey {
                    expr: bound.expr,
                    ..k
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.push(|input| LogicalPlan::Sort { input, keys }))
    }

    pub fn limit(self, n: usize) -> Self {
        self.push(|input| LogicalPlan::Limit { input, n })
    }

    pub fn build(self) -> LogicalPlan {
        self.plan
    }

    /// Build and run the optimization rules enabled in the config.
    pub fn build_optimized(self) -> LogicalPlan {
        rules::optimize(self.plan, &self.config)
    }

    pub(crate) fn project(self, resolved: Vec<Resolved>) -> Result<Self> {
        let schema = Schema::try_new(resolved.iter().map(Resolved::field).collect())?;
        let exprs: Vec<NamedExpr> = resolved.into_iter().map(Resolved::into_named).collect();
        Ok(self.push(|input| LogicalPlan::Project {
            input,
            exprs,
            schema,
        }))
    }

    pub(crate) fn aggregate(self, keys: Vec<Resolved>, aggs: Vec<Resolved>) -> Result<Self> {
        let schema = Schema::try_new(keys.iter().chain(aggs.iter()).map(Resolved::field).collect())?;
        Ok(self.push(|input| LogicalPlan::Aggregate {
            input,
            keys: keys.into_iter().map(Resolved::into_named).collect(),
            aggs: aggs.into_iter().map(Resolved::into_named).collect(),
            schema,
        }))
    }

    /// Wrap the current plan in a new node.
    fn push(self, node: impl FnOnce(Box<LogicalPlan>) -> LogicalPlan) -> Self {
        let plan = node(Box::new(self.plan));
        debug!(node = plan.name(), schema = %plan.schema(), "plan node built");
        Self {
            plan,
            config: self.config,
        }
    }
}

/// Pending aggregation; finished by [`GroupBy::agg`].
#[derive(Debug, Clone)]
pub struct GroupBy {
    input: LogicalPlanBuilder,
    keys: Vec<Expr>,
}

impl GroupBy {
    /// Aggregate each group.
    ///
    /// Wildcard, regex and dtype selectors skip the group keys here. An
    /// expression with no aggregate function collects its group's values
    /// into a list.
    pub fn agg<I>(self, aggs: I) -> Result<LogicalPlanBuilder>
    where
        I: IntoIterator<Item = Expr>,
    {
        let schema = self.input.schema().clone();
        let keys = resolve_all(&self.keys, &schema, &ResolutionContext::new())?;
        if let Some(k) = keys.iter().find(|k| k.expr.contains_aggregate()) {
            return Err(Error::Plan(format!("aggregate in group key '{}'", k.name)));
        }

        let ctx = ResolutionContext::aggregate(keys.iter().map(|k| k.name.clone()).collect());
        let aggs: Vec<Expr> = aggs.into_iter().collect();
        let aggs = resolve_all(&aggs, &schema, &ctx)?
            .into_iter()
            .map(|mut r| {
                if !r.expr.contains_aggregate() {
                    r.data_type = DataType::List(Box::new(r.data_type));
                    r.nullable = true;
                }
                r
            })
            .collect();
        self.input.aggregate(keys, aggs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colplan_core::expr::{all, col, cols, count_star, field, lit};
    use colplan_core::schema::Field;

    fn abc() -> LogicalPlanBuilder {
        LogicalPlanBuilder::scan(
            "t",
            Schema::new(vec![
                Field::new("A", DataType::Int64, true),
                Field::new("B", DataType::Int64, true),
                Field::new("C", DataType::Utf8, true),
            ]),
        )
        .expect("scan")
    }

    #[test]
    fn test_group_by_all_prefix_skips_key() {
        let plan = abc()
            .group_by([col("A")])
            .agg([all().prefix("agg_")])
            .expect("agg")
            .build();
        assert_eq!(plan.schema().names(), vec!["A", "agg_B", "agg_C"]);
        // No aggregate function: implicit list.
        assert_eq!(
            plan.schema().field_by_name("agg_B").map(|f| f.data_type.clone()),
            Some(DataType::List(Box::new(DataType::Int64)))
        );
    }

    #[test]
    fn test_group_by_explicit_columns_keep_key() {
        let plan = abc()
            .group_by([col("A")])
            .agg([cols(["A", "C"]).prefix("agg_")])
            .expect("agg")
            .build();
        assert_eq!(plan.schema().names(), vec!["A", "agg_A", "agg_C"]);
    }

    #[test]
    fn test_with_columns_replaces_in_place() {
        let plan = abc()
            .with_columns([(col("A") * lit(2i64)).alias("B"), lit(true).alias("D")])
            .expect("with_columns")
            .build();
        assert_eq!(plan.schema().names(), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_drop_unknown_column() {
        let err = abc().drop(["Z"]).unwrap_err();
        assert_eq!(err, Error::UnknownColumn("Z".into()));
        let plan = abc().drop(["B"]).expect("drop").build();
        assert_eq!(plan.schema().names(), vec!["A", "C"]);
    }

    #[test]
    fn test_filter_requires_boolean() {
        assert!(matches!(abc().filter(col("A")), Err(Error::Schema(_))));
        assert!(matches!(
            abc().filter(col("A").sum().gt(lit(1i64))),
            Err(Error::Plan(_))
        ));
        assert!(abc().filter(col("A").gt(lit(1i64))).is_ok());
    }

    #[test]
    fn test_select_all_aggregates_is_global_aggregate() {
        let plan = abc()
            .select([count_star(), col("B").max()])
            .expect("select")
            .build();
        assert!(matches!(plan, LogicalPlan::Aggregate { ref keys, .. } if keys.is_empty()));
        assert_eq!(plan.schema().names(), vec!["count", "B"]);
        assert!(abc().select([col("A"), col("B").max()]).is_err());
    }

    #[test]
    fn test_having_needs_aggregate() {
        assert!(matches!(
            abc().having(col("A").gt(lit(1i64))),
            Err(Error::Plan(_))
        ));
        let plan = abc()
            .group_by([col("C")])
            .agg([col("A").sum()])
            .and_then(|b| b.having(col("A").gt(lit(1i64))))
            .expect("having")
            .build();
        assert_eq!(plan.name(), "filter");
    }

    #[test]
    fn test_with_fields_then_expand() {
        let coords = DataType::Struct(vec![
            Field::new("x", DataType::Int64, true),
            Field::new("y", DataType::Int64, true),
        ]);
        let plan = LogicalPlanBuilder::scan("pts", Schema::new(vec![Field::new("coords", coords, true)]))
            .expect("scan")
            .with_columns([col("coords").with_fields([field("x").sqrt()]).field("*")])
            .expect("with_columns")
            .build();
        assert_eq!(plan.schema().names(), vec!["coords", "x", "y"]);
        assert_eq!(
            plan.schema().field_by_name("x").map(|f| f.data_type.clone()),
            Some(DataType::Float64)
        );
    }

    #[test]
    fn test_join_uses_config_suffix() {
        let right = abc().build();
        let plan = abc()
            .with_config(PlannerConfig::default().with_join_suffix("_r"))
            .join(right, vec![col("A")], vec![col("A")], JoinType::Inner)
            .expect("join")
            .build();
        assert_eq!(plan.schema().names(), vec!["A", "B", "C", "B_r", "C_r"]);
    }
}
