//! Widget compiler - turns a `WidgetDefinition` plus a `Timeframe` into a
//! `QueryPlan`.
//!
//! Every column goes through the schema registry; every user value becomes
//! a bind parameter. The only identifier text that reaches SQL apart from
//! registry names is output aliases, which are validated and quoted.
//!
//! Compilation order:
//! 1. chart type and field list are required
//! 2. fields become aggregates or plain grouping columns
//! 3. explicit `group_by` entries; the time column becomes the bucket axis
//! 4. definition filters
//! 5. inclusive timeframe bounds on the time column
//! 6. a bucketed widget without an explicit axis gets one synthesized
//! 7. at least one aggregate or grouping column must exist

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as Json;

use crate::bucket::{parse_timestamp, TimeBucket};
use crate::error::{DefinitionError, DefinitionResult};
use crate::plan::{Params, PlannedSelect, QueryPlan, SelectRole, SqlValue};
use crate::schema::{ColumnKind, ColumnRef, JoinStep, SchemaRegistry};
use crate::sql::{
    avg, case_when, coalesce, col, count, lit_float, lit_int, lit_null, max, min, nullif, sum,
    Expr, ExprExt, OrderByExpr, SortDir,
};
use crate::widget::{
    Aggregation, FieldSpec, FilterOperator, FilterSpec, SortOrder, Timeframe, WidgetDefinition,
};

/// Default ceiling for `options.limit`.
pub const DEFAULT_MAX_LIMIT: u64 = 10_000;

static ALIAS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Compiles widget definitions against a schema registry.
#[derive(Debug, Clone, Copy)]
pub struct WidgetCompiler<'r> {
    registry: &'r SchemaRegistry,
    max_limit: u64,
}

impl<'r> WidgetCompiler<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }

    pub fn with_max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn compile(
        &self,
        definition: &WidgetDefinition,
        timeframe: &Timeframe,
    ) -> DefinitionResult<QueryPlan> {
        let chart_type = definition
            .chart_type
            .ok_or(DefinitionError::MissingChartType)?;
        if definition.fields.is_empty() {
            return Err(DefinitionError::NoFields);
        }
        timeframe.validate()?;

        let time_column = match &definition.options.time_column {
            Some(reference) => self.registry.resolve_reference(reference)?,
            None => self.registry.default_time_column(),
        };
        if time_column.kind != ColumnKind::Timestamp {
            return Err(DefinitionError::NotTimestampColumn(time_column.to_string()));
        }

        let limit = match definition.options.limit {
            Some(value) if value < 1 || value as u64 > self.max_limit => {
                return Err(DefinitionError::InvalidLimit {
                    value,
                    max: self.max_limit,
                })
            }
            Some(value) => Some(value as u64),
            None => None,
        };

        let mut builder = PlanBuilder::new(self.registry, time_column, definition.time_bucket);

        for field in &definition.fields {
            builder.add_field(field)?;
        }
        for reference in &definition.group_by {
            builder.add_group_reference(reference)?;
        }
        for filter in &definition.filters {
            let predicate = builder.filter_predicate(filter)?;
            builder.predicates.push(predicate);
        }
        builder.add_timeframe(timeframe)?;
        builder.ensure_time_axis()?;

        if builder.selects.is_empty() {
            return Err(DefinitionError::NoAggregationOrGrouping);
        }

        let plan = builder.finish(chart_type, definition.options.sort, limit);
        tracing::debug!(
            chart_type = %plan.chart_type,
            selects = ?plan.select_labels(),
            joins = plan.joins.len(),
            predicates = plan.predicates.len(),
            params = plan.params.len(),
            "compiled widget plan"
        );
        Ok(plan)
    }
}

/// Accumulates one compile call's state. Never outlives `compile`.
struct PlanBuilder<'r> {
    registry: &'r SchemaRegistry,
    time_column: ColumnRef,
    time_bucket: Option<TimeBucket>,
    selects: Vec<PlannedSelect>,
    /// Registry columns already grouped on, to skip repeats.
    grouped: Vec<ColumnRef>,
    time_group: Option<PlannedSelect>,
    aliases: BTreeSet<String>,
    joins: Vec<JoinStep>,
    predicates: Vec<Expr>,
    params: Params,
}

impl<'r> PlanBuilder<'r> {
    fn new(
        registry: &'r SchemaRegistry,
        time_column: ColumnRef,
        time_bucket: Option<TimeBucket>,
    ) -> Self {
        Self {
            registry,
            time_column,
            time_bucket,
            selects: Vec::new(),
            grouped: Vec::new(),
            time_group: None,
            aliases: BTreeSet::new(),
            joins: Vec::new(),
            predicates: Vec::new(),
            params: Params::new(),
        }
    }

    /// Resolve a column and bring its table into the join set.
    fn resolve(&mut self, table: &str, column: &str) -> DefinitionResult<ColumnRef> {
        let resolved = self.registry.resolve(table, column)?;
        self.require_table(resolved.table)?;
        Ok(resolved)
    }

    fn require_table(&mut self, table: &str) -> DefinitionResult<()> {
        for step in self.registry.join_path(table)? {
            if !self.joins.iter().any(|j| j.table == step.table) {
                self.joins.push(*step);
            }
        }
        Ok(())
    }

    fn claim_alias(&mut self, alias: &str) -> DefinitionResult<String> {
        if !ALIAS.is_match(alias) {
            return Err(DefinitionError::InvalidAlias(alias.to_string()));
        }
        if !self.aliases.insert(alias.to_string()) {
            return Err(DefinitionError::DuplicateAlias(alias.to_string()));
        }
        Ok(alias.to_string())
    }

    fn is_time_axis(&self, column: &ColumnRef) -> bool {
        self.time_bucket.is_some() && *column == self.time_column
    }

    fn add_field(&mut self, field: &FieldSpec) -> DefinitionResult<()> {
        let column = self.resolve(&field.table, &field.column)?;
        let alias = field
            .alias
            .clone()
            .unwrap_or_else(|| column.default_alias());

        let Some(aggregation) = field.aggregation.as_deref() else {
            if field.filter.is_some() {
                return Err(DefinitionError::FilterWithoutAggregation(alias));
            }
            return self.add_group(column, Some(&alias));
        };

        let aggregation: Aggregation = aggregation.parse()?;
        if matches!(aggregation, Aggregation::Sum | Aggregation::Avg) && !column.kind.is_numeric() {
            return Err(DefinitionError::UnsupportedAggregation(format!(
                "{} on non-numeric column {}",
                aggregation, column
            )));
        }
        let condition = match &field.filter {
            Some(filter) => Some(self.filter_predicate(filter)?),
            None => None,
        };
        let expr = aggregate_expr(aggregation, column.expr(), condition)
            .ok_or_else(|| DefinitionError::RatioRequiresFilter(alias.clone()))?;

        let alias = self.claim_alias(&alias)?;
        self.selects.push(PlannedSelect {
            expr,
            alias,
            role: SelectRole::Value,
            kind: None,
        });
        Ok(())
    }

    fn add_group_reference(&mut self, reference: &str) -> DefinitionResult<()> {
        let column = self.registry.resolve_reference(reference)?;
        self.require_table(column.table)?;
        self.add_group(column, None)
    }

    /// Register a grouping column. The bucketed time column becomes the axis;
    /// repeats of an already grouped column are ignored.
    fn add_group(&mut self, column: ColumnRef, alias: Option<&str>) -> DefinitionResult<()> {
        let alias = alias
            .map(str::to_string)
            .unwrap_or_else(|| column.default_alias());

        if let (true, Some(bucket)) = (self.is_time_axis(&column), self.time_bucket) {
            if self.time_group.is_none() {
                self.set_time_axis(bucket, &alias)?;
            }
            return Ok(());
        }
        if self.grouped.contains(&column) {
            return Ok(());
        }

        let alias = self.claim_alias(&alias)?;
        self.grouped.push(column);
        self.selects.push(PlannedSelect {
            expr: column.expr(),
            alias,
            role: SelectRole::Group,
            kind: Some(column.kind),
        });
        Ok(())
    }

    fn set_time_axis(&mut self, bucket: TimeBucket, alias: &str) -> DefinitionResult<()> {
        let table = self.time_column.table;
        self.require_table(table)?;
        let alias = self.claim_alias(alias)?;
        self.time_group = Some(PlannedSelect {
            expr: self.time_column.expr().bucketed(bucket),
            alias,
            role: SelectRole::Group,
            kind: Some(ColumnKind::Timestamp),
        });
        Ok(())
    }

    fn ensure_time_axis(&mut self) -> DefinitionResult<()> {
        match self.time_bucket {
            Some(bucket) if self.time_group.is_none() => {
                let alias = self.time_column.default_alias();
                self.set_time_axis(bucket, &alias)
            }
            _ => Ok(()),
        }
    }

    fn add_timeframe(&mut self, timeframe: &Timeframe) -> DefinitionResult<()> {
        if timeframe.start.is_none() && timeframe.end.is_none() {
            return Ok(());
        }
        self.require_table(self.time_column.table)?;
        if let Some(start) = timeframe.start {
            let bound = self.params.bind(SqlValue::Timestamp(start));
            self.predicates.push(self.time_column.comparable().gte(bound));
        }
        if let Some(end) = timeframe.end {
            let bound = self.params.bind(SqlValue::Timestamp(end));
            self.predicates.push(self.time_column.comparable().lte(bound));
        }
        Ok(())
    }

    fn filter_predicate(&mut self, filter: &FilterSpec) -> DefinitionResult<Expr> {
        let column = self.resolve(&filter.table, &filter.column)?;
        let operator: FilterOperator = filter.operator.parse()?;
        let invalid = |reason: &str| DefinitionError::InvalidFilterValue {
            column: column.to_string(),
            operator: operator.to_string(),
            reason: reason.to_string(),
        };
        let target = column.comparable();
        let value = &filter.value;

        let predicate = match operator {
            FilterOperator::Eq if value.is_null() => column.expr().is_null(),
            FilterOperator::Neq if value.is_null() => column.expr().is_not_null(),
            FilterOperator::Eq
            | FilterOperator::Neq
            | FilterOperator::Gt
            | FilterOperator::Gte
            | FilterOperator::Lt
            | FilterOperator::Lte => {
                let bound = self.params.bind(coerce_value(&column, value).map_err(|r| invalid(&r))?);
                match operator {
                    FilterOperator::Eq => target.eq(bound),
                    FilterOperator::Neq => target.ne(bound),
                    FilterOperator::Gt => target.gt(bound),
                    FilterOperator::Gte => target.gte(bound),
                    FilterOperator::Lt => target.lt(bound),
                    _ => target.lte(bound),
                }
            }
            FilterOperator::In | FilterOperator::Nin => {
                let items = value
                    .as_array()
                    .ok_or_else(|| invalid("expected an array of values"))?;
                let mut bound = Vec::with_capacity(items.len());
                for item in items {
                    let coerced = coerce_value(&column, item).map_err(|r| invalid(&r))?;
                    bound.push(self.params.bind(coerced));
                }
                if operator == FilterOperator::In {
                    target.in_list(bound)
                } else {
                    target.not_in_list(bound)
                }
            }
            FilterOperator::Between => {
                let pair = value
                    .as_array()
                    .filter(|items| items.len() == 2)
                    .ok_or_else(|| invalid("expected exactly two values"))?;
                let low = coerce_value(&column, &pair[0]).map_err(|r| invalid(&r))?;
                let high = coerce_value(&column, &pair[1]).map_err(|r| invalid(&r))?;
                let low = self.params.bind(low);
                let high = self.params.bind(high);
                target.between(low, high)
            }
            FilterOperator::Contains => {
                if column.kind != ColumnKind::Text {
                    return Err(invalid("contains applies to text columns only"));
                }
                let needle = value
                    .as_str()
                    .ok_or_else(|| invalid("expected a string"))?;
                let pattern = format!("%{}%", escape_like(needle));
                let bound = self.params.bind(SqlValue::Text(pattern));
                target.ilike_escape(bound, '\\')
            }
        };
        Ok(predicate)
    }

    fn finish(
        self,
        chart_type: crate::widget::ChartType,
        sort: Option<SortOrder>,
        limit: Option<u64>,
    ) -> QueryPlan {
        let time_label = self.time_group.as_ref().map(|s| s.alias.clone());
        let mut selects = Vec::with_capacity(self.selects.len() + 1);
        selects.extend(self.time_group);
        selects.extend(self.selects);

        let group_by: Vec<Expr> = selects
            .iter()
            .filter(|s| s.role == SelectRole::Group)
            .map(|s| s.expr.clone())
            .collect();
        let order_by = order_by(&selects, time_label.is_some(), sort);

        QueryPlan {
            base_table: self.registry.base_table(),
            selects,
            group_by,
            joins: self.joins,
            predicates: self.predicates,
            params: self.params,
            order_by,
            limit,
            chart_type,
            time_bucket: self.time_bucket,
            time_label,
        }
    }
}

/// Build the aggregate for one field. `None` means ratio without a filter.
fn aggregate_expr(aggregation: Aggregation, column: Expr, condition: Option<Expr>) -> Option<Expr> {
    let expr = match (aggregation, condition) {
        (Aggregation::Count, None) => count(column),
        (Aggregation::Count, Some(cond)) => sum(case_when(cond, lit_int(1), lit_int(0))),
        (Aggregation::Sum, None) => sum(column),
        (Aggregation::Sum, Some(cond)) => sum(case_when(cond, column, lit_int(0))),
        (Aggregation::Avg, None) => avg(column),
        (Aggregation::Avg, Some(cond)) => avg(case_when(cond, column, lit_null())),
        (Aggregation::Min, None) => min(column),
        (Aggregation::Min, Some(cond)) => min(case_when(cond, column, lit_null())),
        (Aggregation::Max, None) => max(column),
        (Aggregation::Max, Some(cond)) => max(case_when(cond, column, lit_null())),
        (Aggregation::Ratio, None) => return None,
        // A zero denominator yields 0 here, unlike the numerator/denominator
        // scalar, which yields null.
        (Aggregation::Ratio, Some(cond)) => coalesce(vec![
            lit_float(100.0)
                .mul(sum(case_when(cond, lit_int(1), lit_int(0))))
                .div(nullif(count(column), lit_int(0))),
            lit_int(0),
        ]),
    };
    Some(expr)
}

/// Time axis first and always ascending; an explicit sort orders by the
/// first value column otherwise; remaining groups ascend as tie-breakers.
fn order_by(selects: &[PlannedSelect], has_time_axis: bool, sort: Option<SortOrder>) -> Vec<OrderByExpr> {
    let mut order = Vec::new();
    let groups = selects.iter().filter(|s| s.role == SelectRole::Group);

    if !has_time_axis {
        if let Some(sort) = sort {
            let dir = match sort {
                SortOrder::Asc => SortDir::Asc,
                SortOrder::Desc => SortDir::Desc,
            };
            let target = selects
                .iter()
                .find(|s| s.role == SelectRole::Value)
                .or_else(|| selects.first());
            if let Some(target) = target {
                order.push(OrderByExpr::new(col(&target.alias), dir));
            }
        }
    }
    for group in groups {
        if order.iter().any(|o| o.expr == col(&group.alias)) {
            continue;
        }
        order.push(OrderByExpr::asc(col(&group.alias)));
    }
    order
}

/// Coerce a JSON scalar to the column's storage kind.
fn coerce_value(column: &ColumnRef, value: &Json) -> Result<SqlValue, String> {
    match (column.kind, value) {
        (_, Json::Null) => Err("null is only valid with eq/neq".into()),
        (_, Json::Array(_) | Json::Object(_)) => Err("expected a scalar value".into()),
        (ColumnKind::Integer, Json::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64))
            .map(SqlValue::Int)
            .ok_or_else(|| format!("expected an integer, got {}", n)),
        (ColumnKind::Integer, Json::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::Int)
            .map_err(|_| format!("expected an integer, got {:?}", s)),
        (ColumnKind::Text, Json::String(s)) => Ok(SqlValue::Text(s.clone())),
        (ColumnKind::Text, Json::Number(n)) => Ok(SqlValue::Text(n.to_string())),
        (ColumnKind::Timestamp, Json::String(s)) => parse_timestamp(s)
            .map(SqlValue::Timestamp)
            .ok_or_else(|| format!("expected a timestamp, got {:?}", s)),
        (kind, other) => Err(format!("{} is not valid for a {:?} column", other, kind)),
    }
}

/// Escape LIKE wildcards with `\`.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
