//! Compiled query plans.
//!
//! A `QueryPlan` is the safe, dialect-neutral form of a widget: registry
//! identifiers, bind parameters and the role of every output column. It is
//! produced once per compile call and consumed by value; adding a predicate
//! yields a new plan.

use std::fmt;

use chrono::NaiveDateTime;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::Serialize;

use crate::bucket::{sort_key, TimeBucket};
use crate::schema::{ColumnKind, JoinStep};
use crate::sql::{Dialect, Expr, OrderByExpr, Query, SelectExpr, TableRef};
use crate::widget::ChartType;

/// A value bound to a positional parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Int(i64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(n) => write!(f, "{}", n),
            SqlValue::Text(s) => write!(f, "{:?}", s),
            SqlValue::Timestamp(ts) => f.write_str(&sort_key(*ts)),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Int(n) => ToSqlOutput::Owned(Value::Integer(*n)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            // Compared against the column as normalised by `SqlDialect::emit_timestamp`.
            SqlValue::Timestamp(ts) => ToSqlOutput::Owned(Value::Text(sort_key(*ts))),
        })
    }
}

/// Ordered bind parameters; `bind` hands back the matching placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: Vec<SqlValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, value: SqlValue) -> Expr {
        self.values.push(value);
        Expr::Param(self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectRole {
    /// Grouping column; part of GROUP BY.
    Group,
    /// Aggregated value.
    Value,
}

/// One aliased output column.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSelect {
    pub expr: Expr,
    pub alias: String,
    pub role: SelectRole,
    /// Storage kind of grouping columns; `None` for aggregates.
    pub kind: Option<ColumnKind>,
}

/// A compiled widget query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub base_table: &'static str,
    /// Output columns; a time-bucket group, if any, is first.
    pub selects: Vec<PlannedSelect>,
    pub group_by: Vec<Expr>,
    /// Deduplicated by table name, in first-use order.
    pub joins: Vec<JoinStep>,
    /// ANDed together.
    pub predicates: Vec<Expr>,
    pub params: Params,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub chart_type: ChartType,
    pub time_bucket: Option<TimeBucket>,
    pub time_label: Option<String>,
}

impl QueryPlan {
    /// Return a plan with one more predicate, built against this plan's
    /// parameter list so placeholder numbering stays consistent.
    pub fn with_predicate(mut self, build: impl FnOnce(&mut Params) -> Expr) -> Self {
        let predicate = build(&mut self.params);
        self.predicates.push(predicate);
        self
    }

    pub fn select_labels(&self) -> Vec<String> {
        self.selects.iter().map(|s| s.alias.clone()).collect()
    }

    pub fn group_labels(&self) -> Vec<String> {
        self.labels_with(SelectRole::Group)
    }

    pub fn value_labels(&self) -> Vec<String> {
        self.labels_with(SelectRole::Value)
    }

    fn labels_with(&self, role: SelectRole) -> Vec<String> {
        self.selects
            .iter()
            .filter(|s| s.role == role)
            .map(|s| s.alias.clone())
            .collect()
    }

    /// Lower to the SQL builder.
    pub fn to_query(&self) -> Query {
        let select: Vec<SelectExpr> = self
            .selects
            .iter()
            .map(|s| SelectExpr::new(s.expr.clone()).with_alias(&s.alias))
            .collect();

        let mut query = Query::new()
            .select(select)
            .from(TableRef::new(self.base_table));
        for join in &self.joins {
            query = query.left_join(TableRef::new(join.table), join.on());
        }
        for predicate in &self.predicates {
            query = query.filter(predicate.clone());
        }
        query = query
            .group_by(self.group_by.clone())
            .order_by(self.order_by.clone());
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        query
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_query().to_sql(dialect)
    }
}
