//! Widget definitions as they arrive on the wire.
//!
//! Operator and aggregation names stay strings here so that an unknown name
//! surfaces as a precise definition error at compile time rather than as a
//! generic deserialization failure.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::bucket::{parse_end_bound, parse_timestamp, sort_key, TimeBucket};
use crate::error::{DefinitionError, DefinitionResult};

/// Chart shape a widget renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Number,
    Percentage,
    Table,
    Timechart,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Number => "number",
            ChartType::Percentage => "percentage",
            ChartType::Table => "table",
            ChartType::Timechart => "timechart",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// How series points are rendered as display strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Number,
    Percentage,
    NumberPercentage,
}

/// A complete widget definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetDefinition {
    #[serde(default)]
    pub chart_type: Option<ChartType>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub time_bucket: Option<TimeBucket>,
    #[serde(default)]
    pub options: WidgetOptions,
}

impl WidgetDefinition {
    pub fn from_json(json: &str) -> DefinitionResult<Self> {
        serde_json::from_str(json).map_err(|e| DefinitionError::Malformed(e.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> DefinitionResult<Self> {
        serde_json::from_value(value).map_err(|e| DefinitionError::Malformed(e.to_string()))
    }
}

/// One selected column, optionally aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSpec>,
}

impl FieldSpec {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            alias: None,
            aggregation: None,
            filter: None,
        }
    }

    pub fn aggregated(mut self, aggregation: &str) -> Self {
        self.aggregation = Some(aggregation.into());
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub table: String,
    pub column: String,
    pub operator: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl FilterSpec {
    pub fn new(table: &str, column: &str, operator: &str, value: serde_json::Value) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            operator: operator.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetOptions {
    /// `"table.column"` the timeframe and bucketing apply to.
    pub time_column: Option<String>,
    pub sort: Option<SortOrder>,
    pub limit: Option<i64>,
    pub display: Option<DisplayMode>,
    pub percentage_numerator: Option<String>,
    pub percentage_denominator: Option<String>,
    pub total_label: Option<String>,
}

/// Filter operators, matched exhaustively by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Between,
    Contains,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::Nin => "nin",
            FilterOperator::Between => "between",
            FilterOperator::Contains => "contains",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(FilterOperator::Eq),
            "neq" => Ok(FilterOperator::Neq),
            "gt" => Ok(FilterOperator::Gt),
            "gte" => Ok(FilterOperator::Gte),
            "lt" => Ok(FilterOperator::Lt),
            "lte" => Ok(FilterOperator::Lte),
            "in" => Ok(FilterOperator::In),
            "nin" => Ok(FilterOperator::Nin),
            "between" => Ok(FilterOperator::Between),
            "contains" => Ok(FilterOperator::Contains),
            other => Err(DefinitionError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    /// Filtered count as a percentage of the total count.
    Ratio,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Ratio => "ratio",
        }
    }
}

impl FromStr for Aggregation {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Aggregation::Count),
            "sum" => Ok(Aggregation::Sum),
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "ratio" => Ok(Aggregation::Ratio),
            other => Err(DefinitionError::UnsupportedAggregation(other.to_string())),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional, inclusive time window.
///
/// Bounds deserialize from any layout `parse_timestamp` accepts; a bare
/// date as `end` runs to the last second of that day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeframe {
    #[serde(default, deserialize_with = "deserialize_start")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_end")]
    pub end: Option<NaiveDateTime>,
}

fn deserialize_start<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_bound(deserializer, parse_timestamp)
}

fn deserialize_end<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_bound(deserializer, parse_end_bound)
}

fn deserialize_bound<'de, D>(
    deserializer: D,
    parse: fn(&str) -> Option<NaiveDateTime>,
) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|raw| {
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("not a timestamp: {raw}")))
    })
    .transpose()
}

impl Timeframe {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::new(Some(start), Some(end))
    }

    /// Both bounds, when both are present.
    pub fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self.start.zip(self.end)
    }

    pub fn validate(&self) -> DefinitionResult<()> {
        match self.bounds() {
            Some((start, end)) if start > end => Err(DefinitionError::InvalidTimeframe {
                start: sort_key(start),
                end: sort_key(end),
            }),
            _ => Ok(()),
        }
    }
}
