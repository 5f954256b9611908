//! Tabular query results, before any chart interpretation.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::bucket::{sort_key, TimeBucket};
use crate::widget::ChartType;

/// One decoded cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    #[serde(serialize_with = "serialize_timestamp")]
    Timestamp(NaiveDateTime),
}

impl CellValue {
    /// Finite numeric value, if any. Numeric text counts.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            CellValue::Int(n) => *n as f64,
            CellValue::Float(f) => *f,
            CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
            CellValue::Null | CellValue::Timestamp(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

fn serialize_timestamp<S: serde::Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&sort_key(*ts))
}

/// One result row, keyed by output alias.
pub type Row = BTreeMap<String, CellValue>;

/// Rows plus the labels needed to interpret them.
///
/// `group_labels` and `value_labels` partition `select_labels`; when a time
/// axis exists it is the first group label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetQueryResult {
    pub chart_type: ChartType,
    pub rows: Vec<Row>,
    pub group_labels: Vec<String>,
    pub value_labels: Vec<String>,
    pub select_labels: Vec<String>,
    pub time_label: Option<String>,
    pub time_bucket: Option<TimeBucket>,
}

impl WidgetQueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Time-axis column and its bucket, when the first group is bucketed.
    pub fn time_axis(&self) -> Option<(&str, TimeBucket)> {
        let label = self.time_label.as_deref()?;
        let bucket = self.time_bucket?;
        (self.group_labels.first().map(String::as_str) == Some(label)).then_some((label, bucket))
    }
}
