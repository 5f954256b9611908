//! Bar, line, pie and timechart payloads.
//!
//! The first group column is the label axis. With a time bucket and a fully
//! bounded timeframe the axis is pre-generated so missing buckets show as
//! zero; otherwise it holds the observed values in first-seen order. Any
//! further group columns fan the value columns out into one dataset each.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::coerce::{
    format_number, format_percent, group_value, numeric, percent_of, GroupValue, MISSING,
};
use crate::bucket::{generate_range, sort_key};
use crate::result::{Row, WidgetQueryResult};
use crate::widget::{ChartType, DisplayMode, Timeframe, WidgetOptions};

/// Label used when a series has no group column.
pub const DEFAULT_TOTAL_LABEL: &str = "Total";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPayload {
    pub chart_type: ChartType,
    /// Axis display labels.
    pub labels: Vec<String>,
    /// Axis identity keys, parallel to `labels`.
    pub keys: Vec<String>,
    pub datasets: Vec<Dataset>,
    /// Dataset label to total; null when the dataset saw no numeric value.
    pub totals: BTreeMap<String, Option<f64>>,
    /// Dataset label to share of the grand total.
    pub percentages: BTreeMap<String, Option<f64>>,
    pub grand_total: Option<f64>,
    pub total_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    /// One point per axis entry; gaps are zero.
    pub data: Vec<f64>,
    pub display: Vec<String>,
    pub total: Option<f64>,
}

#[derive(Default)]
struct Cell {
    sum: f64,
    observed: bool,
}

pub fn format_series(
    result: &WidgetQueryResult,
    options: &WidgetOptions,
    timeframe: &Timeframe,
    max_points: usize,
) -> SeriesPayload {
    let total_label = options
        .total_label
        .clone()
        .unwrap_or_else(|| DEFAULT_TOTAL_LABEL.to_string());
    let time_axis = result.time_axis().map(|(_, bucket)| bucket);
    let primary = result.group_labels.first().map(String::as_str);
    let secondary: &[String] = result.group_labels.get(1..).unwrap_or(&[]);

    let mut axis = Axis::default();
    if let (Some(bucket), Some((start, end))) = (time_axis, timeframe.bounds()) {
        for ts in generate_range(start, end, bucket, max_points) {
            axis.insert(GroupValue {
                key: sort_key(ts),
                display: bucket.display(ts),
            });
        }
    }

    let mut fan_out = Axis::default();
    if secondary.is_empty() {
        // One dataset per value column even when no rows came back.
        fan_out.insert(secondary_value(&Row::new(), secondary));
    }
    let mut cells: HashMap<(usize, usize, usize), Cell> = HashMap::new();
    let mut row_positions = Vec::with_capacity(result.rows.len());
    for row in &result.rows {
        let point = match primary {
            Some(label) => group_value(row.get(label), time_axis),
            None => GroupValue {
                key: total_label.clone(),
                display: total_label.clone(),
            },
        };
        axis.insert(point.clone());
        let series = fan_out.insert(secondary_value(row, secondary));
        row_positions.push((point.key, series));
    }

    if time_axis.is_some() {
        axis.sort_by_key();
    }

    for (row, (point_key, series)) in result.rows.iter().zip(row_positions) {
        let Some(point) = axis.position(&point_key) else {
            continue;
        };
        for (value_idx, label) in result.value_labels.iter().enumerate() {
            let cell = cells.entry((value_idx, series, point)).or_default();
            if let Some(value) = numeric(row.get(label)) {
                cell.sum += value;
                cell.observed = true;
            }
        }
    }

    let display_mode = options.display.unwrap_or_default();
    let mut datasets = Vec::new();
    for (value_idx, value_label) in result.value_labels.iter().enumerate() {
        for (series, series_value) in fan_out.values.iter().enumerate() {
            let label = if secondary.is_empty() {
                value_label.clone()
            } else {
                format!("{} \u{2013} {}", value_label, series_value.display)
            };

            let mut data = Vec::with_capacity(axis.values.len());
            let mut total: Option<f64> = None;
            for point in 0..axis.values.len() {
                match cells.get(&(value_idx, series, point)) {
                    Some(cell) if cell.observed => {
                        data.push(cell.sum);
                        total = Some(total.unwrap_or(0.0) + cell.sum);
                    }
                    _ => data.push(0.0),
                }
            }
            let display = data
                .iter()
                .map(|v| display_point(*v, total, display_mode))
                .collect();

            datasets.push(Dataset {
                label,
                data,
                display,
                total,
            });
        }
    }

    let grand_total = datasets
        .iter()
        .filter_map(|d| d.total)
        .fold(None, |acc: Option<f64>, t| Some(acc.unwrap_or(0.0) + t));
    let totals = datasets.iter().map(|d| (d.label.clone(), d.total)).collect();
    let percentages = datasets
        .iter()
        .map(|d| (d.label.clone(), percent_of(d.total, grand_total)))
        .collect();

    let (keys, labels) = axis.values.into_iter().map(|v| (v.key, v.display)).unzip();

    SeriesPayload {
        chart_type: result.chart_type,
        labels,
        keys,
        datasets,
        totals,
        percentages,
        grand_total,
        total_label,
    }
}

/// Combined value of every secondary group column.
fn secondary_value(row: &Row, labels: &[String]) -> GroupValue {
    let parts: Vec<GroupValue> = labels.iter().map(|l| group_value(row.get(l), None)).collect();
    GroupValue {
        key: parts.iter().map(|p| p.key.as_str()).collect::<Vec<_>>().join("\u{1f}"),
        display: parts
            .iter()
            .map(|p| p.display.as_str())
            .collect::<Vec<_>>()
            .join(" / "),
    }
}

/// Share of the dataset total: `--` without data, `0.0%` for an all-zero total.
fn share(value: f64, total: Option<f64>) -> String {
    match total {
        None => MISSING.to_string(),
        Some(t) if t == 0.0 => format_percent(Some(0.0)),
        Some(_) => format_percent(percent_of(Some(value), total)),
    }
}

fn display_point(value: f64, total: Option<f64>, mode: DisplayMode) -> String {
    match mode {
        DisplayMode::Number => format_number(Some(value)),
        DisplayMode::Percentage => share(value, total),
        DisplayMode::NumberPercentage => {
            format!("{} ({})", format_number(Some(value)), share(value, total))
        }
    }
}

/// Insertion-ordered set of group values.
#[derive(Default)]
struct Axis {
    values: Vec<GroupValue>,
    index: HashMap<String, usize>,
}

impl Axis {
    fn insert(&mut self, value: GroupValue) -> usize {
        if let Some(&idx) = self.index.get(&value.key) {
            return idx;
        }
        let idx = self.values.len();
        self.index.insert(value.key.clone(), idx);
        self.values.push(value);
        idx
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// ISO keys sort chronologically.
    fn sort_by_key(&mut self) {
        self.values.sort_by(|a, b| a.key.cmp(&b.key));
        self.index = self
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.key.clone(), i))
            .collect();
    }
}
