//! Table payloads with per-column totals and percentage-of-total cells.

use std::collections::BTreeMap;

use serde::Serialize;

use super::coerce::{format_number, format_percent, group_value, numeric, percent_of, MISSING};
use crate::result::{Row, WidgetQueryResult};
use crate::widget::{ChartType, WidgetOptions};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePayload {
    pub chart_type: ChartType,
    pub group_columns: Vec<String>,
    pub value_columns: Vec<String>,
    pub rows: Vec<TableRow>,
    /// Value column to total; null when the column has no numeric cell.
    pub totals: BTreeMap<String, Option<f64>>,
    pub total_display: BTreeMap<String, String>,
    pub total_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub groups: BTreeMap<String, String>,
    pub values: BTreeMap<String, TableCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCell {
    pub value: Option<f64>,
    pub display: String,
    pub share: Option<f64>,
    /// `--` for a column without data, `0.0%` for an all-zero column.
    pub percentage: String,
}

pub fn format_table(result: &WidgetQueryResult, options: &WidgetOptions) -> TablePayload {
    let (group_columns, value_columns) = partition_columns(result);
    let time_axis = result.time_axis();

    let totals: BTreeMap<String, Option<f64>> = value_columns
        .iter()
        .map(|column| {
            let total = result
                .rows
                .iter()
                .filter_map(|row| numeric(row.get(column)))
                .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v));
            (column.clone(), total)
        })
        .collect();

    let rows = result
        .rows
        .iter()
        .map(|row| {
            let groups = group_columns
                .iter()
                .map(|column| {
                    let bucket = time_axis
                        .filter(|(label, _)| *label == column.as_str())
                        .map(|(_, bucket)| bucket);
                    (column.clone(), group_value(row.get(column), bucket).display)
                })
                .collect();
            let values = value_columns
                .iter()
                .map(|column| {
                    let total = totals.get(column).copied().flatten();
                    (column.clone(), cell(numeric(row.get(column)), total))
                })
                .collect();
            TableRow { groups, values }
        })
        .collect();

    let total_display = totals
        .iter()
        .map(|(column, total)| (column.clone(), format_number(*total)))
        .collect();

    TablePayload {
        chart_type: result.chart_type,
        group_columns,
        value_columns,
        rows,
        totals,
        total_display,
        total_label: options
            .total_label
            .clone()
            .unwrap_or_else(|| super::series::DEFAULT_TOTAL_LABEL.to_string()),
    }
}

fn cell(value: Option<f64>, total: Option<f64>) -> TableCell {
    let (share, percentage) = match (value, total) {
        (_, None) => (None, MISSING.to_string()),
        (Some(_), Some(t)) if t == 0.0 => (Some(0.0), format_percent(Some(0.0))),
        (None, Some(_)) => (None, MISSING.to_string()),
        (Some(v), Some(t)) => {
            let share = percent_of(Some(v), Some(t));
            (share, format_percent(share))
        }
    };
    TableCell {
        value,
        display: format_number(value),
        share,
        percentage,
    }
}

/// Declared group/value labels, or a guess from the row keys when neither
/// is declared: columns whose non-null cells are all numeric hold values.
fn partition_columns(result: &WidgetQueryResult) -> (Vec<String>, Vec<String>) {
    if !result.group_labels.is_empty() || !result.value_labels.is_empty() {
        return (result.group_labels.clone(), result.value_labels.clone());
    }

    let mut keys: Vec<&String> = Vec::new();
    for row in &result.rows {
        for key in row.keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    let is_value = |key: &str, rows: &[Row]| {
        let mut seen = false;
        for row in rows {
            match row.get(key) {
                None => {}
                Some(cell) if cell.is_null() => {}
                Some(cell) if cell.as_f64().is_some() => seen = true,
                Some(_) => return false,
            }
        }
        seen
    };

    let (values, groups): (Vec<&String>, Vec<&String>) =
        keys.into_iter().partition(|k| is_value(k.as_str(), &result.rows));
    (
        groups.into_iter().cloned().collect(),
        values.into_iter().cloned().collect(),
    )
}
