//! Number and percentage payloads.

use serde::Serialize;

use super::coerce::{format_number, format_percent, numeric, percent_of};
use crate::result::WidgetQueryResult;
use crate::widget::{ChartType, DisplayMode, WidgetOptions};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarPayload {
    pub chart_type: ChartType,
    pub label: String,
    /// Formatted value; `--` when there is none.
    pub value: String,
    pub raw: Option<f64>,
}

pub fn format_scalar(result: &WidgetQueryResult, options: &WidgetOptions) -> ScalarPayload {
    let first = result.rows.first();

    let ratio = options
        .percentage_numerator
        .as_deref()
        .zip(options.percentage_denominator.as_deref());

    let (label, raw, as_percent) = match ratio {
        Some((numerator, denominator)) => {
            let num = numeric(first.and_then(|r| r.get(numerator)));
            let den = numeric(first.and_then(|r| r.get(denominator)));
            // Null, not zero, when the denominator is missing or zero.
            (numerator.to_string(), percent_of(num, den), true)
        }
        None => {
            let label = result
                .value_labels
                .first()
                .or_else(|| result.select_labels.first())
                .cloned()
                .unwrap_or_default();
            let raw = numeric(first.and_then(|r| r.get(&label)));
            let as_percent = result.chart_type == ChartType::Percentage
                || options.display == Some(DisplayMode::Percentage);
            (label, raw, as_percent)
        }
    };

    let value = if as_percent {
        format_percent(raw)
    } else {
        format_number(raw)
    };

    ScalarPayload {
        chart_type: result.chart_type,
        label: options.total_label.clone().unwrap_or(label),
        value,
        raw,
    }
}
