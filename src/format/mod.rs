//! Payload formatter - shapes a `WidgetQueryResult` into a chart payload.
//!
//! Formatting is total over valid results: empty or degenerate input
//! degrades to empty series or null scalars, never to an error. Output is
//! deterministic; maps are ordered and series follow row order.

pub mod coerce;
pub mod scalar;
pub mod series;
pub mod table;

use serde::Serialize;

use crate::bucket::DEFAULT_MAX_POINTS;
use crate::result::WidgetQueryResult;
use crate::widget::{ChartType, Timeframe, WidgetDefinition};

pub use scalar::ScalarPayload;
pub use series::{Dataset, SeriesPayload};
pub use table::{TableCell, TablePayload, TableRow};

/// A rendered widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Series(SeriesPayload),
    Scalar(ScalarPayload),
    Table(TablePayload),
}

impl Payload {
    pub fn chart_type(&self) -> ChartType {
        match self {
            Payload::Series(p) => p.chart_type,
            Payload::Scalar(p) => p.chart_type,
            Payload::Table(p) => p.chart_type,
        }
    }
}

/// Format with the default point cap.
pub fn format_widget_payload(
    result: &WidgetQueryResult,
    definition: &WidgetDefinition,
    timeframe: &Timeframe,
) -> Payload {
    format_with_cap(result, definition, timeframe, DEFAULT_MAX_POINTS)
}

pub fn format_with_cap(
    result: &WidgetQueryResult,
    definition: &WidgetDefinition,
    timeframe: &Timeframe,
    max_points: usize,
) -> Payload {
    let options = &definition.options;
    match result.chart_type {
        ChartType::Bar | ChartType::Line | ChartType::Pie | ChartType::Timechart => {
            Payload::Series(series::format_series(result, options, timeframe, max_points))
        }
        ChartType::Number | ChartType::Percentage => {
            Payload::Scalar(scalar::format_scalar(result, options))
        }
        ChartType::Table => Payload::Table(table::format_table(result, options)),
    }
}
