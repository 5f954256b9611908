//! Shared value coercion and display formatting.

use crate::bucket::{sort_key, TimeBucket};
use crate::result::CellValue;

/// Display text for a missing or non-finite number.
pub const MISSING: &str = "--";

/// Canonical label for a null or blank group value.
pub const NOT_AVAILABLE: &str = "N/A";

/// A group value ready for axis placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupValue {
    /// Identity and ordering key; ISO-8601 for timestamps.
    pub key: String,
    pub display: String,
}

pub fn numeric(cell: Option<&CellValue>) -> Option<f64> {
    cell.and_then(CellValue::as_f64)
}

pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Integers print without decimals, everything else with two.
pub fn format_number(value: Option<f64>) -> String {
    match value.and_then(finite) {
        None => MISSING.to_string(),
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Some(v) => format!("{:.2}", v),
    }
}

pub fn format_percent(value: Option<f64>) -> String {
    match value.and_then(finite) {
        None => MISSING.to_string(),
        Some(v) => format!("{:.1}%", v),
    }
}

/// `part / whole * 100`, null when `whole` is null or zero.
pub fn percent_of(part: Option<f64>, whole: Option<f64>) -> Option<f64> {
    match (part, whole) {
        (Some(part), Some(whole)) if whole != 0.0 => finite(part / whole * 100.0),
        _ => None,
    }
}

/// Canonicalize a cell used as a group value.
pub fn group_value(cell: Option<&CellValue>, bucket: Option<TimeBucket>) -> GroupValue {
    let text = |s: String| GroupValue {
        key: s.clone(),
        display: s,
    };
    match cell {
        None | Some(CellValue::Null) => text(NOT_AVAILABLE.to_string()),
        Some(CellValue::Text(s)) if s.trim().is_empty() => text(NOT_AVAILABLE.to_string()),
        Some(CellValue::Text(s)) => text(s.clone()),
        Some(CellValue::Int(n)) => text(n.to_string()),
        Some(CellValue::Float(f)) => text(format_number(Some(*f))),
        Some(CellValue::Timestamp(ts)) => GroupValue {
            key: sort_key(*ts),
            display: match bucket {
                Some(bucket) => bucket.display(*ts),
                None => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            },
        },
    }
}
