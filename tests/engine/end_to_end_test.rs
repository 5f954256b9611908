//! Widgets executed against the in-memory incident fixture.

#[path = "../common/mod.rs"]
mod common;

use lookout::access::AccessScope;
use lookout::format::Payload;
use lookout::result::CellValue;
use lookout::widget::{Timeframe, WidgetDefinition};
use lookout::QueryExecutionError;
use serde_json::json;

fn widget(value: serde_json::Value) -> WidgetDefinition {
    WidgetDefinition::from_value(value).expect("well-formed widget")
}

fn payload(definition: &WidgetDefinition, timeframe: &Timeframe, scope: &AccessScope) -> Payload {
    let engine = common::engine();
    let result = engine
        .execute_widget(definition, timeframe, scope)
        .expect("widget executes");
    engine.format_widget_payload(&result, definition, timeframe)
}

fn scalar(payload: Payload) -> lookout::format::ScalarPayload {
    match payload {
        Payload::Scalar(p) => p,
        other => panic!("expected scalar payload, got {other:?}"),
    }
}

fn series(payload: Payload) -> lookout::format::SeriesPayload {
    match payload {
        Payload::Series(p) => p,
        other => panic!("expected series payload, got {other:?}"),
    }
}

fn table(payload: Payload) -> lookout::format::TablePayload {
    match payload {
        Payload::Table(p) => p,
        other => panic!("expected table payload, got {other:?}"),
    }
}

// =============================================================================
// Scalars
// =============================================================================

#[test]
fn test_count_number_widget() {
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "total"}]
    }));

    let p = scalar(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.value, "5");
    assert_eq!(p.raw, Some(5.0));
    assert_eq!(p.label, "total");
}

#[test]
fn test_count_over_window_holding_every_row() {
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "total"}]
    }));
    let timeframe = common::window("2024-01-01", "2024-01-04T23:59:59");

    let p = scalar(payload(&definition, &timeframe, &AccessScope::Unrestricted));
    assert_eq!(p.value, "5");
}

#[test]
fn test_date_only_end_includes_the_whole_day() {
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "total"}]
    }));
    let timeframe: Timeframe =
        serde_json::from_value(json!({"start": "2024-01-04", "end": "2024-01-04"})).unwrap();

    let p = scalar(payload(&definition, &timeframe, &AccessScope::Unrestricted));
    assert_eq!(p.value, "2");
}

#[test]
fn test_ratio_without_matches_is_zero() {
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{
            "table": "alerts",
            "column": "alert_id",
            "aggregation": "ratio",
            "alias": "phishing_share",
            "filter": {"table": "alerts", "column": "alert_source", "operator": "eq", "value": "phishing"}
        }]
    }));

    let p = scalar(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.raw, Some(0.0));
    assert_eq!(p.value, "0");
}

#[test]
fn test_ratio_share_of_rows() {
    let definition = widget(json!({
        "chart_type": "percentage",
        "fields": [{
            "table": "alerts",
            "column": "alert_id",
            "aggregation": "ratio",
            "alias": "edr_share",
            "filter": {"table": "alerts", "column": "alert_source", "operator": "eq", "value": "edr"}
        }]
    }));

    let p = scalar(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.raw, Some(40.0));
    assert_eq!(p.value, "40.0%");
}

#[test]
fn test_ratio_over_empty_window_is_zero() {
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{
            "table": "alerts",
            "column": "alert_id",
            "aggregation": "ratio",
            "alias": "edr_share",
            "filter": {"table": "alerts", "column": "alert_source", "operator": "eq", "value": "edr"}
        }]
    }));
    let timeframe = common::window("2023-06-01", "2023-06-30T23:59:59");

    let p = scalar(payload(&definition, &timeframe, &AccessScope::Unrestricted));
    assert_eq!(p.raw, Some(0.0));
}

#[test]
fn test_percentage_with_zero_denominator_is_missing() {
    let definition = widget(json!({
        "chart_type": "percentage",
        "fields": [
            {
                "table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "closed",
                "filter": {"table": "alerts", "column": "alert_status_id", "operator": "eq", "value": 99}
            },
            {
                "table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "watched",
                "filter": {"table": "alerts", "column": "alert_status_id", "operator": "eq", "value": 98}
            }
        ],
        "options": {"percentage_numerator": "closed", "percentage_denominator": "watched"}
    }));

    let p = scalar(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.raw, None);
    assert_eq!(p.value, "--");
}

#[test]
fn test_percentage_numerator_over_denominator() {
    let definition = widget(json!({
        "chart_type": "percentage",
        "fields": [
            {
                "table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "closed",
                "filter": {"table": "alert_status", "column": "status_name", "operator": "eq", "value": "closed"}
            },
            {"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "all_alerts"}
        ],
        "options": {"percentage_numerator": "closed", "percentage_denominator": "all_alerts"}
    }));

    let p = scalar(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.raw, Some(40.0));
    assert_eq!(p.value, "40.0%");
}

#[test]
fn test_avg_over_no_rows_is_missing() {
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_severity_id", "aggregation": "avg"}]
    }));
    let timeframe = common::window("2023-06-01", "2023-06-30");

    let p = scalar(payload(&definition, &timeframe, &AccessScope::Unrestricted));
    assert_eq!(p.raw, None);
    assert_eq!(p.value, "--");
}

// =============================================================================
// Series
// =============================================================================

#[test]
fn test_bar_grouped_through_join() {
    let definition = widget(json!({
        "chart_type": "bar",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"}],
        "group_by": ["severities.severity_name"]
    }));

    let p = series(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.labels, vec!["high", "low", "medium"]);
    assert_eq!(p.datasets.len(), 1);
    assert_eq!(p.datasets[0].label, "alerts");
    assert_eq!(p.datasets[0].data, vec![2.0, 2.0, 1.0]);
    assert_eq!(p.grand_total, Some(5.0));
}

#[test]
fn test_explicit_sort_and_limit() {
    let definition = widget(json!({
        "chart_type": "bar",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"}],
        "group_by": ["alerts.alert_source"],
        "options": {"sort": "asc", "limit": 1}
    }));

    let p = series(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.labels, vec!["mail"]);
    assert_eq!(p.datasets[0].data, vec![1.0]);
}

#[test]
fn test_day_gap_fill_over_empty_window() {
    let definition = widget(json!({
        "chart_type": "timechart",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"}],
        "time_bucket": "day"
    }));
    let timeframe = common::window("2024-01-05", "2024-01-07T23:59:59");

    let p = series(payload(&definition, &timeframe, &AccessScope::Unrestricted));
    assert_eq!(p.labels, vec!["2024-01-05", "2024-01-06", "2024-01-07"]);
    assert_eq!(p.datasets.len(), 1);
    assert_eq!(p.datasets[0].data, vec![0.0, 0.0, 0.0]);
    assert_eq!(p.datasets[0].total, None);
}

#[test]
fn test_day_series_fills_missing_buckets() {
    let definition = widget(json!({
        "chart_type": "line",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"}],
        "time_bucket": "day"
    }));
    let timeframe = common::window("2024-01-01", "2024-01-04T23:59:59");

    let p = series(payload(&definition, &timeframe, &AccessScope::Unrestricted));
    assert_eq!(
        p.labels,
        vec!["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"]
    );
    assert_eq!(
        p.keys,
        vec![
            "2024-01-01T00:00:00",
            "2024-01-02T00:00:00",
            "2024-01-03T00:00:00",
            "2024-01-04T00:00:00"
        ]
    );
    assert_eq!(p.datasets[0].data, vec![2.0, 0.0, 1.0, 2.0]);
    assert_eq!(p.datasets[0].total, Some(5.0));
}

#[test]
fn test_time_series_fans_out_by_secondary_group() {
    let definition = widget(json!({
        "chart_type": "timechart",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"}],
        "group_by": ["alerts.alert_source"],
        "time_bucket": "day"
    }));
    let timeframe = common::window("2024-01-01", "2024-01-04T23:59:59");

    let p = series(payload(&definition, &timeframe, &AccessScope::Unrestricted));
    let labels: Vec<&str> = p.datasets.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(labels, vec!["alerts \u{2013} edr", "alerts \u{2013} ids", "alerts \u{2013} mail"]);
    assert_eq!(p.datasets[0].data, vec![2.0, 0.0, 0.0, 0.0]);
    assert_eq!(p.datasets[1].data, vec![0.0, 0.0, 1.0, 1.0]);
    assert_eq!(p.datasets[2].data, vec![0.0, 0.0, 0.0, 1.0]);
    assert_eq!(p.percentages["alerts \u{2013} edr"], Some(40.0));
}

#[test]
fn test_unbounded_time_series_uses_observed_buckets() {
    let definition = widget(json!({
        "chart_type": "timechart",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"}],
        "time_bucket": "day"
    }));

    let p = series(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.labels, vec!["2024-01-01", "2024-01-03", "2024-01-04"]);
    assert_eq!(p.datasets[0].data, vec![2.0, 1.0, 2.0]);
}

/// Fixture plus alerts stored in SQLite's `datetime()` layout.
fn engine_with_mixed_timestamps() -> lookout::WidgetEngine<lookout::executor::SqliteStore> {
    let engine = common::engine();
    engine
        .store()
        .connection()
        .execute_batch(
            "INSERT INTO alerts (alert_id, alert_source, alert_severity_id, alert_customer_id, alert_creation_time)
             VALUES (6, 'edr', 1, 7, '2024-02-10 09:00:00'),
                    (7, 'ids', 2, 8, '2024-02-10 18:00:00.250');",
        )
        .unwrap();
    engine
}

#[test]
fn test_timeframe_matches_every_stored_timestamp_layout() {
    let engine = engine_with_mixed_timestamps();
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "total"}]
    }));

    let count = |timeframe: &Timeframe| {
        let result = engine
            .execute_widget(&definition, timeframe, &AccessScope::Unrestricted)
            .unwrap();
        scalar(engine.format_widget_payload(&result, &definition, timeframe)).value
    };

    assert_eq!(count(&common::window("2024-02-10", "2024-02-10T23:59:59")), "2");
    assert_eq!(count(&common::window("2024-02-10T09:00:00", "2024-02-10T09:00:00")), "1");
    assert_eq!(count(&common::window("2024-02-10T18:00:01", "2024-02-28")), "0");
    assert_eq!(count(&common::window("2024-01-01", "2024-01-04T23:59:59")), "5");
}

#[test]
fn test_timestamp_filter_and_buckets_on_mixed_layouts() {
    let engine = engine_with_mixed_timestamps();
    let definition = widget(json!({
        "chart_type": "timechart",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"}],
        "filters": [{
            "table": "alerts", "column": "alert_creation_time", "operator": "gte", "value": "2024-02-01"
        }],
        "time_bucket": "hour"
    }));

    let timeframe = Timeframe::unbounded();
    let result = engine
        .execute_widget(&definition, &timeframe, &AccessScope::Unrestricted)
        .unwrap();
    let p = series(engine.format_widget_payload(&result, &definition, &timeframe));
    assert_eq!(p.keys, vec!["2024-02-10T09:00:00", "2024-02-10T18:00:00"]);
    assert_eq!(p.datasets[0].data, vec![1.0, 1.0]);
}

#[test]
fn test_contains_is_case_insensitive_and_escaped() {
    let by_title = |needle: &str| {
        widget(json!({
            "chart_type": "number",
            "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}],
            "filters": [{"table": "alerts", "column": "alert_title", "operator": "contains", "value": needle}]
        }))
    };

    let hits = scalar(payload(&by_title("BEACON"), &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(hits.value, "2");

    let wildcard = scalar(payload(&by_title("%"), &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(wildcard.value, "0");
}

#[test]
fn test_in_and_null_filters() {
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}],
        "filters": [
            {"table": "alerts", "column": "alert_source", "operator": "in", "value": ["edr", "ids"]},
            {"table": "alerts", "column": "alert_resolution_status_id", "operator": "eq", "value": null}
        ]
    }));

    let p = scalar(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.value, "2");
}

#[test]
fn test_injection_payload_is_bound_not_spliced() {
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}],
        "filters": [{
            "table": "alerts", "column": "alert_source", "operator": "eq",
            "value": "edr' OR '1'='1"
        }]
    }));

    let p = scalar(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.value, "0");
}

// =============================================================================
// Tables
// =============================================================================

#[test]
fn test_table_percentages_sum_to_hundred() {
    let definition = widget(json!({
        "chart_type": "table",
        "fields": [
            {"table": "alerts", "column": "alert_source", "alias": "source"},
            {"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"}
        ]
    }));

    let p = table(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    assert_eq!(p.group_columns, vec!["source"]);
    assert_eq!(p.value_columns, vec!["alerts"]);

    let sources: Vec<&str> = p.rows.iter().map(|r| r.groups["source"].as_str()).collect();
    assert_eq!(sources, vec!["edr", "ids", "mail"]);

    let percentages: Vec<&str> = p
        .rows
        .iter()
        .map(|r| r.values["alerts"].percentage.as_str())
        .collect();
    assert_eq!(percentages, vec!["40.0%", "40.0%", "20.0%"]);

    let shares: f64 = p.rows.iter().filter_map(|r| r.values["alerts"].share).sum();
    assert!((shares - 100.0).abs() < 1e-9);
    assert_eq!(p.totals["alerts"], Some(5.0));
}

#[test]
fn test_case_join_groups_unlinked_alerts_as_not_available() {
    let definition = widget(json!({
        "chart_type": "table",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"}],
        "group_by": ["cases.name"]
    }));

    let p = table(payload(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted));
    let groups: Vec<(&str, Option<f64>)> = p
        .rows
        .iter()
        .map(|r| (r.groups["cases_name"].as_str(), r.values["alerts"].value))
        .collect();
    assert_eq!(groups, vec![("N/A", Some(4.0)), ("Invoice campaign", Some(1.0))]);
}

// =============================================================================
// Scope
// =============================================================================

#[test]
fn test_deny_all_sees_no_rows() {
    let engine = common::engine();
    let definition = widget(json!({
        "chart_type": "bar",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count"}],
        "group_by": ["alerts.alert_source"]
    }));

    let result = engine
        .execute_widget(&definition, &Timeframe::unbounded(), &AccessScope::deny_all())
        .unwrap();
    assert!(result.is_empty());

    let p = series(engine.format_widget_payload(&result, &definition, &Timeframe::unbounded()));
    assert!(p.labels.is_empty());
    assert_eq!(p.grand_total, None);
}

#[test]
fn test_scope_applies_before_aggregation() {
    let count = widget(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}]
    }));
    let run = |scope: AccessScope| {
        scalar(payload(&count, &Timeframe::unbounded(), &scope)).value
    };

    assert_eq!(run(AccessScope::scoped([7], [])), "2");
    assert_eq!(run(AccessScope::scoped([], [42])), "1");
    assert_eq!(run(AccessScope::scoped([8], [42])), "2");
    assert_eq!(run(AccessScope::scoped([9], [42])), "2");
    assert_eq!(run(AccessScope::deny_all()), "0");
}

#[test]
fn test_scope_combines_with_timeframe() {
    let engine = common::engine();
    let definition = widget(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}]
    }));
    let timeframe = common::window("2024-01-02", "2024-01-31");

    let result = engine
        .execute_widget(&definition, &timeframe, &AccessScope::scoped([7, 8], []))
        .unwrap();
    assert_eq!(result.rows[0]["n"], CellValue::Int(1));
}

// =============================================================================
// Errors and determinism
// =============================================================================

#[test]
fn test_definition_errors_surface_verbatim() {
    let engine = common::engine();
    let definition = widget(json!({
        "chart_type": "table",
        "fields": [{"table": "users", "column": "password"}]
    }));

    let err = engine
        .execute_widget(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted)
        .unwrap_err();
    assert!(err.is_definition_error());
    assert_eq!(err.client_message(), "Unknown column: users.password");
}

#[test]
fn test_store_errors_are_opaque() {
    let engine = common::engine();
    engine
        .store()
        .connection()
        .execute_batch("DROP TABLE severities")
        .unwrap();
    let definition = widget(json!({
        "chart_type": "bar",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count"}],
        "group_by": ["severities.severity_name"]
    }));

    let err = engine
        .execute_widget(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted)
        .unwrap_err();
    assert!(matches!(err, QueryExecutionError::Store(_)));
    assert_eq!(err.client_message(), "An unexpected error occurred");
}

#[test]
fn test_payload_is_deterministic() {
    let definition = widget(json!({
        "chart_type": "timechart",
        "fields": [
            {"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "alerts"},
            {"table": "alerts", "column": "alert_severity_id", "aggregation": "max", "alias": "worst"}
        ],
        "group_by": ["severities.severity_name"],
        "time_bucket": "day",
        "options": {"display": "number_percentage"}
    }));
    let timeframe = common::window("2024-01-01", "2024-01-04T23:59:59");

    let render = || {
        serde_json::to_string(&payload(&definition, &timeframe, &AccessScope::Unrestricted))
            .unwrap()
    };
    assert_eq!(render(), render());
}
