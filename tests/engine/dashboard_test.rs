//! Dashboard fetches with mixed widget outcomes.

#[path = "../common/mod.rs"]
mod common;

use lookout::access::{AccessControl, AccessScope, StaticAccessControl};
use lookout::dashboard::{DashboardRunner, DashboardWidget, WidgetOutcome};
use lookout::error::{AccessError, AccessResult};
use lookout::format::Payload;
use lookout::widget::{Timeframe, WidgetDefinition};
use serde_json::json;

fn widget(id: &str, value: serde_json::Value) -> DashboardWidget {
    DashboardWidget::new(id, WidgetDefinition::from_value(value).expect("well-formed widget"))
}

fn dashboard() -> Vec<DashboardWidget> {
    vec![
        widget(
            "total",
            json!({
                "chart_type": "number",
                "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}]
            }),
        ),
        widget(
            "by_severity",
            json!({
                "chart_type": "pie",
                "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}],
                "group_by": ["severities.severity_name"]
            }),
        ),
        widget(
            "broken",
            json!({
                "chart_type": "bar",
                "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "median"}]
            }),
        ),
    ]
}

fn total(outcome: &WidgetOutcome) -> String {
    match outcome {
        WidgetOutcome::Ok {
            payload: Payload::Scalar(p),
        } => p.value.clone(),
        other => panic!("expected scalar outcome, got {other:?}"),
    }
}

#[test]
fn test_failing_widget_does_not_affect_siblings() {
    let engine = common::engine();
    let access = StaticAccessControl::new().grant("analyst", AccessScope::Unrestricted);

    let outcomes =
        DashboardRunner::new(&engine, &access).fetch("analyst", &dashboard(), &Timeframe::unbounded());

    assert_eq!(outcomes.len(), 3);
    assert_eq!(total(&outcomes["total"]), "5");
    assert!(outcomes["by_severity"].is_ok());
    assert_eq!(
        outcomes["broken"],
        WidgetOutcome::Error {
            message: "Unsupported aggregation: median".to_string()
        }
    );
}

#[test]
fn test_store_failure_is_opaque_and_isolated() {
    let engine = common::engine();
    engine
        .store()
        .connection()
        .execute_batch("DROP TABLE severities")
        .unwrap();
    let access = StaticAccessControl::new().grant("analyst", AccessScope::Unrestricted);

    let outcomes =
        DashboardRunner::new(&engine, &access).fetch("analyst", &dashboard(), &Timeframe::unbounded());

    assert_eq!(total(&outcomes["total"]), "5");
    assert_eq!(
        outcomes["by_severity"],
        WidgetOutcome::Error {
            message: "An unexpected error occurred".to_string()
        }
    );

    let json = serde_json::to_string(&outcomes["by_severity"]).unwrap();
    assert!(!json.contains("severities"));
}

#[test]
fn test_unknown_principal_sees_nothing() {
    let engine = common::engine();
    let access = StaticAccessControl::new().grant("analyst", AccessScope::Unrestricted);

    let outcomes =
        DashboardRunner::new(&engine, &access).fetch("intruder", &dashboard(), &Timeframe::unbounded());

    assert_eq!(total(&outcomes["total"]), "0");
}

struct UnavailableDirectory;

impl AccessControl for UnavailableDirectory {
    fn scope_for(&self, _principal: &str) -> AccessResult<AccessScope> {
        Err(AccessError::Lookup("directory timed out".into()))
    }
}

#[test]
fn test_failed_scope_lookup_fails_closed() {
    let engine = common::engine();

    let outcomes = DashboardRunner::new(&engine, &UnavailableDirectory).fetch(
        "analyst",
        &dashboard(),
        &Timeframe::unbounded(),
    );

    assert_eq!(total(&outcomes["total"]), "0");
    match &outcomes["by_severity"] {
        WidgetOutcome::Ok {
            payload: Payload::Series(p),
        } => assert!(p.labels.is_empty()),
        other => panic!("expected empty series, got {other:?}"),
    }
}

#[test]
fn test_scoped_principal() {
    let engine = common::engine();
    let access = StaticAccessControl::new().grant("acme", AccessScope::scoped([7], []));

    let outcomes =
        DashboardRunner::new(&engine, &access).fetch("acme", &dashboard(), &Timeframe::unbounded());

    assert_eq!(total(&outcomes["total"]), "2");
    match &outcomes["by_severity"] {
        WidgetOutcome::Ok {
            payload: Payload::Series(p),
        } => {
            assert_eq!(p.labels, vec!["high"]);
            assert_eq!(p.datasets[0].data, vec![2.0]);
        }
        other => panic!("expected series, got {other:?}"),
    }
}
