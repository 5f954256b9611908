//! Row-level scope: predicate placement, composition and fail-closed lookups.

#[path = "../common/mod.rs"]
mod common;

use lookout::access::{resolve_scope, AccessControl, AccessScope, StaticAccessControl};
use lookout::compiler::WidgetCompiler;
use lookout::error::{AccessError, AccessResult};
use lookout::plan::QueryPlan;
use lookout::schema::SchemaRegistry;
use lookout::sql::Dialect;
use lookout::widget::{Timeframe, WidgetDefinition};
use serde_json::json;

fn plan(value: serde_json::Value) -> QueryPlan {
    let definition = WidgetDefinition::from_value(value).unwrap();
    WidgetCompiler::new(SchemaRegistry::incidents())
        .compile(&definition, &Timeframe::unbounded())
        .unwrap()
}

fn by_severity() -> QueryPlan {
    plan(json!({
        "chart_type": "bar",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}],
        "group_by": ["severities.severity_name"]
    }))
}

#[test]
fn test_unrestricted_leaves_plan_untouched() {
    let original = by_severity();
    let scoped = AccessScope::Unrestricted.apply(original.clone(), SchemaRegistry::incidents());
    assert_eq!(scoped, original);
}

#[test]
fn test_predicate_lands_in_where_before_grouping() {
    let scoped = AccessScope::scoped([7], []).apply(by_severity(), SchemaRegistry::incidents());
    let sql = scoped.to_sql(Dialect::Sqlite);

    let filter = sql.find("\"alerts\".\"alert_customer_id\" IN (?1)").expect("scope predicate");
    let where_at = sql.find("WHERE").expect("where clause");
    let group_at = sql.find("GROUP BY").expect("group by");
    assert!(where_at < filter && filter < group_at, "{sql}");
    assert!(!sql.contains("HAVING"));
}

#[test]
fn test_scope_is_anded_with_user_filters() {
    let filtered = plan(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}],
        "filters": [{"table": "alerts", "column": "alert_source", "operator": "eq", "value": "edr"}]
    }));
    let scoped = AccessScope::scoped([7], [42]).apply(filtered, SchemaRegistry::incidents());
    let sql = scoped.to_sql(Dialect::Sqlite);

    // The OR between customer and case visibility must stay grouped.
    assert!(
        sql.contains("\"alerts\".\"alert_source\" = ?1 AND (\"alerts\".\"alert_customer_id\" IN (?2) OR"),
        "{sql}"
    );
}

#[test]
fn test_deny_all_renders_false_predicate() {
    let scoped = AccessScope::deny_all().apply(by_severity(), SchemaRegistry::incidents());
    assert!(scoped.to_sql(Dialect::Postgres).contains("1 = 0"));
    assert!(scoped.params.is_empty());
}

#[test]
fn test_user_filter_cannot_widen_scope() {
    let engine = common::engine();
    let definition = WidgetDefinition::from_value(json!({
        "chart_type": "number",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}],
        "filters": [{"table": "alerts", "column": "alert_customer_id", "operator": "in", "value": [7, 8, 9]}]
    }))
    .unwrap();

    let result = engine
        .execute_widget(&definition, &Timeframe::unbounded(), &AccessScope::scoped([8], []))
        .unwrap();
    assert_eq!(result.rows[0]["n"], lookout::result::CellValue::Int(1));
}

#[test]
fn test_static_lookup() {
    let access = StaticAccessControl::new()
        .grant("admin", AccessScope::Unrestricted)
        .grant("acme", AccessScope::scoped([7], []));

    assert_eq!(resolve_scope(&access, "admin"), AccessScope::Unrestricted);
    assert_eq!(resolve_scope(&access, "acme"), AccessScope::scoped([7], []));
    assert!(matches!(
        access.scope_for("nobody"),
        Err(AccessError::UnknownPrincipal(_))
    ));
    assert!(resolve_scope(&access, "nobody").is_deny_all());
}

struct Offline;

impl AccessControl for Offline {
    fn scope_for(&self, _principal: &str) -> AccessResult<AccessScope> {
        Err(AccessError::Lookup("connection refused".into()))
    }
}

#[test]
fn test_lookup_failure_fails_closed() {
    assert!(resolve_scope(&Offline, "admin").is_deny_all());
}
