//! Bucket arithmetic, range generation, and agreement between the Rust
//! floor and the SQL bucket expression executed by SQLite.

use chrono::NaiveDateTime;
use lookout::access::AccessScope;
use lookout::bucket::{generate_range, parse_timestamp, sort_key, TimeBucket, DEFAULT_MAX_POINTS};
use lookout::executor::SqliteStore;
use lookout::result::CellValue;
use lookout::widget::{Timeframe, WidgetDefinition};
use rusqlite::types::Value;
use lookout::WidgetEngine;
use serde_json::json;

fn ts(raw: &str) -> NaiveDateTime {
    parse_timestamp(raw).unwrap()
}

const SAMPLES: &[&str] = &[
    "2024-01-07T13:47:59",
    "2024-01-01T00:00:00",
    "2024-02-29T23:59:59",
    "2023-12-31T23:14:00",
    "2024-03-31T12:30:00",
    "2024-12-30T00:05:00",
];

// =============================================================================
// Floor and advance
// =============================================================================

#[test]
fn test_floor_is_idempotent_and_bounded() {
    for bucket in TimeBucket::ALL {
        for raw in SAMPLES {
            let t = ts(raw);
            let start = bucket.floor(t);
            let next = bucket.advance(t);

            assert!(start <= t, "{bucket} floor of {raw}");
            assert!(t < next, "{bucket} advance of {raw}");
            assert_eq!(bucket.floor(start), start, "{bucket} floor of floor {raw}");
            assert_eq!(bucket.floor(next), next, "{bucket} advance lands on a boundary");
            assert_eq!(bucket.advance(start), next);
        }
    }
}

#[test]
fn test_week_starts_on_monday() {
    use chrono::{Datelike, Weekday};
    for raw in SAMPLES {
        assert_eq!(TimeBucket::Week.floor(ts(raw)).weekday(), Weekday::Mon, "{raw}");
    }
    assert_eq!(
        TimeBucket::Week.floor(ts("2024-01-07T13:47:59")),
        ts("2024-01-01T00:00:00")
    );
}

#[test]
fn test_month_and_year_follow_the_calendar() {
    assert_eq!(
        TimeBucket::Month.advance(ts("2024-01-31T10:00:00")),
        ts("2024-02-01")
    );
    assert_eq!(
        TimeBucket::Month.advance(ts("2024-12-15")),
        ts("2025-01-01")
    );
    assert_eq!(TimeBucket::Year.advance(ts("2024-02-29")), ts("2025-01-01"));
}

// =============================================================================
// Ranges
// =============================================================================

#[test]
fn test_range_is_strictly_ascending_and_aligned() {
    let (start, end) = (ts("2024-01-01T08:10:00"), ts("2024-01-03T17:00:00"));
    for bucket in TimeBucket::ALL {
        let points = generate_range(start, end, bucket, 10_000);
        assert!(!points.is_empty(), "{bucket}");
        assert_eq!(points[0], bucket.floor(start));
        assert!(points.windows(2).all(|w| w[0] < w[1]));
        assert!(points.iter().all(|p| bucket.floor(*p) == *p));
        assert!(*points.last().unwrap() <= end);
        assert!(bucket.advance(*points.last().unwrap()) > end);
    }
}

#[test]
fn test_leap_year_point_counts() {
    let (start, end) = (ts("2024-01-01"), ts("2024-12-31T23:59:59"));
    assert_eq!(generate_range(start, end, TimeBucket::Day, DEFAULT_MAX_POINTS).len(), 366);
    assert_eq!(generate_range(start, end, TimeBucket::Month, DEFAULT_MAX_POINTS).len(), 12);
    assert_eq!(generate_range(start, end, TimeBucket::Year, DEFAULT_MAX_POINTS).len(), 1);
    assert_eq!(generate_range(start, end, TimeBucket::Week, DEFAULT_MAX_POINTS).len(), 53);
}

#[test]
fn test_range_over_cap_is_refused() {
    let (start, end) = (ts("2024-01-01"), ts("2024-12-31"));
    assert!(generate_range(start, end, TimeBucket::Hour, DEFAULT_MAX_POINTS).is_empty());
    assert!(generate_range(start, end, TimeBucket::Minute, DEFAULT_MAX_POINTS).is_empty());
    assert_eq!(generate_range(start, end, TimeBucket::Hour, 10_000).len(), 8761);
}

#[test]
fn test_inverted_range_is_empty() {
    assert!(generate_range(ts("2024-02-01"), ts("2024-01-01"), TimeBucket::Day, 10).is_empty());
}

#[test]
fn test_sort_keys_order_chronologically() {
    let mut keys: Vec<String> = SAMPLES.iter().map(|raw| sort_key(ts(raw))).collect();
    keys.sort();
    assert_eq!(keys.first().map(String::as_str), Some("2023-12-31T23:14:00"));
    assert_eq!(keys.last().map(String::as_str), Some("2024-12-30T00:05:00"));
}

// =============================================================================
// SQL agrees with Rust
// =============================================================================

fn bucket_in_sqlite(raw: &str, bucket: TimeBucket) -> CellValue {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .connection()
        .execute_batch("CREATE TABLE alerts (alert_id INTEGER, alert_creation_time TEXT)")
        .unwrap();
    store
        .connection()
        .execute("INSERT INTO alerts VALUES (1, ?1)", [raw])
        .unwrap();

    let definition = WidgetDefinition::from_value(json!({
        "chart_type": "timechart",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}],
        "time_bucket": bucket.as_str()
    }))
    .unwrap();

    let engine = WidgetEngine::new(store);
    let result = engine
        .execute_widget(&definition, &Timeframe::unbounded(), &AccessScope::Unrestricted)
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    result.rows[0]["alerts_alert_creation_time"].clone()
}

#[test]
fn test_sqlite_bucket_matches_floor() {
    for bucket in TimeBucket::ALL {
        for raw in SAMPLES {
            assert_eq!(
                bucket_in_sqlite(raw, bucket),
                CellValue::Timestamp(bucket.floor(ts(raw))),
                "{bucket} of {raw}"
            );
        }
    }
}

#[test]
fn test_epoch_seconds_and_text_bucket_together() {
    let store = SqliteStore::open_in_memory().unwrap();
    // Untyped column: integers stay integers.
    store
        .connection()
        .execute_batch("CREATE TABLE alerts (alert_id INTEGER, alert_creation_time)")
        .unwrap();
    for (id, created) in [
        (1, Value::Integer(1_707_588_000)),
        (2, Value::Text("2024-02-10 09:00:00".into())),
        (3, Value::Text("2024-02-10T12:30:00".into())),
        (4, Value::Text("2024-02-11T00:00:00".into())),
    ] {
        store
            .connection()
            .execute("INSERT INTO alerts VALUES (?1, ?2)", rusqlite::params![id, created])
            .unwrap();
    }
    let engine = WidgetEngine::new(store);

    let definition = WidgetDefinition::from_value(json!({
        "chart_type": "timechart",
        "fields": [{"table": "alerts", "column": "alert_id", "aggregation": "count", "alias": "n"}],
        "time_bucket": "hour"
    }))
    .unwrap();
    let timeframe = Timeframe::between(ts("2024-02-10"), ts("2024-02-10T23:59:59"));
    let result = engine
        .execute_widget(&definition, &timeframe, &AccessScope::Unrestricted)
        .unwrap();

    let hours: Vec<CellValue> = result
        .rows
        .iter()
        .map(|row| row["alerts_alert_creation_time"].clone())
        .collect();
    assert_eq!(
        hours,
        vec![
            CellValue::Timestamp(ts("2024-02-10T09:00:00")),
            CellValue::Timestamp(ts("2024-02-10T12:00:00")),
            CellValue::Timestamp(ts("2024-02-10T18:00:00")),
        ]
    );
}
