//! Time bucketing - pure floor/advance/range helpers for fixed bucket sizes.
//!
//! Used twice per widget: by the compiler to build the bucket-truncation
//! group expression, and by the formatter to pre-generate a gap-free axis.
//! All timestamps are naive and interpreted as UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Default ceiling on the number of points `generate_range` will produce.
pub const DEFAULT_MAX_POINTS: usize = 2000;

/// ISO-8601 layout used for sort keys and bound parameters.
pub const SORT_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Fixed-size interval used to group timestamps into a chronological axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeBucket {
    #[serde(rename = "minute")]
    Minute,
    #[serde(rename = "5minute")]
    FiveMinutes,
    #[serde(rename = "15minute")]
    FifteenMinutes,
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "year")]
    Year,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 8] = [
        TimeBucket::Minute,
        TimeBucket::FiveMinutes,
        TimeBucket::FifteenMinutes,
        TimeBucket::Hour,
        TimeBucket::Day,
        TimeBucket::Week,
        TimeBucket::Month,
        TimeBucket::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBucket::Minute => "minute",
            TimeBucket::FiveMinutes => "5minute",
            TimeBucket::FifteenMinutes => "15minute",
            TimeBucket::Hour => "hour",
            TimeBucket::Day => "day",
            TimeBucket::Week => "week",
            TimeBucket::Month => "month",
            TimeBucket::Year => "year",
        }
    }

    /// Round `ts` down to the start of its bucket.
    pub fn floor(&self, ts: NaiveDateTime) -> NaiveDateTime {
        let date = ts.date();
        match self {
            TimeBucket::Minute => at(date, ts.hour(), ts.minute()),
            TimeBucket::FiveMinutes => at(date, ts.hour(), ts.minute() - ts.minute() % 5),
            TimeBucket::FifteenMinutes => at(date, ts.hour(), ts.minute() - ts.minute() % 15),
            TimeBucket::Hour => at(date, ts.hour(), 0),
            TimeBucket::Day => date.and_time(NaiveTime::MIN),
            TimeBucket::Week => {
                let back = date.weekday().num_days_from_monday() as i64;
                (date - Duration::days(back)).and_time(NaiveTime::MIN)
            }
            TimeBucket::Month => first_of_month(date.year(), date.month()),
            TimeBucket::Year => first_of_month(date.year(), 1),
        }
    }

    /// The next bucket boundary after `ts`.
    ///
    /// Month and year steps follow the calendar, not a fixed duration.
    pub fn advance(&self, ts: NaiveDateTime) -> NaiveDateTime {
        let start = self.floor(ts);
        match self {
            TimeBucket::Minute => start + Duration::minutes(1),
            TimeBucket::FiveMinutes => start + Duration::minutes(5),
            TimeBucket::FifteenMinutes => start + Duration::minutes(15),
            TimeBucket::Hour => start + Duration::hours(1),
            TimeBucket::Day => start + Duration::days(1),
            TimeBucket::Week => start + Duration::weeks(1),
            TimeBucket::Month => add_months(start, 1),
            TimeBucket::Year => add_months(start, 12),
        }
    }

    /// Human-facing label for a bucket start.
    pub fn display(&self, ts: NaiveDateTime) -> String {
        let format = match self {
            TimeBucket::Minute
            | TimeBucket::FiveMinutes
            | TimeBucket::FifteenMinutes
            | TimeBucket::Hour => "%Y-%m-%d %H:%M",
            TimeBucket::Day | TimeBucket::Week => "%Y-%m-%d",
            TimeBucket::Month => "%Y-%m",
            TimeBucket::Year => "%Y",
        };
        ts.format(format).to_string()
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeBucket::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| format!("unknown time bucket: {}", s))
    }
}

/// Every bucket start between `start` and `end` (both inclusive), ascending.
///
/// Returns an empty vector when the range would need more than `max_points`
/// entries; the walk stops as soon as the cap is crossed, so memory stays
/// bounded regardless of the span.
pub fn generate_range(
    start: NaiveDateTime,
    end: NaiveDateTime,
    bucket: TimeBucket,
    max_points: usize,
) -> Vec<NaiveDateTime> {
    let mut points = Vec::new();
    if start > end {
        return points;
    }

    let mut current = bucket.floor(start);
    while current <= end {
        if points.len() == max_points {
            tracing::warn!(
                bucket = %bucket,
                max_points,
                start = %start,
                end = %end,
                "time range exceeds point cap; axis not pre-generated"
            );
            return Vec::new();
        }
        points.push(current);
        current = bucket.advance(current);
    }
    points
}

/// ISO-8601 sort key (`YYYY-MM-DDTHH:MM:SS`).
pub fn sort_key(ts: NaiveDateTime) -> String {
    ts.format(SORT_KEY_FORMAT).to_string()
}

/// Parse the timestamp layouts the store and the wire format use.
///
/// Accepts RFC 3339 (offset normalised to UTC), `YYYY-MM-DDTHH:MM[:SS[.f]]`,
/// the same with a space separator, and bare dates (midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Parse an inclusive upper bound. A bare date covers the whole day.
pub fn parse_end_bound(raw: &str) -> Option<NaiveDateTime> {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => date.and_hms_opt(23, 59, 59),
        Err(_) => parse_timestamp(raw),
    }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    // hour < 24 and minute < 60 always hold for values taken from a timestamp.
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}

fn first_of_month(year: i32, month: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

fn add_months(ts: NaiveDateTime, months: u32) -> NaiveDateTime {
    ts.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDateTime::MAX)
}
