//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features relevant here:
//! - ANSI identifier quoting (`"`)
//! - `$N` parameters
//! - `DATE_TRUNC` (weeks start on Monday) and `DATE_BIN` (PG 14+) for
//!   sub-hour multiples
//! - `ILIKE` for case-insensitive matching

use super::helpers::{self, emit_call, string_arg};
use super::SqlDialect;
use crate::bucket::TimeBucket;
use crate::sql::token::{Token, TokenStream};

/// Origin for `DATE_BIN`; any midnight works for minute multiples.
const BIN_ORIGIN: &str = "2000-01-03 00:00:00";

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn case_insensitive_like(&self) -> &'static str {
        "ILIKE"
    }

    fn emit_time_bucket(&self, column: &TokenStream, bucket: TimeBucket) -> TokenStream {
        let unit = match bucket {
            TimeBucket::FiveMinutes => return date_bin("5 minutes", column),
            TimeBucket::FifteenMinutes => return date_bin("15 minutes", column),
            TimeBucket::Minute => "minute",
            TimeBucket::Hour => "hour",
            TimeBucket::Day => "day",
            TimeBucket::Week => "week",
            TimeBucket::Month => "month",
            TimeBucket::Year => "year",
        };
        emit_call("DATE_TRUNC", &[string_arg(unit), column.clone()])
    }
}

fn date_bin(stride: &str, column: &TokenStream) -> TokenStream {
    let mut interval = TokenStream::new();
    interval.push(Token::TypedString {
        type_name: "INTERVAL",
        value: stride.into(),
    });
    let mut origin = TokenStream::new();
    origin.push(Token::TypedString {
        type_name: "TIMESTAMP",
        value: BIN_ORIGIN.into(),
    });
    emit_call("DATE_BIN", &[interval, column.clone(), origin])
}
