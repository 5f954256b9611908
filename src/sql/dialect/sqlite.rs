//! SQLite SQL dialect.
//!
//! SQLite features relevant here:
//! - ANSI identifier quoting (`"`)
//! - `?NNN` numbered parameters
//! - Timestamps stored as ISO-8601 text (`T` or space separated) or as epoch
//!   seconds, normalised and truncated with `STRFTIME`
//! - LIKE is already case-insensitive for ASCII

use super::helpers::{self, emit_call, string_arg};
use super::SqlDialect;
use crate::bucket::TimeBucket;
use crate::sql::token::{Token, TokenStream};

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn emit_time_bucket(&self, column: &TokenStream, bucket: TimeBucket) -> TokenStream {
        let column = &self.emit_timestamp(column);
        match bucket {
            TimeBucket::Minute => strftime("%Y-%m-%dT%H:%M:00", column, &[]),
            TimeBucket::FiveMinutes => minute_multiple(column, 5),
            TimeBucket::FifteenMinutes => minute_multiple(column, 15),
            TimeBucket::Hour => strftime("%Y-%m-%dT%H:00:00", column, &[]),
            TimeBucket::Day => strftime("%Y-%m-%dT00:00:00", column, &[]),
            // Step back six days, then forward to the next Monday: the Monday
            // on or before the timestamp.
            TimeBucket::Week => strftime("%Y-%m-%dT00:00:00", column, &["-6 days", "weekday 1"]),
            TimeBucket::Month => strftime("%Y-%m-01T00:00:00", column, &[]),
            TimeBucket::Year => strftime("%Y-01-01T00:00:00", column, &[]),
        }
    }

    /// `CASE WHEN TYPEOF(c) = 'integer' THEN STRFTIME(f, c, 'unixepoch') ELSE STRFTIME(f, c) END`
    fn emit_timestamp(&self, column: &TokenStream) -> TokenStream {
        let mut is_epoch = emit_call("TYPEOF", std::slice::from_ref(column));
        is_epoch
            .space()
            .push(Token::Eq)
            .space()
            .push(Token::LitString("integer".into()));

        let mut ts = TokenStream::new();
        ts.push(Token::Case)
            .space()
            .push(Token::When)
            .space()
            .append(&is_epoch)
            .space()
            .push(Token::Then)
            .space()
            .append(&strftime(CANONICAL, column, &["unixepoch"]))
            .space()
            .push(Token::Else)
            .space()
            .append(&strftime(CANONICAL, column, &[]))
            .space()
            .push(Token::End);
        ts
    }
}

/// Same layout as `bucket::sort_key`.
const CANONICAL: &str = "%Y-%m-%dT%H:%M:%S";

fn strftime(format: &str, column: &TokenStream, modifiers: &[&str]) -> TokenStream {
    let mut args = vec![string_arg(format), column.clone()];
    args.extend(modifiers.iter().map(|m| string_arg(m)));
    emit_call("STRFTIME", &args)
}

/// `STRFTIME('%Y-%m-%dT%H:', c) || PRINTF('%02d', (STRFTIME('%M', c) / n) * n) || ':00'`
fn minute_multiple(column: &TokenStream, step: i64) -> TokenStream {
    let minute = strftime("%M", column, &[]);

    let mut floored = TokenStream::new();
    floored
        .lparen()
        .append(&minute)
        .space()
        .push(Token::Div)
        .space()
        .push(Token::LitInt(step))
        .rparen()
        .space()
        .push(Token::Mul)
        .space()
        .push(Token::LitInt(step));

    let mut ts = TokenStream::new();
    ts.append(&strftime("%Y-%m-%dT%H:", column, &[]))
        .space()
        .push(Token::Concat)
        .space()
        .append(&emit_call("PRINTF", &[string_arg("%02d"), floored]))
        .space()
        .push(Token::Concat)
        .space()
        .push(Token::LitString(":00".into()));
    ts
}
