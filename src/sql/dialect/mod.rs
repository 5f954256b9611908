//! SQL dialect definitions and formatting rules.
//!
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Bind placeholders: `?N` (SQLite) vs `$N` (PostgreSQL)
//! - Time-bucket truncation: `STRFTIME` vs `DATE_TRUNC` / `DATE_BIN`
//! - Timestamp normalisation: text and epoch seconds (SQLite) vs native (PostgreSQL)
//! - Case-insensitive matching: `LIKE` vs `ILIKE`
//!
//! # Usage
//!
//! ```ignore
//! use lookout::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let placeholder = dialect.placeholder(1);  // $1
//! ```
//!
//! SQLite is the executed dialect (see [`crate::executor::SqliteStore`]);
//! PostgreSQL is rendered for inspection and for external stores.

pub mod helpers;
mod postgres;
mod sqlite;

pub use postgres::Postgres;
pub use sqlite::Sqlite;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;
use crate::bucket::TimeBucket;

/// SQL dialect trait - defines how SQL constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Positional bind placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    // =========================================================================
    // Pagination
    // =========================================================================

    fn emit_limit(&self, limit: u64) -> TokenStream {
        helpers::emit_limit_standard(limit)
    }

    // =========================================================================
    // Matching / Date-Time
    // =========================================================================

    /// Keyword for case-insensitive pattern matching.
    fn case_insensitive_like(&self) -> &'static str {
        "LIKE"
    }

    /// Truncate the timestamp expression `column` down to its `bucket` boundary.
    ///
    /// The result must sort chronologically and compare equal for all
    /// timestamps within the same bucket.
    fn emit_time_bucket(&self, column: &TokenStream, bucket: TimeBucket) -> TokenStream;

    /// Normalise a stored timestamp to a form that compares against a bound
    /// `SqlValue::Timestamp` parameter.
    fn emit_timestamp(&self, column: &TokenStream) -> TokenStream {
        column.clone()
    }
}

// =============================================================================
// Dialect Enum (for convenience)
// =============================================================================

/// Enum wrapper for all supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::Postgres => &Postgres,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn placeholder(&self, index: usize) -> String {
        self.dialect().placeholder(index)
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        self.dialect().emit_limit(limit)
    }

    fn case_insensitive_like(&self) -> &'static str {
        self.dialect().case_insensitive_like()
    }

    fn emit_time_bucket(&self, column: &TokenStream, bucket: TimeBucket) -> TokenStream {
        self.dialect().emit_time_bucket(column, bucket)
    }

    fn emit_timestamp(&self, column: &TokenStream) -> TokenStream {
        self.dialect().emit_timestamp(column)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => Err(format!("unsupported dialect: {}", other)),
        }
    }
}
