//! Error types for widget compilation and execution.
//!
//! Definition errors describe a bad widget configuration and are safe to
//! return to the caller verbatim: they only echo what the caller sent.
//! Store errors may carry schema or SQL details and are never shown as-is.

/// Result type for compiling a widget definition.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Result type for store access.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for access-scope lookups.
pub type AccessResult<T> = Result<T, AccessError>;

/// Result type for the `execute_widget` entry point.
pub type ExecutionResult<T> = Result<T, QueryExecutionError>;

/// Message shown to clients in place of any store failure.
pub const OPAQUE_MESSAGE: &str = "An unexpected error occurred";

/// A widget definition that cannot be compiled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Malformed widget definition: {0}")]
    Malformed(String),

    #[error("Widget definition has no chart_type")]
    MissingChartType,

    #[error("Widget definition has no fields")]
    NoFields,

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column: {table}.{column}")]
    UnknownColumn { table: String, column: String },

    #[error("Invalid column reference '{0}', expected 'table.column'")]
    InvalidReference(String),

    #[error("Column {0} is not a timestamp column")]
    NotTimestampColumn(String),

    #[error("Unsupported filter operator: {0}")]
    UnsupportedOperator(String),

    #[error("Unsupported aggregation: {0}")]
    UnsupportedAggregation(String),

    #[error("Invalid value for '{operator}' filter on {column}: {reason}")]
    InvalidFilterValue {
        column: String,
        operator: String,
        reason: String,
    },

    #[error("Field '{0}' has a filter but no aggregation")]
    FilterWithoutAggregation(String),

    #[error("Field '{0}' uses ratio aggregation without a filter")]
    RatioRequiresFilter(String),

    #[error("Duplicate alias: {0}")]
    DuplicateAlias(String),

    #[error("Invalid alias '{0}': use letters, digits and underscores")]
    InvalidAlias(String),

    #[error("Invalid limit {value}: must be between 1 and {max}")]
    InvalidLimit { value: i64, max: u64 },

    #[error("Invalid timeframe: start {start} is after end {end}")]
    InvalidTimeframe { start: String, end: String },

    #[error("Widget needs at least one aggregated field or grouping column")]
    NoAggregationOrGrouping,
}

/// Failure inside the relational store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },
}

/// Failure to look up a principal's access scope.
///
/// Never surfaced to clients; callers narrow the principal to deny-all.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccessError {
    #[error("Unknown principal: {0}")]
    UnknownPrincipal(String),

    #[error("Access lookup failed: {0}")]
    Lookup(String),
}

/// Any failure of `execute_widget`.
#[derive(Debug, thiserror::Error)]
pub enum QueryExecutionError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("Query execution failed: {0}")]
    Store(#[from] StoreError),
}

impl QueryExecutionError {
    /// Text safe to put in a widget's error slot.
    pub fn client_message(&self) -> String {
        match self {
            QueryExecutionError::Definition(err) => err.to_string(),
            QueryExecutionError::Store(_) => OPAQUE_MESSAGE.to_string(),
        }
    }

    pub fn is_definition_error(&self) -> bool {
        matches!(self, QueryExecutionError::Definition(_))
    }
}
