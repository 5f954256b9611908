//! Query executor - runs a `QueryPlan` against a relational store.
//!
//! The executor renders the plan for the store's dialect, binds parameters
//! and decodes rows by output alias. It does not interpret chart semantics,
//! and it never swallows store failures.

use std::path::Path;

use chrono::DateTime;
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::bucket::parse_timestamp;
use crate::error::{StoreError, StoreResult};
use crate::plan::{QueryPlan, SqlValue};
use crate::result::{CellValue, Row, WidgetQueryResult};
use crate::schema::ColumnKind;
use crate::sql::Dialect;

/// Output column as the store should decode it.
#[derive(Debug, Clone, Copy)]
pub struct OutputColumn<'a> {
    pub alias: &'a str,
    pub kind: Option<ColumnKind>,
}

/// A relational store that can run rendered queries.
///
/// Implementations hold their own connection; callers on different threads
/// use different stores.
pub trait QueryStore {
    fn dialect(&self) -> Dialect;

    fn fetch(
        &self,
        sql: &str,
        params: &[SqlValue],
        columns: &[OutputColumn<'_>],
    ) -> StoreResult<Vec<Row>>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl QueryStore for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn fetch(
        &self,
        sql: &str,
        params: &[SqlValue],
        columns: &[OutputColumn<'_>],
    ) -> StoreResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

        let mut decoded = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, column) in columns.iter().enumerate() {
                let value = decode(row.get_ref(idx)?, column)?;
                record.insert(column.alias.to_string(), value);
            }
            decoded.push(record);
        }
        Ok(decoded)
    }
}

fn decode(value: ValueRef<'_>, column: &OutputColumn<'_>) -> StoreResult<CellValue> {
    let is_timestamp = column.kind == Some(ColumnKind::Timestamp);
    Ok(match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(n) if is_timestamp => DateTime::from_timestamp(n, 0)
            .map(|dt| CellValue::Timestamp(dt.naive_utc()))
            .unwrap_or(CellValue::Int(n)),
        ValueRef::Integer(n) => CellValue::Int(n),
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|e| StoreError::Decode {
                column: column.alias.to_string(),
                message: e.to_string(),
            })?;
            match parse_timestamp(text).filter(|_| is_timestamp) {
                Some(ts) => CellValue::Timestamp(ts),
                None => CellValue::Text(text.to_string()),
            }
        }
        ValueRef::Blob(_) => {
            return Err(StoreError::Decode {
                column: column.alias.to_string(),
                message: "binary values are not supported".into(),
            })
        }
    })
}

/// Runs compiled plans against a store.
#[derive(Debug)]
pub struct QueryExecutor<'s, S: QueryStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: QueryStore + ?Sized> QueryExecutor<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn run(&self, plan: &QueryPlan) -> StoreResult<WidgetQueryResult> {
        let sql = plan.to_sql(self.store.dialect());
        let columns: Vec<OutputColumn<'_>> = plan
            .selects
            .iter()
            .map(|s| OutputColumn {
                alias: &s.alias,
                kind: s.kind,
            })
            .collect();

        let rows = self
            .store
            .fetch(&sql, plan.params.values(), &columns)
            .inspect_err(|error| {
                tracing::error!(error = %error, sql = %sql, "widget query failed");
            })?;

        Ok(WidgetQueryResult {
            chart_type: plan.chart_type,
            rows,
            group_labels: plan.group_labels(),
            value_labels: plan.value_labels(),
            select_labels: plan.select_labels(),
            time_label: plan.time_label.clone(),
            time_bucket: plan.time_bucket,
        })
    }
}
