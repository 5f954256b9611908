//! Schema registry - the allow-list of columns a widget may reference.
//!
//! Every identifier that reaches generated SQL comes from a `&'static str`
//! owned by this module. Widget JSON only ever selects among them by name;
//! it can never contribute identifier text of its own.

mod tables;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DefinitionError, DefinitionResult};
use crate::sql::{table_col, Expr, ExprExt};

pub use tables::{
    AlertResolutionStatusTable, AlertStatusTable, AlertsTable, CaseClassificationTable,
    CasesTable, ClientTable, SeveritiesTable, UsersTable, BASE_TABLE, CASE_LINK_TABLE,
};

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]\w*)\.([A-Za-z_]\w*)$").unwrap());

static INCIDENTS: LazyLock<SchemaRegistry> = LazyLock::new(SchemaRegistry::build_incidents);

/// Storage type of a registered column; drives filter value coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Integer,
    Text,
    Timestamp,
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        *self == ColumnKind::Integer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// One LEFT JOIN hop: `LEFT JOIN table ON left_table.left_column = table.right_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinStep {
    pub table: &'static str,
    pub left_table: &'static str,
    pub left_column: &'static str,
    pub right_column: &'static str,
}

impl JoinStep {
    pub fn on(&self) -> Expr {
        use crate::sql::ExprExt;
        table_col(self.left_table, self.left_column).eq(table_col(self.table, self.right_column))
    }
}

/// A logical table widgets can reference.
///
/// `join_path` is the ordered list of hops needed to reach the table from
/// the base table; it is empty for the base table itself.
pub trait LogicalTable: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn columns(&self) -> &'static [ColumnDef];

    fn join_path(&self) -> &'static [JoinStep] {
        &[]
    }

    fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns().iter().find(|c| c.name == name)
    }
}

/// A resolved, registry-owned column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

impl ColumnRef {
    pub fn expr(&self) -> Expr {
        table_col(self.table, self.column)
    }

    /// Column as it should appear on the left of a comparison with a bound
    /// value. Timestamps are normalised so every stored layout compares.
    pub fn comparable(&self) -> Expr {
        match self.kind {
            ColumnKind::Timestamp => self.expr().as_timestamp(),
            _ => self.expr(),
        }
    }

    /// Default alias: `table_column`.
    pub fn default_alias(&self) -> String {
        format!("{}_{}", self.table, self.column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Columns the access filter binds a principal's scope to.
#[derive(Debug, Clone, Copy)]
pub struct ScopeBinding {
    /// Base-table column holding the owning customer id.
    pub customer: ColumnRef,
    /// Base-table primary key.
    pub row_id: ColumnRef,
    /// Link table mapping base rows to cases.
    pub link_table: &'static str,
    pub link_row_column: &'static str,
    pub link_case_column: &'static str,
}

/// Immutable registry of logical tables, built once.
#[derive(Debug)]
pub struct SchemaRegistry {
    tables: BTreeMap<&'static str, Box<dyn LogicalTable>>,
    base: &'static str,
    default_time_column: ColumnRef,
    scope: ScopeBinding,
}

impl SchemaRegistry {
    /// The incident/alert/case schema.
    pub fn incidents() -> &'static SchemaRegistry {
        &INCIDENTS
    }

    fn build_incidents() -> Self {
        let tables: Vec<Box<dyn LogicalTable>> = vec![
            Box::new(AlertsTable),
            Box::new(SeveritiesTable),
            Box::new(AlertStatusTable),
            Box::new(AlertResolutionStatusTable),
            Box::new(CaseClassificationTable),
            Box::new(ClientTable),
            Box::new(UsersTable),
            Box::new(CasesTable),
        ];
        let tables: BTreeMap<_, _> = tables.into_iter().map(|t| (t.name(), t)).collect();

        let base_column = |column: &'static str, kind| ColumnRef {
            table: BASE_TABLE,
            column,
            kind,
        };

        Self {
            tables,
            base: BASE_TABLE,
            default_time_column: base_column("alert_creation_time", ColumnKind::Timestamp),
            scope: ScopeBinding {
                customer: base_column("alert_customer_id", ColumnKind::Integer),
                row_id: base_column("alert_id", ColumnKind::Integer),
                link_table: CASE_LINK_TABLE,
                link_row_column: "alert_id",
                link_case_column: "case_id",
            },
        }
    }

    pub fn base_table(&self) -> &'static str {
        self.base
    }

    pub fn default_time_column(&self) -> ColumnRef {
        self.default_time_column
    }

    pub fn scope_binding(&self) -> &ScopeBinding {
        &self.scope
    }

    pub fn table_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.keys().copied()
    }

    pub fn table(&self, name: &str) -> DefinitionResult<&dyn LogicalTable> {
        self.tables
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| DefinitionError::UnknownTable(name.to_string()))
    }

    /// Resolve a `(table, column)` pair against the allow-list.
    pub fn resolve(&self, table: &str, column: &str) -> DefinitionResult<ColumnRef> {
        let logical = self.table(table)?;
        let def = logical
            .column(column)
            .ok_or_else(|| DefinitionError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })?;
        Ok(ColumnRef {
            table: logical.name(),
            column: def.name,
            kind: def.kind,
        })
    }

    /// Resolve a `"table.column"` string.
    pub fn resolve_reference(&self, reference: &str) -> DefinitionResult<ColumnRef> {
        let caps = REFERENCE
            .captures(reference.trim())
            .ok_or_else(|| DefinitionError::InvalidReference(reference.to_string()))?;
        self.resolve(&caps[1], &caps[2])
    }

    /// Hops needed to bring `table` into a query rooted at the base table.
    pub fn join_path(&self, table: &str) -> DefinitionResult<&'static [JoinStep]> {
        Ok(self.table(table)?.join_path())
    }
}
