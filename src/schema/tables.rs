//! Logical tables of the incident schema.

use super::ColumnKind::{Integer, Text, Timestamp};
use super::{ColumnDef, JoinStep, LogicalTable};

pub const BASE_TABLE: &str = "alerts";

/// Many-to-many link between alerts and cases. Joined through, never selected.
pub const CASE_LINK_TABLE: &str = "alert_case_association";

/// Single-hop LEFT JOIN from the base table.
const fn from_alerts(table: &'static str, alerts_column: &'static str, key: &'static str) -> JoinStep {
    JoinStep {
        table,
        left_table: BASE_TABLE,
        left_column: alerts_column,
        right_column: key,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlertsTable;

impl LogicalTable for AlertsTable {
    fn name(&self) -> &'static str {
        BASE_TABLE
    }

    fn columns(&self) -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("alert_id", Integer),
            ColumnDef::new("alert_uuid", Text),
            ColumnDef::new("alert_title", Text),
            ColumnDef::new("alert_description", Text),
            ColumnDef::new("alert_source", Text),
            ColumnDef::new("alert_source_ref", Text),
            ColumnDef::new("alert_severity_id", Integer),
            ColumnDef::new("alert_status_id", Integer),
            ColumnDef::new("alert_resolution_status_id", Integer),
            ColumnDef::new("alert_classification_id", Integer),
            ColumnDef::new("alert_customer_id", Integer),
            ColumnDef::new("alert_owner_id", Integer),
            ColumnDef::new("alert_creation_time", Timestamp),
            ColumnDef::new("alert_source_event_time", Timestamp),
            ColumnDef::new("alert_tags", Text),
        ];
        COLUMNS
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeveritiesTable;

impl LogicalTable for SeveritiesTable {
    fn name(&self) -> &'static str {
        "severities"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("severity_id", Integer),
            ColumnDef::new("severity_name", Text),
            ColumnDef::new("severity_description", Text),
        ];
        COLUMNS
    }

    fn join_path(&self) -> &'static [JoinStep] {
        const PATH: &[JoinStep] = &[from_alerts("severities", "alert_severity_id", "severity_id")];
        PATH
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlertStatusTable;

impl LogicalTable for AlertStatusTable {
    fn name(&self) -> &'static str {
        "alert_status"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("status_id", Integer),
            ColumnDef::new("status_name", Text),
            ColumnDef::new("status_description", Text),
        ];
        COLUMNS
    }

    fn join_path(&self) -> &'static [JoinStep] {
        const PATH: &[JoinStep] = &[from_alerts("alert_status", "alert_status_id", "status_id")];
        PATH
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlertResolutionStatusTable;

impl LogicalTable for AlertResolutionStatusTable {
    fn name(&self) -> &'static str {
        "alert_resolution_status"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("resolution_status_id", Integer),
            ColumnDef::new("resolution_status_name", Text),
        ];
        COLUMNS
    }

    fn join_path(&self) -> &'static [JoinStep] {
        const PATH: &[JoinStep] = &[from_alerts(
            "alert_resolution_status",
            "alert_resolution_status_id",
            "resolution_status_id",
        )];
        PATH
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CaseClassificationTable;

impl LogicalTable for CaseClassificationTable {
    fn name(&self) -> &'static str {
        "case_classification"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("id", Integer),
            ColumnDef::new("name", Text),
            ColumnDef::new("name_expanded", Text),
        ];
        COLUMNS
    }

    fn join_path(&self) -> &'static [JoinStep] {
        const PATH: &[JoinStep] = &[from_alerts("case_classification", "alert_classification_id", "id")];
        PATH
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClientTable;

impl LogicalTable for ClientTable {
    fn name(&self) -> &'static str {
        "client"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("client_id", Integer),
            ColumnDef::new("name", Text),
            ColumnDef::new("description", Text),
        ];
        COLUMNS
    }

    fn join_path(&self) -> &'static [JoinStep] {
        const PATH: &[JoinStep] = &[from_alerts("client", "alert_customer_id", "client_id")];
        PATH
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UsersTable;

impl LogicalTable for UsersTable {
    fn name(&self) -> &'static str {
        "users"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        // No credential or session columns.
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("id", Integer),
            ColumnDef::new("name", Text),
            ColumnDef::new("user", Text),
        ];
        COLUMNS
    }

    fn join_path(&self) -> &'static [JoinStep] {
        const PATH: &[JoinStep] = &[from_alerts("users", "alert_owner_id", "id")];
        PATH
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CasesTable;

impl LogicalTable for CasesTable {
    fn name(&self) -> &'static str {
        "cases"
    }

    fn columns(&self) -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("case_id", Integer),
            ColumnDef::new("name", Text),
            ColumnDef::new("description", Text),
            ColumnDef::new("open_date", Timestamp),
            ColumnDef::new("close_date", Timestamp),
            ColumnDef::new("status_id", Integer),
            ColumnDef::new("severity_id", Integer),
            ColumnDef::new("owner_id", Integer),
            ColumnDef::new("client_id", Integer),
            ColumnDef::new("classification_id", Integer),
        ];
        COLUMNS
    }

    fn join_path(&self) -> &'static [JoinStep] {
        const PATH: &[JoinStep] = &[
            from_alerts(CASE_LINK_TABLE, "alert_id", "alert_id"),
            JoinStep {
                table: "cases",
                left_table: CASE_LINK_TABLE,
                left_column: "case_id",
                right_column: "case_id",
            },
        ];
        PATH
    }
}
