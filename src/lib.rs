//! # Lookout
//!
//! A widget query compiler and execution engine for incident dashboards.
//!
//! ## Architecture
//!
//! A user-authored widget definition becomes a parameterised aggregate query
//! over a fixed incident schema, runs under the caller's row-level scope and
//! comes back shaped for its chart:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        WidgetDefinition (JSON) + Timeframe               │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compiler + schema registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │       QueryPlan (selects, groups, joins, params)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [access scope]
//! ┌─────────────────────────────────────────────────────────┐
//! │        QueryPlan + visibility predicate                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor: dialect SQL + binds]
//! ┌─────────────────────────────────────────────────────────┐
//! │                WidgetQueryResult                         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [formatter + time bucketing]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Payload (series | scalar | table)                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod access;
pub mod bucket;
pub mod compiler;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod executor;
pub mod format;
pub mod logging;
pub mod plan;
pub mod result;
pub mod schema;
pub mod sql;
pub mod widget;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::access::{AccessControl, AccessScope, StaticAccessControl};
    pub use crate::bucket::TimeBucket;
    pub use crate::dashboard::{DashboardRunner, DashboardWidget, WidgetOutcome};
    pub use crate::engine::WidgetEngine;
    pub use crate::error::{DefinitionError, QueryExecutionError};
    pub use crate::executor::{QueryStore, SqliteStore};
    pub use crate::format::Payload;
    pub use crate::result::{CellValue, WidgetQueryResult};
    pub use crate::sql::Dialect;
    pub use crate::widget::{ChartType, FieldSpec, FilterSpec, Timeframe, WidgetDefinition};
}

pub use engine::WidgetEngine;
pub use error::{DefinitionError, QueryExecutionError};
pub use format::Payload;
pub use widget::{Timeframe, WidgetDefinition};
