//! SQL generation module.
//!
//! A type-safe SQL builder that renders widget queries for several dialects:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;


pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    always_false, avg, case_when, coalesce, col, count, func, lit_float, lit_int,
    lit_null, max, min, nullif, sum, table_col, BinaryOperator, Expr, ExprExt, Literal,
};
pub use query::{Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
