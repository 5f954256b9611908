//! Row-level access scope.
//!
//! The visibility predicate is added to the WHERE clause, so it filters base
//! rows before any grouping or aggregation happens. A principal without any
//! visible customers or cases gets an always-false predicate: a missing scope
//! narrows to nothing, it never widens to everything.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AccessError, AccessResult};
use crate::plan::{Params, QueryPlan, SqlValue};
use crate::schema::SchemaRegistry;
use crate::sql::{always_false, table_col, Expr, ExprExt, Query, TableRef};

/// What a principal may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    /// No row filter.
    Unrestricted,
    /// Rows owned by one of `customers`, or linked to one of `cases`.
    Scoped {
        customers: BTreeSet<i64>,
        cases: BTreeSet<i64>,
    },
}

impl AccessScope {
    pub fn scoped(
        customers: impl IntoIterator<Item = i64>,
        cases: impl IntoIterator<Item = i64>,
    ) -> Self {
        AccessScope::Scoped {
            customers: customers.into_iter().collect(),
            cases: cases.into_iter().collect(),
        }
    }

    /// The fail-closed scope.
    pub fn deny_all() -> Self {
        AccessScope::Scoped {
            customers: BTreeSet::new(),
            cases: BTreeSet::new(),
        }
    }

    pub fn is_deny_all(&self) -> bool {
        match self {
            AccessScope::Unrestricted => false,
            AccessScope::Scoped { customers, cases } => customers.is_empty() && cases.is_empty(),
        }
    }

    /// Visibility predicate, or `None` for unrestricted principals.
    pub fn predicate(&self, registry: &SchemaRegistry, params: &mut Params) -> Option<Expr> {
        let AccessScope::Scoped { customers, cases } = self else {
            return None;
        };
        let binding = registry.scope_binding();

        let by_customer = (!customers.is_empty()).then(|| {
            let ids = bind_ids(params, customers);
            binding.customer.expr().in_list(ids)
        });

        let by_case = (!cases.is_empty()).then(|| {
            let ids = bind_ids(params, cases);
            let linked_rows = Query::new()
                .select(vec![table_col(binding.link_table, binding.link_row_column)])
                .from(TableRef::new(binding.link_table))
                .filter(table_col(binding.link_table, binding.link_case_column).in_list(ids));
            binding.row_id.expr().in_subquery(linked_rows)
        });

        Some(match (by_customer, by_case) {
            (Some(customer), Some(case)) => customer.or(case),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => always_false(),
        })
    }

    /// Add this scope's predicate to a compiled plan.
    pub fn apply(&self, plan: QueryPlan, registry: &SchemaRegistry) -> QueryPlan {
        match self {
            AccessScope::Unrestricted => plan,
            AccessScope::Scoped { .. } => plan.with_predicate(|params| {
                self.predicate(registry, params).unwrap_or_else(always_false)
            }),
        }
    }
}

fn bind_ids(params: &mut Params, ids: &BTreeSet<i64>) -> Vec<Expr> {
    ids.iter().map(|id| params.bind(SqlValue::Int(*id))).collect()
}

/// Source of principals' scopes.
pub trait AccessControl {
    fn scope_for(&self, principal: &str) -> AccessResult<AccessScope>;
}

/// Resolve a principal's scope, narrowing to deny-all when the lookup fails.
pub fn resolve_scope<A: AccessControl + ?Sized>(access: &A, principal: &str) -> AccessScope {
    match access.scope_for(principal) {
        Ok(scope) => scope,
        Err(error) => {
            tracing::warn!(principal, error = %error, "access lookup failed; denying all rows");
            AccessScope::deny_all()
        }
    }
}

/// Fixed principal table, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessControl {
    principals: BTreeMap<String, AccessScope>,
}

impl StaticAccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, principal: &str, scope: AccessScope) -> Self {
        self.principals.insert(principal.to_string(), scope);
        self
    }
}

impl AccessControl for StaticAccessControl {
    fn scope_for(&self, principal: &str) -> AccessResult<AccessScope> {
        self.principals
            .get(principal)
            .cloned()
            .ok_or_else(|| AccessError::UnknownPrincipal(principal.to_string()))
    }
}
