//! Widget engine - the two public entry points of the crate.
//!
//! `execute_widget` compiles a definition, narrows it to the caller's access
//! scope and runs it; `format_widget_payload` shapes the result for the
//! requested chart. Each call is independent and holds no state between
//! calls beyond the store it was given.

use crate::access::AccessScope;
use crate::compiler::WidgetCompiler;
use crate::config::LimitSettings;
use crate::error::{DefinitionResult, ExecutionResult};
use crate::executor::{QueryExecutor, QueryStore};
use crate::format::{self, Payload};
use crate::plan::QueryPlan;
use crate::result::WidgetQueryResult;
use crate::schema::SchemaRegistry;
use crate::widget::{Timeframe, WidgetDefinition};

/// Compiles, scopes, runs and formats widgets against one store.
#[derive(Debug)]
pub struct WidgetEngine<S: QueryStore> {
    registry: &'static SchemaRegistry,
    store: S,
    limits: LimitSettings,
}

impl<S: QueryStore> WidgetEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            registry: SchemaRegistry::incidents(),
            store,
            limits: LimitSettings::default(),
        }
    }

    pub fn with_limits(mut self, limits: LimitSettings) -> Self {
        self.limits = limits;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &'static SchemaRegistry {
        self.registry
    }

    /// Compile without scoping or running.
    pub fn compile(
        &self,
        definition: &WidgetDefinition,
        timeframe: &Timeframe,
    ) -> DefinitionResult<QueryPlan> {
        WidgetCompiler::new(self.registry)
            .with_max_limit(self.limits.max_limit)
            .compile(definition, timeframe)
    }

    /// Run a widget under `scope`.
    ///
    /// Definition errors are returned before the store is touched.
    pub fn execute_widget(
        &self,
        definition: &WidgetDefinition,
        timeframe: &Timeframe,
        scope: &AccessScope,
    ) -> ExecutionResult<WidgetQueryResult> {
        let plan = self.compile(definition, timeframe)?;
        let plan = scope.apply(plan, self.registry);
        let result = QueryExecutor::new(&self.store).run(&plan)?;
        Ok(result)
    }

    pub fn format_widget_payload(
        &self,
        result: &WidgetQueryResult,
        definition: &WidgetDefinition,
        timeframe: &Timeframe,
    ) -> Payload {
        format::format_with_cap(result, definition, timeframe, self.limits.max_points)
    }
}
