//! Multi-widget fetch with per-widget failure isolation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::access::{resolve_scope, AccessControl};
use crate::engine::WidgetEngine;
use crate::executor::QueryStore;
use crate::format::Payload;
use crate::widget::{Timeframe, WidgetDefinition};

/// A widget as stored on a dashboard.
#[derive(Debug, Clone)]
pub struct DashboardWidget {
    pub id: String,
    pub definition: WidgetDefinition,
}

impl DashboardWidget {
    pub fn new(id: impl Into<String>, definition: WidgetDefinition) -> Self {
        Self {
            id: id.into(),
            definition,
        }
    }
}

/// Outcome of one widget in a dashboard fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WidgetOutcome {
    Ok { payload: Payload },
    Error { message: String },
}

impl WidgetOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, WidgetOutcome::Ok { .. })
    }
}

pub struct DashboardRunner<'a, S: QueryStore, A: AccessControl + ?Sized> {
    engine: &'a WidgetEngine<S>,
    access: &'a A,
}

impl<'a, S: QueryStore, A: AccessControl + ?Sized> DashboardRunner<'a, S, A> {
    pub fn new(engine: &'a WidgetEngine<S>, access: &'a A) -> Self {
        Self { engine, access }
    }

    /// Run every widget for `principal`, keyed by widget id.
    ///
    /// The scope is resolved once per fetch. A failing widget only fills its
    /// own slot; store failures reach the caller as the opaque message.
    pub fn fetch(
        &self,
        principal: &str,
        widgets: &[DashboardWidget],
        timeframe: &Timeframe,
    ) -> BTreeMap<String, WidgetOutcome> {
        let scope = resolve_scope(self.access, principal);

        widgets
            .iter()
            .map(|widget| {
                let span = tracing::info_span!("widget", id = %widget.id);
                let _guard = span.enter();

                let outcome =
                    match self
                        .engine
                        .execute_widget(&widget.definition, timeframe, &scope)
                    {
                        Ok(result) => WidgetOutcome::Ok {
                            payload: self.engine.format_widget_payload(
                                &result,
                                &widget.definition,
                                timeframe,
                            ),
                        },
                        Err(error) => {
                            if error.is_definition_error() {
                                tracing::debug!(error = %error, "widget definition rejected");
                            } else {
                                tracing::error!(error = %error, "widget failed");
                            }
                            WidgetOutcome::Error {
                                message: error.client_message(),
                            }
                        }
                    };
                (widget.id.clone(), outcome)
            })
            .collect()
    }
}
