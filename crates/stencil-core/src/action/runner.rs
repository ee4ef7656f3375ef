//! Sequential action interpreter

use super::registry::ActionRegistry;
use super::{ActionDefinition, ActionSpec, Options};
use crate::context::ExecutionContext;
use crate::deferred::{resolve_with_limit, Deferred};
use crate::error::WorkflowError;
use crate::expression::interpolate;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Runs action lists against a context, one action at a time
#[derive(Clone)]
pub struct ActionRunner {
    registry: Arc<ActionRegistry>,
}

impl ActionRunner {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Run `actions` in declaration order.
    ///
    /// Each action finishes before the next one starts. The first error stops
    /// the run; later actions are never dispatched.
    pub async fn run(
        &self,
        actions: &[ActionDefinition],
        context: &mut ExecutionContext,
    ) -> Result<(), WorkflowError> {
        for (index, definition) in actions.iter().enumerate() {
            let entry = self
                .registry
                .get(&definition.name)
                .ok_or_else(|| WorkflowError::UnsupportedAction(definition.name.clone()))?;
            let spec = entry.spec();

            let options = self.prepare(definition, spec, context).await?;
            entry
                .schema()
                .validate(&Value::Object(options.clone()))
                .map_err(|violations| WorkflowError::InvalidOptions {
                    action: definition.name.clone(),
                    violations,
                })?;

            debug!(action = %definition.name, index, "running action");
            entry.action().execute(options, context, self).await?;
        }
        Ok(())
    }

    /// Interpolate and resolve every option not declared as deferred
    async fn prepare(
        &self,
        definition: &ActionDefinition,
        spec: &ActionSpec,
        context: &ExecutionContext,
    ) -> Result<Options, WorkflowError> {
        let mut fields = Vec::with_capacity(definition.options.len());
        for (key, value) in &definition.options {
            let field = if spec.is_deferred(key) {
                Deferred::Value(value.clone())
            } else {
                interpolate(value, context.variables())?
            };
            fields.push((key.clone(), field));
        }

        match resolve_with_limit(Deferred::Object(fields), context.max_depth()).await? {
            Value::Object(options) => Ok(options),
            _ => Ok(Options::new()),
        }
    }
}
