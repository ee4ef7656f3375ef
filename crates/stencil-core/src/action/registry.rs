//! Closed, inspectable map of registered actions

use super::{Action, ActionSpec};
use crate::error::{ErrorReason, Help, WorkflowError};
use crate::schema::Schema;
use indexmap::IndexMap;
use std::sync::OnceLock;

/// Creates an action instance on first use
pub type ActionFactory = Box<dyn Fn() -> Box<dyn Action> + Send + Sync>;

/// Accumulates action registrations before the registry is sealed
#[derive(Default)]
pub struct ActionRegistryBuilder {
    entries: IndexMap<String, (ActionSpec, ActionFactory)>,
}

impl ActionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under `spec.name`; names must be unique
    pub fn register<F>(&mut self, spec: ActionSpec, factory: F) -> Result<&mut Self, WorkflowError>
    where
        F: Fn() -> Box<dyn Action> + Send + Sync + 'static,
    {
        if self.entries.contains_key(&spec.name) {
            return Err(WorkflowError::with_help(
                format!("Action `{}` is already registered", spec.name),
                Help::with_reason(ErrorReason::InvalidConfiguration),
            ));
        }
        self.entries
            .insert(spec.name.clone(), (spec, Box::new(factory)));
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Compile every option schema and seal the registry
    pub fn build(self) -> Result<ActionRegistry, WorkflowError> {
        let mut entries = IndexMap::with_capacity(self.entries.len());

        for (name, (spec, factory)) in self.entries {
            let schema = Schema::compile(spec.schema.clone()).map_err(|e| {
                WorkflowError::with_help(
                    format!("Invalid option schema for action `{}`: {}", name, e),
                    Help::with_reason(ErrorReason::InvalidConfiguration),
                )
            })?;
            entries.insert(
                name,
                RegisteredAction {
                    spec,
                    schema,
                    factory,
                    instance: OnceLock::new(),
                },
            );
        }

        Ok(ActionRegistry { entries })
    }
}

/// A registered action with its compiled schema and lazily created instance
pub struct RegisteredAction {
    spec: ActionSpec,
    schema: Schema,
    factory: ActionFactory,
    instance: OnceLock<Box<dyn Action>>,
}

impl RegisteredAction {
    pub fn spec(&self) -> &ActionSpec {
        &self.spec
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The action instance, constructed on first call
    pub fn action(&self) -> &dyn Action {
        self.instance.get_or_init(|| (self.factory)()).as_ref()
    }
}

/// Sealed action registry, in registration order
pub struct ActionRegistry {
    entries: IndexMap<String, RegisteredAction>,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredAction> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn spec(&self, name: &str) -> Option<&ActionSpec> {
        self.entries.get(name).map(RegisteredAction::spec)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ActionSpec> {
        self.entries.values().map(RegisteredAction::spec)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionRunner, Options};
    use crate::context::ExecutionContext;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Noop;

    #[async_trait]
    impl Action for Noop {
        async fn execute(
            &self,
            _options: Options,
            _context: &mut ExecutionContext,
            _runner: &ActionRunner,
        ) -> Result<(), WorkflowError> {
            Ok(())
        }
    }

    fn spec(name: &str) -> ActionSpec {
        ActionSpec::new(name, "does nothing", json!({"type": "object"}))
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut builder = ActionRegistry::builder();
        builder.register(spec("noop"), || Box::new(Noop)).unwrap();
        let error = builder
            .register(spec("noop"), || Box::new(Noop))
            .err()
            .unwrap();
        assert_eq!(error.reason(), Some(ErrorReason::InvalidConfiguration));
    }

    #[test]
    fn test_invalid_schema_fails_build() {
        let mut builder = ActionRegistry::builder();
        builder
            .register(
                ActionSpec::new("broken", "", json!({"type": 12})),
                || Box::new(Noop),
            )
            .unwrap();
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_instances_are_created_once() {
        let created = Arc::new(AtomicU32::new(0));
        let counter = created.clone();

        let mut builder = ActionRegistry::builder();
        builder
            .register(spec("noop"), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(Noop)
            })
            .unwrap();
        let registry = builder.build().unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 0);

        let entry = registry.get("noop").unwrap();
        entry.action();
        entry.action();
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registry_is_inspectable_in_order() {
        let mut builder = ActionRegistry::builder();
        builder
            .register(spec("b"), || Box::new(Noop))
            .unwrap()
            .register(spec("a"), || Box::new(Noop))
            .unwrap();
        let registry = builder.build().unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(registry.spec("a").unwrap().description, "does nothing");
        assert!(registry.spec("c").is_none());
    }
}
