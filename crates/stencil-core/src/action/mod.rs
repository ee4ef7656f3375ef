//! Actions: named units of work dispatched by the [`ActionRunner`]
//!
//! An [`ActionDefinition`] names an action and carries its options. Every
//! action is registered with an [`ActionSpec`] whose JSON Schema guards the
//! options before dispatch. Fields listed as deferred are handed to the action
//! untouched, so it can interpret them later (sub-action lists, loop
//! conditions); every other field is interpolated and resolved first.

pub mod builtin;
pub mod control;
pub mod registry;
pub mod runner;

use crate::context::ExecutionContext;
use crate::error::{ValidationError, WorkflowError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use control::{RepeatAction, TestAction, TryAction};
pub use registry::{ActionFactory, ActionRegistry, ActionRegistryBuilder};
pub use runner::ActionRunner;

/// Option map passed to an action
pub type Options = Map<String, Value>;

/// Declarative reference to an action: `{ "name": ..., ...options }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(flatten)]
    pub options: Options,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Options::new(),
        }
    }

    /// Add an option, builder style
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

/// A unit of work run against the shared context
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        runner: &ActionRunner,
    ) -> Result<(), WorkflowError>;
}

/// Registration record of an action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema (draft 7) for the option map, excluding `name`
    pub schema: Value,
    /// Options passed through without interpolation
    pub deferred: Vec<String>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            deferred: Vec::new(),
        }
    }

    pub fn deferred(mut self, fields: &[&str]) -> Self {
        self.deferred = fields.iter().map(|field| field.to_string()).collect();
        self
    }

    pub fn is_deferred(&self, field: &str) -> bool {
        self.deferred.iter().any(|deferred| deferred == field)
    }
}

/// Deserialize already validated options into a typed struct
pub fn parse_options<T: DeserializeOwned>(action: &str, options: Options) -> Result<T, WorkflowError> {
    serde_json::from_value(Value::Object(options)).map_err(|e| WorkflowError::InvalidOptions {
        action: action.to_string(),
        violations: ValidationError::single("", e.to_string()),
    })
}

/// Read a sub-action list given either as one definition or an array of them
pub fn action_list(action: &str, value: Option<&Value>) -> Result<Vec<ActionDefinition>, WorkflowError> {
    let invalid = |e: serde_json::Error| WorkflowError::InvalidOptions {
        action: action.to_string(),
        violations: ValidationError::single("", e.to_string()),
    };

    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| serde_json::from_value(item.clone()).map_err(invalid))
            .collect(),
        Some(single) => Ok(vec![serde_json::from_value(single.clone()).map_err(invalid)?]),
    }
}

/// Schema fragment accepting one action definition or a list of them
pub fn action_list_schema() -> Value {
    let definition = serde_json::json!({
        "type": "object",
        "properties": {"name": {"type": "string"}},
        "required": ["name"]
    });
    serde_json::json!({
        "oneOf": [definition.clone(), {"type": "array", "items": definition}]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_flattens_options() {
        let definition: ActionDefinition =
            serde_json::from_value(json!({"name": "print", "message": "hi"})).unwrap();
        assert_eq!(definition.name, "print");
        assert_eq!(definition.options.get("message"), Some(&json!("hi")));

        let back = serde_json::to_value(&definition).unwrap();
        assert_eq!(back, json!({"name": "print", "message": "hi"}));
    }

    #[test]
    fn test_action_list_accepts_single_or_many() {
        let single = action_list("test", Some(&json!({"name": "print"}))).unwrap();
        assert_eq!(single, vec![ActionDefinition::new("print")]);

        let many = action_list("test", Some(&json!([{"name": "a"}, {"name": "b"}]))).unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].name, "b");

        assert!(action_list("test", None).unwrap().is_empty());
        assert!(action_list("test", Some(&json!(42))).is_err());
    }

    #[test]
    fn test_spec_deferred_fields() {
        let spec = ActionSpec::new("try", "", json!({})).deferred(&["run", "else"]);
        assert!(spec.is_deferred("run"));
        assert!(!spec.is_deferred("help"));
    }
}
