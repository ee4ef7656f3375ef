//! JSON Schema validation for action options and documents

use crate::error::{ValidationError, Violation};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A compiled JSON Schema (draft 7) together with its source
#[derive(Clone)]
pub struct Schema {
    source: Value,
    compiled: Arc<JSONSchema>,
}

impl Schema {
    /// Compile a schema document
    pub fn compile(source: Value) -> Result<Self, String> {
        let compiled = JSONSchema::compile(&source).map_err(|e| e.to_string())?;
        Ok(Self {
            source,
            compiled: Arc::new(compiled),
        })
    }

    /// The schema document this was compiled from
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Check an instance, collecting every violation
    pub fn validate(&self, instance: &Value) -> Result<(), ValidationError> {
        self.compiled.validate(instance).map_err(|errors| {
            ValidationError::new(
                errors
                    .map(|error| Violation {
                        path: error.instance_path.to_string(),
                        message: error.to_string(),
                    })
                    .collect(),
            )
        })
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("source", &self.source).finish()
    }
}
