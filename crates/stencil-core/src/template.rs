//! Template documents and option resolution
//!
//! A template declares typed options and an ordered list of actions:
//!
//! ```json
//! {
//!   "title": "Next.js app",
//!   "version": "0.3.0",
//!   "options": {
//!     "name": {"type": "string", "description": "Project name", "required": true},
//!     "typescript": {"type": "boolean", "description": "Use TypeScript", "default": true}
//!   },
//!   "actions": [{"name": "print", "message": "Creating ${name}"}]
//! }
//! ```

use crate::action::ActionDefinition;
use crate::context::ExecutionContext;
use crate::error::{
    BoxError, ErrorReason, Help, ProviderError, ValidationError, Violation, WorkflowError,
};
use crate::provider::ProviderResult;
use crate::transport::Content;
use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use url::Url;

/// File names looked up when a template is a directory
pub const TEMPLATE_FILES: [&str; 3] = ["template.json", "template.yaml", "template.yml"];

/// A declarative scaffolding workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Minimum runtime version the template was written for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, OptionDefinition>,

    pub actions: Vec<ActionDefinition>,
}

/// Type-specific constraints of an option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OptionKind {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        choices: Option<Vec<String>>,
    },
    Boolean,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Array,
}

/// A declared template option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDefinition {
    #[serde(flatten)]
    pub kind: OptionKind,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,

    /// Default value; may reference options declared earlier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl OptionDefinition {
    /// Convert loosely typed input (such as command-line strings) to the
    /// option's type
    pub fn coerce(&self, value: Value) -> Value {
        match (&self.kind, value) {
            (OptionKind::Boolean, Value::String(text)) => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Value::Bool(true),
                "false" | "no" | "n" | "0" => Value::Bool(false),
                _ => Value::String(text),
            },
            (OptionKind::Number { .. }, Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|n| {
                    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                        Some(json!(n as i64))
                    } else {
                        serde_json::Number::from_f64(n).map(Value::Number)
                    }
                })
                .unwrap_or(Value::String(text)),
            (OptionKind::Array, Value::String(text)) => Value::Array(
                text.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| Value::String(item.to_string()))
                    .collect(),
            ),
            (OptionKind::String { .. }, Value::Number(n)) => Value::String(n.to_string()),
            (OptionKind::String { .. }, Value::Bool(b)) => Value::String(b.to_string()),
            (_, value) => value,
        }
    }

    /// Check a value against the option's type, choices and bounds
    pub fn check(&self, name: &str, value: &Value) -> Result<(), Violation> {
        let violation = |message: String| Violation {
            path: format!("/{}", name),
            message,
        };

        match (&self.kind, value) {
            (OptionKind::String { choices }, Value::String(text)) => match choices {
                Some(choices) if !choices.contains(text) => Err(violation(format!(
                    "\"{}\" is not one of: {}",
                    text,
                    choices.join(", ")
                ))),
                _ => Ok(()),
            },
            (OptionKind::Boolean, Value::Bool(_)) => Ok(()),
            (OptionKind::Number { minimum, maximum }, Value::Number(number)) => {
                let n = number.as_f64().unwrap_or(f64::NAN);
                if let Some(minimum) = minimum.filter(|minimum| n < *minimum) {
                    return Err(violation(format!("{} is less than the minimum of {}", n, minimum)));
                }
                if let Some(maximum) = maximum.filter(|maximum| n > *maximum) {
                    return Err(violation(format!("{} is greater than the maximum of {}", n, maximum)));
                }
                Ok(())
            }
            (OptionKind::Array, Value::Array(_)) => Ok(()),
            (kind, other) => Err(violation(format!(
                "expected {}, got {}",
                kind.type_name(),
                other
            ))),
        }
    }
}

impl OptionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionKind::String { .. } => "string",
            OptionKind::Boolean => "boolean",
            OptionKind::Number { .. } => "number",
            OptionKind::Array => "array",
        }
    }
}

impl Template {
    /// JSON Schema of the template document
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "description": {"type": "string"},
                "version": {"type": "string"},
                "options": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "properties": {
                            "type": {"enum": ["string", "boolean", "number", "array"]},
                            "description": {"type": "string"},
                            "required": {"type": "boolean"},
                            "choices": {"type": "array", "items": {"type": "string"}},
                            "minimum": {"type": "number"},
                            "maximum": {"type": "number"}
                        },
                        "required": ["type"]
                    }
                },
                "actions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"name": {"type": "string"}},
                        "required": ["name"]
                    }
                }
            },
            "required": ["actions"]
        })
    }

    /// Validate provided option values, apply defaults and store them in the
    /// context, in declaration order.
    ///
    /// Defaults are interpolated against the variables set so far, so a
    /// default may reference any option declared before it.
    pub async fn resolve_options(
        &self,
        provided: &Map<String, Value>,
        context: &mut ExecutionContext,
    ) -> Result<(), WorkflowError> {
        let unknown: Vec<_> = provided
            .keys()
            .filter(|name| !self.options.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            let mut help = Help::with_reason(ErrorReason::InvalidInput);
            if !self.options.is_empty() {
                let known: Vec<_> = self.options.keys().map(String::as_str).collect();
                help = help.suggestion(format!("Available options: {}", known.join(", ")));
            }
            return Err(WorkflowError::with_help(
                format!("Unknown template option(s): {}", unknown.join(", ")),
                help,
            ));
        }

        let mut violations = Vec::new();
        for (name, definition) in &self.options {
            let value = match (provided.get(name), &definition.default) {
                (Some(value), _) => definition.coerce(value.clone()),
                (None, Some(default)) => context.evaluate(default).await?,
                (None, None) if definition.required => {
                    violations.push(Violation {
                        path: format!("/{}", name),
                        message: format!("option `{}` is required", name),
                    });
                    continue;
                }
                (None, None) => continue,
            };

            match definition.check(name, &value) {
                Ok(()) => context.set(name.clone(), value),
                Err(violation) => violations.push(violation),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations).into())
        }
    }

    /// Warning text when the template targets a newer runtime
    pub fn check_version(&self, runtime_version: &str) -> Option<String> {
        self.version
            .as_deref()
            .and_then(|version| check_compatibility(runtime_version, version))
    }
}

/// Compare the runtime version against the version a template expects.
/// Returns a warning message if the runtime is older; unparsable versions are
/// not compared.
pub fn check_compatibility(runtime_version: &str, template_version: &str) -> Option<String> {
    let runtime = parse_version(runtime_version).ok()?;
    let template = parse_version(template_version).ok()?;

    if runtime < template {
        Some(format!(
            "This template was designed for stencil {} or newer. You are running version {}.",
            template_version, runtime_version
        ))
    } else {
        None
    }
}

/// Parse a version string, accepting a leading `v`
pub fn parse_version(version: &str) -> Result<Version, semver::Error> {
    Version::parse(version.strip_prefix('v').unwrap_or(version))
}

/// Parse a document by its file extension; without a known extension JSON is
/// tried first, then YAML, and both errors are reported
fn parse_document(text: &str, name: &str) -> Result<Value, BoxError> {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(serde_json::from_str(text)?),
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(text)?),
        _ => serde_json::from_str(text).or_else(|json| {
            serde_yaml::from_str(text).map_err(|yaml| {
                format!("neither valid JSON ({}) nor YAML ({})", json, yaml).into()
            })
        }),
    }
}

/// Pick the template document out of transport content and parse it as JSON
/// or YAML
pub fn template_document(content: Content, url: &Url) -> ProviderResult<Value> {
    let (name, bytes) = match content {
        Content::File(bytes) => (url.path().to_string(), bytes),
        Content::Tree(mut files) => TEMPLATE_FILES
            .iter()
            .find_map(|name| files.remove(*name).map(|bytes| (name.to_string(), bytes)))
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "No {} found at {}",
                    TEMPLATE_FILES.join(" or "),
                    url
                ))
            })?,
    };

    let text = crate::transport::decode_text(bytes, url.as_str())?;
    parse_document(&text, &name)
        .map_err(|e| ProviderError::failed_with(format!("Failed to parse {} at {}", name, url), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryOutput;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn sample() -> Template {
        serde_json::from_value(json!({
            "title": "Demo",
            "version": "0.2.0",
            "options": {
                "name": {"type": "string", "description": "Project name", "required": true},
                "language": {
                    "type": "string",
                    "description": "Language",
                    "choices": ["typescript", "javascript"],
                    "default": "typescript"
                },
                "port": {"type": "number", "description": "Port", "minimum": 1024, "default": 3000},
                "directory": {"type": "string", "description": "Target", "default": "./${name}"},
                "features": {"type": "array", "description": "Features"}
            },
            "actions": [
                {"name": "print", "message": "Creating ${name}"},
                {"name": "create-directory", "path": "${directory}"}
            ]
        }))
        .unwrap()
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(MemoryOutput::new()),
            Url::parse("file:///tmp/").unwrap(),
            "/tmp",
        )
    }

    fn provided(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_round_trip_keeps_order_and_types() {
        let template = sample();
        let text = serde_json::to_string(&template).unwrap();
        let parsed: Template = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, template);

        let names: Vec<_> = parsed.options.keys().cloned().collect();
        assert_eq!(names, vec!["name", "language", "port", "directory", "features"]);
        assert_eq!(parsed.actions[1].name, "create-directory");
        assert!(matches!(parsed.options["port"].kind, OptionKind::Number { minimum: Some(_), .. }));
    }

    #[test]
    fn test_yaml_document_deserializes() {
        let url = Url::parse("file:///templates/demo/template.yaml").unwrap();
        let document = template_document(
            Content::File(
                b"title: Demo\noptions:\n  flag:\n    type: boolean\n    description: A flag\nactions:\n  - name: print\n    message: hi\n"
                    .to_vec(),
            ),
            &url,
        )
        .unwrap();
        let template: Template = serde_json::from_value(document).unwrap();
        assert_eq!(template.title.as_deref(), Some("Demo"));
        assert_eq!(template.options["flag"].kind, OptionKind::Boolean);
        assert_eq!(template.actions[0].options["message"], json!("hi"));
    }

    #[tokio::test]
    async fn test_defaults_see_earlier_options() {
        let mut context = context();
        sample()
            .resolve_options(&provided(json!({"name": "demo"})), &mut context)
            .await
            .unwrap();

        assert_eq!(context.value("language").await.unwrap(), json!("typescript"));
        assert_eq!(context.value("port").await.unwrap(), json!(3000));
        assert_eq!(context.value("directory").await.unwrap(), json!("./demo"));
        assert!(!context.contains("features"));
    }

    #[tokio::test]
    async fn test_provided_strings_are_coerced() {
        let mut context = context();
        sample()
            .resolve_options(
                &provided(json!({"name": "demo", "port": "8080", "features": "auth, db"})),
                &mut context,
            )
            .await
            .unwrap();
        assert_eq!(context.value("port").await.unwrap(), json!(8080));
        assert_eq!(context.value("features").await.unwrap(), json!(["auth", "db"]));
    }

    #[tokio::test]
    async fn test_violations_are_collected() {
        let mut template = sample();
        // its default references the missing `name`
        template.options.shift_remove("directory");

        let error = template
            .resolve_options(
                &provided(json!({"language": "cobol", "port": 80})),
                &mut context(),
            )
            .await
            .unwrap_err();

        assert_eq!(error.reason(), Some(ErrorReason::InvalidInput));
        let details = error.help().details;
        assert_eq!(details.len(), 3);
        assert!(details[0].starts_with("/name"));
        assert!(details[1].starts_with("/language"));
        assert!(details[2].starts_with("/port"));
    }

    #[tokio::test]
    async fn test_unknown_options_are_rejected() {
        let error = sample()
            .resolve_options(&provided(json!({"name": "x", "colour": "red"})), &mut context())
            .await
            .unwrap_err();
        assert!(error.to_string().contains("colour"));
        assert_eq!(error.reason(), Some(ErrorReason::InvalidInput));
    }

    #[test]
    fn test_runtime_older_than_template() {
        let warning = check_compatibility("0.1.0", "0.2.0");
        assert!(warning.unwrap().contains("0.2.0"));
        assert!(sample().check_version("0.1.0").is_some());
    }

    #[test]
    fn test_runtime_same_or_newer() {
        assert!(check_compatibility("0.1.0", "0.1.0").is_none());
        assert!(check_compatibility("0.2.0", "v0.1.0").is_none());
    }

    #[test]
    fn test_invalid_versions_are_not_compared() {
        assert!(check_compatibility("invalid", "0.1.0").is_none());
    }

    #[test]
    fn test_template_document_from_tree() {
        let url = Url::parse("file:///templates/demo/").unwrap();
        let tree = Content::Tree(BTreeMap::from([
            ("README.md".to_string(), b"# demo".to_vec()),
            ("template.yaml".to_string(), b"actions: []".to_vec()),
        ]));
        assert_eq!(template_document(tree, &url).unwrap(), json!({"actions": []}));

        let empty = Content::Tree(BTreeMap::new());
        assert!(template_document(empty, &url).unwrap_err().is_not_found());
    }

    #[test]
    fn test_malformed_json_reports_json_error() {
        let url = Url::parse("file:///templates/demo/").unwrap();
        let tree = Content::Tree(BTreeMap::from([(
            "template.json".to_string(),
            b"{\"actions\": [}".to_vec(),
        )]));
        let error = template_document(tree, &url).unwrap_err();
        let cause = std::error::Error::source(&error).unwrap().to_string();

        assert!(error.to_string().contains("template.json"));
        assert!(cause.contains("line 1"), "{}", cause);
        assert!(serde_json::from_str::<Value>("{\"actions\": [}")
            .unwrap_err()
            .to_string()
            .contains(&cause));
    }

    #[test]
    fn test_unknown_extension_reports_both_errors() {
        let url = Url::parse("https://example.com/templates/demo").unwrap();
        let error = template_document(Content::File(b"{: [".to_vec()), &url).unwrap_err();
        let cause = std::error::Error::source(&error).unwrap().to_string();
        assert!(cause.contains("JSON") && cause.contains("YAML"), "{}", cause);

        let yaml = template_document(Content::File(b"actions: []".to_vec()), &url).unwrap();
        assert_eq!(yaml, json!({"actions": []}));
    }
}
