//! Variables, messages and user input

use super::options_schema;
use crate::action::control::help_schema;
use crate::action::{parse_options, Action, ActionRunner, ActionSpec, Options};
use crate::context::{ExecutionContext, Semantics};
use crate::error::{ErrorReason, Help, HelpLink, WorkflowError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

#[derive(Deserialize)]
struct DefineOptions {
    variables: Map<String, Value>,
}

/// `define`: set variables, in declaration order
pub struct DefineAction;

impl DefineAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "define",
            "Set variables",
            options_schema(json!({"variables": {"type": "object"}}), &["variables"]),
        )
    }
}

#[async_trait]
impl Action for DefineAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let DefineOptions { variables } = parse_options("define", options)?;
        for (name, value) in variables {
            debug!(variable = %name, "defining variable");
            context.set(name, value);
        }
        Ok(())
    }
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum MessageSemantics {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

impl From<MessageSemantics> for Semantics {
    fn from(semantics: MessageSemantics) -> Self {
        match semantics {
            MessageSemantics::Info => Semantics::Info,
            MessageSemantics::Warning => Semantics::Warning,
            MessageSemantics::Error => Semantics::Error,
            MessageSemantics::Success => Semantics::Success,
        }
    }
}

#[derive(Deserialize)]
struct PrintOptions {
    message: String,
    #[serde(default)]
    semantics: MessageSemantics,
}

/// `print`: write a message to the output
pub struct PrintAction;

impl PrintAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "print",
            "Print a message",
            options_schema(
                json!({
                    "message": {"type": "string"},
                    "semantics": {"enum": ["info", "warning", "error", "success"]}
                }),
                &["message"],
            ),
        )
    }
}

#[async_trait]
impl Action for PrintAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let PrintOptions { message, semantics } = parse_options("print", options)?;
        context.output().write(semantics.into(), &message);
        Ok(())
    }
}

#[derive(Deserialize)]
struct FailOptions {
    message: String,
    reason: Option<ErrorReason>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    links: Vec<HelpLink>,
    #[serde(default)]
    details: Vec<String>,
}

/// `fail`: stop the run with an error and troubleshooting help
pub struct FailAction;

impl FailAction {
    pub fn spec() -> ActionSpec {
        let help = help_schema();
        let mut properties = help["properties"].clone();
        properties["message"] = json!({"type": "string"});
        ActionSpec::new(
            "fail",
            "Stop with an error",
            options_schema(properties, &["message"]),
        )
    }
}

#[async_trait]
impl Action for FailAction {
    async fn execute(
        &self,
        options: Options,
        _context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let options: FailOptions = parse_options("fail", options)?;
        Err(WorkflowError::with_help(
            options.message,
            Help {
                message: None,
                reason: Some(options.reason.unwrap_or(ErrorReason::Other)),
                suggestions: options.suggestions,
                links: options.links,
                details: options.details,
            },
        ))
    }
}

#[derive(Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum PromptKind {
    #[default]
    Text,
    Confirm,
}

#[derive(Deserialize)]
struct PromptOptions {
    message: String,
    #[serde(default, rename = "type")]
    kind: PromptKind,
    default: Option<Value>,
    result: String,
}

/// `prompt`: ask for a value and store the answer
///
/// Without an input collaborator the default is used; a prompt with neither
/// fails.
pub struct PromptAction;

impl PromptAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "prompt",
            "Ask the user for a value",
            options_schema(
                json!({
                    "message": {"type": "string"},
                    "type": {"enum": ["text", "confirm"]},
                    "default": {"type": ["string", "boolean"]},
                    "result": {"type": "string", "minLength": 1}
                }),
                &["message", "result"],
            ),
        )
    }
}

#[async_trait]
impl Action for PromptAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let options: PromptOptions = parse_options("prompt", options)?;

        let answer = match (context.input(), options.kind) {
            (Some(input), PromptKind::Text) => {
                let default = options.default.as_ref().and_then(Value::as_str);
                Value::String(input.text(&options.message, default).await?)
            }
            (Some(input), PromptKind::Confirm) => {
                let default = options.default.as_ref().and_then(Value::as_bool);
                Value::Bool(input.confirm(&options.message, default).await?)
            }
            (None, _) => match options.default {
                Some(default) => default,
                None => {
                    return Err(WorkflowError::with_help(
                        format!("No answer available for prompt: {}", options.message),
                        Help::with_reason(ErrorReason::PreconditionFailed).suggestion(format!(
                            "Provide a value for `{}` up front",
                            options.result
                        )),
                    ))
                }
            },
        };

        context.set(options.result, answer);
        Ok(())
    }
}
