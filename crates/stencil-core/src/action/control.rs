//! Control flow expressed as ordinary actions
//!
//! `test`, `try` and `repeat` receive their sub-action lists as deferred
//! options and run them through the same [`ActionRunner`] that dispatched them.

use super::{action_list, action_list_schema, parse_options, Action, ActionRunner, ActionSpec, Options};
use crate::context::ExecutionContext;
use crate::error::{ErrorReason, Help, WorkflowError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

/// `test`: run `then` when the condition holds, `else` otherwise
pub struct TestAction;

impl TestAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "test",
            "Run one of two branches depending on a condition",
            json!({
                "type": "object",
                "properties": {
                    "condition": {"type": "boolean"},
                    "then": action_list_schema(),
                    "else": action_list_schema()
                },
                "required": ["condition"]
            }),
        )
        .deferred(&["then", "else"])
    }
}

#[async_trait]
impl Action for TestAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let condition = options
            .get("condition")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let branch = if condition { "then" } else { "else" };
        debug!(condition, branch, "evaluated test");

        let actions = action_list("test", options.get(branch))?;
        runner.run(&actions, context).await
    }
}

#[derive(Deserialize)]
struct TryOptions {
    #[serde(default)]
    help: Help,
}

/// `try`: run `run`; on failure run `else`, or rethrow with extra help
pub struct TryAction;

impl TryAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "try",
            "Run actions, recovering from any failure",
            json!({
                "type": "object",
                "properties": {
                    "run": action_list_schema(),
                    "else": action_list_schema(),
                    "help": help_schema()
                },
                "required": ["run"]
            }),
        )
        .deferred(&["run", "else"])
    }
}

#[async_trait]
impl Action for TryAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let primary = action_list("try", options.get("run"))?;
        let recovery = match options.get("else") {
            Some(value) => Some(action_list("try", Some(value))?),
            None => None,
        };
        let TryOptions { help } = parse_options("try", options)?;

        let error = match runner.run(&primary, context).await {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };

        match recovery {
            Some(recovery) => {
                info!(error = %error, "recovered from failed actions");
                runner.run(&recovery, context).await
            }
            None => Err(WorkflowError::wrap(error, help)),
        }
    }
}

#[derive(Deserialize)]
struct RepeatOptions {
    condition: Value,
    limit: Option<u64>,
}

/// `repeat`: run `actions` while the condition, re-evaluated before every
/// pass, is true
pub struct RepeatAction;

impl RepeatAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "repeat",
            "Run actions while a condition holds",
            json!({
                "type": "object",
                "properties": {
                    "condition": {"type": ["boolean", "string"]},
                    "actions": action_list_schema(),
                    "limit": {"type": "integer", "minimum": 0}
                },
                "required": ["condition", "actions"]
            }),
        )
        .deferred(&["condition", "actions"])
    }
}

#[async_trait]
impl Action for RepeatAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let actions = action_list("repeat", options.get("actions"))?;
        let RepeatOptions { condition, limit } = parse_options("repeat", options)?;
        let mut iterations: u64 = 0;

        loop {
            let proceed = match context.evaluate(&condition).await? {
                Value::Bool(proceed) => proceed,
                other => {
                    return Err(WorkflowError::with_help(
                        format!("Repeat condition must be a boolean, got {}", other),
                        Help::with_reason(ErrorReason::InvalidInput),
                    ))
                }
            };
            if !proceed {
                break;
            }
            if let Some(limit) = limit {
                if iterations >= limit {
                    return Err(WorkflowError::with_help(
                        format!("Repeat exceeded its limit of {} iterations", limit),
                        Help::with_reason(ErrorReason::PreconditionFailed)
                            .suggestion("Check that the loop condition eventually becomes false"),
                    ));
                }
            }

            debug!(iteration = iterations, "repeating actions");
            runner.run(&actions, context).await?;
            iterations += 1;
        }

        debug!(iterations, "repeat finished");
        Ok(())
    }
}

/// Schema of a user-supplied [`Help`] block
pub fn help_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": {"type": "string"},
            "reason": {
                "enum": [
                    "invalid-input",
                    "invalid-configuration",
                    "not-found",
                    "not-supported",
                    "precondition-failed",
                    "access-denied",
                    "other"
                ]
            },
            "suggestions": {"type": "array", "items": {"type": "string"}},
            "links": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "url": {"type": "string"},
                        "description": {"type": "string"}
                    },
                    "required": ["url", "description"]
                }
            },
            "details": {"type": "array", "items": {"type": "string"}}
        }
    })
}
