//! Terminal prompts using cliclack
//!
//! This module is optional and only available when the `tui` feature is enabled.

use crate::context::Input;
use crate::error::{ErrorReason, Help, WorkflowError};
use async_trait::async_trait;
use std::io::{self, IsTerminal};

/// Answers `prompt` actions with inline cliclack prompts
#[derive(Debug, Clone, Default)]
pub struct PromptInput;

impl PromptInput {
    pub fn new() -> Self {
        Self
    }

    /// Whether someone is at the terminal to answer prompts
    pub fn is_available() -> bool {
        console::user_attended_stderr() && io::stdin().is_terminal()
    }
}

/// Map a prompt failure, where an interrupted prompt means the user cancelled
fn prompt_failure(error: io::Error) -> WorkflowError {
    let help = match error.kind() {
        io::ErrorKind::Interrupted => Help {
            message: Some("Prompt cancelled".to_string()),
            ..Help::with_reason(ErrorReason::PreconditionFailed)
        }
        .suggestion("Pass the value with --set or run with --yes to use defaults"),
        _ => Help::with_reason(ErrorReason::Other),
    };
    WorkflowError::wrap(error, help)
}

#[async_trait]
impl Input for PromptInput {
    async fn text(&self, message: &str, default: Option<&str>) -> Result<String, WorkflowError> {
        let message = message.to_string();
        let default = default.map(str::to_string);
        tokio::task::spawn_blocking(move || {
            let mut prompt = cliclack::input(message);
            if let Some(default) = &default {
                prompt = prompt.placeholder(default).default_input(default);
            }
            prompt.interact::<String>()
        })
        .await
        .map_err(|e| WorkflowError::wrap(e, Help::default()))?
        .map_err(prompt_failure)
    }

    async fn confirm(&self, message: &str, default: Option<bool>) -> Result<bool, WorkflowError> {
        let message = message.to_string();
        tokio::task::spawn_blocking(move || {
            cliclack::confirm(message)
                .initial_value(default.unwrap_or(true))
                .interact()
        })
        .await
        .map_err(|e| WorkflowError::wrap(e, Help::default()))?
        .map_err(prompt_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_prompt_is_precondition_failure() {
        let error = prompt_failure(io::Error::new(io::ErrorKind::Interrupted, "cancelled"));
        assert_eq!(error.reason(), Some(ErrorReason::PreconditionFailed));
        assert_eq!(error.to_string(), "Prompt cancelled");
        assert_eq!(error.help().suggestions.len(), 1);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_other_prompt_failures_keep_cause_message() {
        let error = prompt_failure(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone"));
        assert_eq!(error.reason(), Some(ErrorReason::Other));
        assert_eq!(error.to_string(), "terminal gone");
    }
}
