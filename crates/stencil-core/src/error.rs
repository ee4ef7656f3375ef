//! Error taxonomy and structured troubleshooting help
//!
//! Two layers of errors flow through the runtime:
//! - [`ProviderError`] is raised while resolving values and resources. Only
//!   [`ProviderError::NotFound`] is recoverable by composition primitives.
//! - [`WorkflowError`] is raised by the interpreter and by actions. It wraps
//!   arbitrary causes and carries [`Help`] for the top-level reporter.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed error used as the cause of wrapped failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Machine-readable reason attached to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorReason {
    InvalidInput,
    InvalidConfiguration,
    NotFound,
    NotSupported,
    PreconditionFailed,
    AccessDenied,
    Other,
}

/// A link shown alongside an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpLink {
    pub url: String,
    pub description: String,
}

/// Troubleshooting metadata attached to workflow errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Help {
    /// Message that replaces the error's own message when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorReason>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<HelpLink>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl Help {
    pub fn with_reason(reason: ErrorReason) -> Self {
        Self {
            reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn link(mut self, url: impl Into<String>, description: impl Into<String>) -> Self {
        self.links.push(HelpLink {
            url: url.into(),
            description: description.into(),
        });
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Merge newer help on top of this one.
    ///
    /// Scalar fields from `newer` win when set; lists are concatenated with
    /// duplicates dropped, keeping the existing entries first.
    pub fn merge(mut self, newer: Help) -> Help {
        if newer.message.is_some() {
            self.message = newer.message;
        }
        if newer.reason.is_some() {
            self.reason = newer.reason;
        }
        for suggestion in newer.suggestions {
            if !self.suggestions.contains(&suggestion) {
                self.suggestions.push(suggestion);
            }
        }
        for link in newer.links {
            if !self.links.contains(&link) {
                self.links.push(link);
            }
        }
        for detail in newer.details {
            if !self.details.contains(&detail) {
                self.details.push(detail);
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Help::default()
    }
}

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer to the offending value ("" for the root)
    pub path: String,
    pub message: String,
}

/// A list of violations raised by a schema validator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![Violation {
            path: path.into(),
            message: message.into(),
        }])
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .violations
            .iter()
            .map(|v| {
                if v.path.is_empty() {
                    v.message.clone()
                } else {
                    format!("{}: {}", v.path, v.message)
                }
            })
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// Errors raised by providers, resources and transports
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Nothing exists at the requested location; chains try the next candidate
    #[error("{0}")]
    NotFound(String),

    /// The provider cannot handle the request at all
    #[error("{0}")]
    Unsupported(String),

    /// The resolved value failed validation
    #[error("invalid value: {0}")]
    Invalid(#[from] ValidationError),

    /// Any other failure; aborts resolution chains
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl ProviderError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    pub fn failed_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn reason(&self) -> ErrorReason {
        match self {
            Self::NotFound(_) => ErrorReason::NotFound,
            Self::Unsupported(_) => ErrorReason::NotSupported,
            Self::Invalid(_) => ErrorReason::InvalidInput,
            Self::Failed { .. } => ErrorReason::Other,
        }
    }
}

/// Errors raised while interpreting a workflow
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("unsupported action `{0}`")]
    UnsupportedAction(String),

    #[error("invalid options for action `{action}`: {violations}")]
    InvalidOptions {
        action: String,
        violations: ValidationError,
    },

    #[error("variable `{0}` is not defined")]
    UndefinedVariable(String),

    #[error("deferred value nesting exceeds {0} levels")]
    DepthExceeded(usize),

    #[error("{message}")]
    Failed {
        message: String,
        help: Help,
        #[source]
        cause: Option<BoxError>,
    },
}

impl WorkflowError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            help: Help::default(),
            cause: None,
        }
    }

    pub fn with_help(message: impl Into<String>, help: Help) -> Self {
        Self::Failed {
            message: message.into(),
            help,
            cause: None,
        }
    }

    /// Wrap a cause, keeping its message unless `help` overrides it.
    ///
    /// Help already present on the cause is merged with the new help; the
    /// cause stays reachable through [`std::error::Error::source`].
    pub fn wrap(cause: impl Into<BoxError>, help: Help) -> Self {
        let cause = cause.into();
        let (message, existing) = match cause.downcast_ref::<WorkflowError>() {
            Some(WorkflowError::Failed { message, help, .. }) => (message.clone(), help.clone()),
            Some(other) => (other.to_string(), other.help()),
            None => match cause.downcast_ref::<ProviderError>() {
                Some(provider) => (
                    provider.to_string(),
                    Help::with_reason(provider.reason()),
                ),
                None => (cause.to_string(), Help::default()),
            },
        };
        let help = existing.merge(help);
        Self::Failed {
            message: help.message.clone().unwrap_or(message),
            help,
            cause: Some(cause),
        }
    }

    /// Help for this error, with the reason derived from the variant
    pub fn help(&self) -> Help {
        match self {
            Self::UnsupportedAction(name) => Help::with_reason(ErrorReason::NotSupported)
                .detail(format!("action: {}", name)),
            Self::InvalidOptions { violations, .. } => {
                let mut help = Help::with_reason(ErrorReason::InvalidInput);
                for violation in &violations.violations {
                    help = help.detail(format!("{} {}", violation.path, violation.message));
                }
                help
            }
            Self::UndefinedVariable(_) => Help::with_reason(ErrorReason::InvalidInput),
            Self::DepthExceeded(_) => Help::with_reason(ErrorReason::InvalidInput),
            Self::Failed { help, .. } => help.clone(),
        }
    }

    pub fn reason(&self) -> Option<ErrorReason> {
        self.help().reason
    }

    /// Render the error and its cause chain as a serializable payload
    pub fn payload(&self) -> ErrorPayload {
        let help = self.help();
        let cause = match self {
            Self::Failed {
                cause: Some(cause), ..
            } => Some(Box::new(payload_of(cause.as_ref()))),
            _ => None,
        };
        ErrorPayload {
            message: self.to_string(),
            reason: help.reason,
            suggestions: help.suggestions,
            links: help.links,
            details: help.details,
            cause,
        }
    }
}

impl From<ProviderError> for WorkflowError {
    fn from(error: ProviderError) -> Self {
        let mut help = Help::with_reason(error.reason());
        if let ProviderError::Invalid(validation) = &error {
            for violation in &validation.violations {
                help = help.detail(format!("{} {}", violation.path, violation.message));
            }
        }
        Self::Failed {
            message: error.to_string(),
            help,
            cause: Some(Box::new(error)),
        }
    }
}

impl From<ValidationError> for WorkflowError {
    fn from(error: ValidationError) -> Self {
        ProviderError::Invalid(error).into()
    }
}

fn payload_of(error: &(dyn std::error::Error + 'static)) -> ErrorPayload {
    if let Some(workflow) = error.downcast_ref::<WorkflowError>() {
        return workflow.payload();
    }
    let reason = error
        .downcast_ref::<ProviderError>()
        .map(ProviderError::reason);
    ErrorPayload {
        message: error.to_string(),
        reason,
        suggestions: Vec::new(),
        links: Vec::new(),
        details: Vec::new(),
        cause: error.source().map(|source| Box::new(payload_of(source))),
    }
}

/// Serializable error report consumed by presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorReason>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<HelpLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorPayload>>,
}
