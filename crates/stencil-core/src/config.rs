//! Runtime configuration
//!
//! Everything needed to assemble the resource stack lives in one flat
//! [`RuntimeConfig`], read from a YAML or JSON file and then overridden by
//! environment variables:
//!
//! - `STENCIL_USER_AGENT`: user agent for HTTP requests
//! - `STENCIL_HTTP_TIMEOUT`: request timeout in seconds
//! - `STENCIL_TEMPLATE_REGISTRY`: base URL that `template://name` resolves against

use crate::deferred::DEFAULT_MAX_DEPTH;
use crate::error::{ErrorReason, Help, WorkflowError};
use crate::resource::MappingRule;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const USER_AGENT_ENV: &str = "STENCIL_USER_AGENT";
pub const HTTP_TIMEOUT_ENV: &str = "STENCIL_HTTP_TIMEOUT";
pub const TEMPLATE_REGISTRY_ENV: &str = "STENCIL_TEMPLATE_REGISTRY";

/// Where `template://` URLs point unless configured otherwise
pub const DEFAULT_TEMPLATE_REGISTRY: &str = "github://stencil-dev/templates";

const TEMPLATE_SCHEME_PATTERN: &str = r"^template://(.+)$";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub user_agent: String,
    pub http_timeout_secs: u64,
    /// Cache fetched resources for the lifetime of the process
    pub cache: bool,
    /// URL rewrite rules, first match wins
    pub mappings: Vec<MappingRule>,
    /// Nesting limit for deferred values
    pub max_depth: usize,
    /// Override for the GitHub archive host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_archive_url: Option<String>,
    /// Override for the GitHub raw-file host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_raw_url: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("stencil/{}", crate::VERSION),
            http_timeout_secs: 30,
            cache: true,
            mappings: vec![registry_mapping(DEFAULT_TEMPLATE_REGISTRY)],
            max_depth: DEFAULT_MAX_DEPTH,
            github_archive_url: None,
            github_raw_url: None,
        }
    }
}

fn registry_mapping(registry: &str) -> MappingRule {
    MappingRule {
        pattern: TEMPLATE_SCHEME_PATTERN.to_string(),
        template: format!("{}/$1", registry.trim_end_matches('/')),
    }
}

fn invalid(message: String) -> WorkflowError {
    WorkflowError::with_help(message, Help::with_reason(ErrorReason::InvalidConfiguration))
}

impl RuntimeConfig {
    /// Load from `path` when given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, WorkflowError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, WorkflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::wrap(
                e,
                Help {
                    message: Some(format!("Failed to read {}", path.display())),
                    ..Help::with_reason(ErrorReason::InvalidConfiguration)
                },
            )
        })?;
        Self::parse(&content)
            .map_err(|e| invalid(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Parse YAML (or JSON, which YAML accepts)
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Apply overrides from a variable lookup such as the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), WorkflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user_agent) = lookup(USER_AGENT_ENV) {
            self.user_agent = user_agent;
        }
        if let Some(timeout) = lookup(HTTP_TIMEOUT_ENV) {
            self.http_timeout_secs = timeout.trim().parse().map_err(|_| {
                invalid(format!(
                    "{} must be a number of seconds, got '{}'",
                    HTTP_TIMEOUT_ENV, timeout
                ))
            })?;
        }
        if let Some(registry) = lookup(TEMPLATE_REGISTRY_ENV) {
            self.mappings.insert(0, registry_mapping(&registry));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
