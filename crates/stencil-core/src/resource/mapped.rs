//! URL rewriting in front of another resource provider

use super::{unsupported, BoxResourceProvider, Resource, ResourceProvider};
use crate::error::ProviderError;
use crate::provider::ProviderResult;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// A rewrite rule: URLs matching `pattern` are replaced by `template`.
///
/// The template may reference capture groups as `$1`, `${name}` and so on.
#[derive(Debug, Clone)]
pub struct UrlMapping {
    pattern: Regex,
    template: String,
}

impl UrlMapping {
    pub fn new(pattern: &str, template: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            template: template.into(),
        })
    }

    fn apply(&self, url: &Url) -> Option<String> {
        if self.pattern.is_match(url.as_str()) {
            Some(
                self.pattern
                    .replace(url.as_str(), self.template.as_str())
                    .into_owned(),
            )
        } else {
            None
        }
    }
}

/// Serializable form of a [`UrlMapping`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    pub pattern: String,
    pub template: String,
}

impl TryFrom<&MappingRule> for UrlMapping {
    type Error = regex::Error;

    fn try_from(rule: &MappingRule) -> Result<Self, Self::Error> {
        UrlMapping::new(&rule.pattern, rule.template.clone())
    }
}

/// Rewrites URLs through the first matching rule before delegating
pub struct MappedProvider<T> {
    inner: BoxResourceProvider<T>,
    rules: Vec<UrlMapping>,
}

impl<T> MappedProvider<T> {
    pub fn new(inner: BoxResourceProvider<T>, rules: Vec<UrlMapping>) -> Self {
        Self { inner, rules }
    }

    /// Apply the first matching rule; URLs matching no rule pass through
    pub fn map(&self, url: &Url) -> ProviderResult<Url> {
        for rule in &self.rules {
            if let Some(rewritten) = rule.apply(url) {
                debug!(from = %url, to = %rewritten, "rewrote URL");
                return Url::parse(&rewritten).map_err(|e| {
                    ProviderError::failed_with(
                        format!("URL {} was rewritten to an invalid URL: {}", url, rewritten),
                        e,
                    )
                });
            }
        }
        Ok(url.clone())
    }
}

#[async_trait]
impl<T> ResourceProvider<T> for MappedProvider<T>
where
    T: Send,
{
    fn supports(&self, url: &Url) -> bool {
        self.map(url)
            .map(|mapped| self.inner.supports(&mapped))
            .unwrap_or(false)
    }

    async fn get(&self, url: &Url) -> ProviderResult<Resource<T>> {
        let mapped = self.map(url)?;
        if !self.inner.supports(&mapped) {
            return Err(unsupported(url));
        }
        self.inner.get(&mapped).await
    }
}
