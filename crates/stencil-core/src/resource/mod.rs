//! URL-addressed resources
//!
//! A [`ResourceProvider`] resolves a [`Resource`] from a URL it supports.
//! Callers may check [`ResourceProvider::supports`] up front; every
//! implementation also checks it inside `get` and answers
//! [`ProviderError::Unsupported`] instead of returning wrong data.
//!
//! Composites:
//! - [`MultiProvider`]: first member that supports the URL and finds it wins
//! - [`MappedProvider`]: rewrites URLs before delegating
//! - [`CachedResourceProvider`]: caches by URL string
//! - [`AdaptedProvider`]: maps the resolved value
//! - [`ValidatedProvider`]: checks the resolved value against a schema

pub mod decorators;
pub mod mapped;
pub mod multi;
pub mod validated;

use crate::error::ProviderError;
use crate::provider::ProviderResult;
use async_trait::async_trait;
use url::Url;

pub use decorators::{AdaptedProvider, CachedResourceProvider};
pub use mapped::{MappedProvider, MappingRule, UrlMapping};
pub use multi::MultiProvider;
pub use validated::{SchemaValidator, ValidatedProvider, Validator};

/// A value tagged with the URL it was resolved from
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<T> {
    pub url: Url,
    pub value: T,
}

impl<T> Resource<T> {
    pub fn new(url: Url, value: T) -> Self {
        Self { url, value }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resource<U> {
        Resource {
            url: self.url,
            value: f(self.value),
        }
    }
}

/// Resolves values addressed by URL
#[async_trait]
pub trait ResourceProvider<T>: Send + Sync {
    /// Whether this provider can handle the URL
    fn supports(&self, url: &Url) -> bool;

    /// Resolve the resource at the URL
    async fn get(&self, url: &Url) -> ProviderResult<Resource<T>>;
}

/// Boxed resource provider
pub type BoxResourceProvider<T> = Box<dyn ResourceProvider<T>>;

/// Error returned when `get` is invoked with a URL the provider does not support
pub fn unsupported(url: &Url) -> ProviderError {
    ProviderError::Unsupported(format!("Unsupported URL: {}", url))
}

/// Resolves every URL to the same value
#[derive(Debug, Clone)]
pub struct ConstantResourceProvider<T> {
    value: T,
}

impl<T> ConstantResourceProvider<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T> ResourceProvider<T> for ConstantResourceProvider<T>
where
    T: Clone + Send + Sync,
{
    fn supports(&self, _url: &Url) -> bool {
        true
    }

    async fn get(&self, url: &Url) -> ProviderResult<Resource<T>> {
        Ok(Resource::new(url.clone(), self.value.clone()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_constant_supports_everything() {
        let provider = ConstantResourceProvider::new(42);
        let url = Url::parse("memory://anything").unwrap();
        assert!(provider.supports(&url));

        let resource = provider.get(&url).await.unwrap();
        assert_eq!(resource.value, 42);
        assert_eq!(resource.url, url);
    }

    #[test]
    fn test_resource_map_keeps_url() {
        let url = Url::parse("file:///tmp/a.json").unwrap();
        let resource = Resource::new(url.clone(), "1").map(|v| v.len());
        assert_eq!(resource, Resource::new(url, 1));
    }
}
