//! Caching and value-adapting resource decorators

use super::{unsupported, BoxResourceProvider, Resource, ResourceProvider};
use crate::provider::{Cache, ProviderResult};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Caches resolved resources, keyed by the URL string
pub struct CachedResourceProvider<T> {
    inner: BoxResourceProvider<T>,
    cache: Arc<dyn Cache<Resource<T>>>,
}

impl<T> CachedResourceProvider<T> {
    pub fn new(inner: BoxResourceProvider<T>, cache: Arc<dyn Cache<Resource<T>>>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<T> ResourceProvider<T> for CachedResourceProvider<T>
where
    T: Send + 'static,
{
    fn supports(&self, url: &Url) -> bool {
        self.inner.supports(url)
    }

    async fn get(&self, url: &Url) -> ProviderResult<Resource<T>> {
        if !self.inner.supports(url) {
            return Err(unsupported(url));
        }
        self.cache.get(url.as_str(), self.inner.get(url)).await
    }
}

type Adapter<T, U> = Box<dyn Fn(T, &Url) -> ProviderResult<U> + Send + Sync>;

/// Transforms the value of every successfully resolved resource
pub struct AdaptedProvider<T, U> {
    inner: BoxResourceProvider<T>,
    adapter: Adapter<T, U>,
}

impl<T, U> AdaptedProvider<T, U> {
    pub fn new<F>(inner: BoxResourceProvider<T>, adapter: F) -> Self
    where
        F: Fn(T, &Url) -> ProviderResult<U> + Send + Sync + 'static,
    {
        Self {
            inner,
            adapter: Box::new(adapter),
        }
    }
}

#[async_trait]
impl<T, U> ResourceProvider<U> for AdaptedProvider<T, U>
where
    T: Send,
    U: Send,
{
    fn supports(&self, url: &Url) -> bool {
        self.inner.supports(url)
    }

    async fn get(&self, url: &Url) -> ProviderResult<Resource<U>> {
        let resource = self.inner.get(url).await?;
        let value = (self.adapter)(resource.value, &resource.url)?;
        Ok(Resource::new(resource.url, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::InMemoryCache;
    use crate::resource::testing::{boxed, Stub, StubProvider};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_cached_resource_fetches_once_per_url() {
        let stub = StubProvider::new("https", Stub::Found("body"));
        let calls = stub.calls.clone();
        let provider = CachedResourceProvider::new(boxed(stub), Arc::new(InMemoryCache::new()));

        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("https://example.com/b").unwrap();
        provider.get(&a).await.unwrap();
        provider.get(&a).await.unwrap();
        provider.get(&b).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_resource_rejects_unsupported_without_caching() {
        let stub = StubProvider::new("https", Stub::Found("body"));
        let calls = stub.calls.clone();
        let provider = CachedResourceProvider::new(boxed(stub), Arc::new(InMemoryCache::new()));

        let error = provider
            .get(&Url::parse("file:///tmp/x").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(error, ProviderError::Unsupported(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_adapted_maps_value() {
        let provider = AdaptedProvider::new(
            boxed(StubProvider::new("https", Stub::Found("hello"))),
            |value: String, _url: &Url| Ok(value.len()),
        );
        let resource = provider
            .get(&Url::parse("https://example.com/a").unwrap())
            .await
            .unwrap();
        assert_eq!(resource.value, 5);
    }

    #[tokio::test]
    async fn test_adapted_propagates_adapter_errors() {
        let provider: AdaptedProvider<String, u32> = AdaptedProvider::new(
            boxed(StubProvider::new("https", Stub::Found("abc"))),
            |value: String, _url: &Url| {
                value
                    .parse::<u32>()
                    .map_err(|e| ProviderError::failed_with("not a number", e))
            },
        );
        let error = provider
            .get(&Url::parse("https://example.com/a").unwrap())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "not a number");
    }
}
