//! Ordered, first-match-wins aggregation of resource providers

use super::{unsupported, BoxResourceProvider, Resource, ResourceProvider};
use crate::error::ProviderError;
use crate::provider::ProviderResult;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

/// Tries each member that supports the URL, in order.
///
/// A member answering [`ProviderError::NotFound`] hands over to the next one;
/// any other error aborts immediately and later members are never invoked.
pub struct MultiProvider<T> {
    providers: Vec<BoxResourceProvider<T>>,
}

impl<T> MultiProvider<T> {
    pub fn new(providers: Vec<BoxResourceProvider<T>>) -> Self {
        Self { providers }
    }

    pub fn push(&mut self, provider: BoxResourceProvider<T>) {
        self.providers.push(provider);
    }
}

#[async_trait]
impl<T> ResourceProvider<T> for MultiProvider<T>
where
    T: Send,
{
    fn supports(&self, url: &Url) -> bool {
        self.providers.iter().any(|provider| provider.supports(url))
    }

    async fn get(&self, url: &Url) -> ProviderResult<Resource<T>> {
        let mut not_found = None;

        for (index, provider) in self.providers.iter().enumerate() {
            if !provider.supports(url) {
                continue;
            }
            match provider.get(url).await {
                Ok(resource) => return Ok(resource),
                Err(ProviderError::NotFound(message)) => {
                    debug!(url = %url, provider = index, "not found, trying next provider");
                    not_found = Some(message);
                }
                Err(error) => return Err(error),
            }
        }

        match not_found {
            Some(message) => Err(ProviderError::NotFound(message)),
            None => Err(unsupported(url)),
        }
    }
}
