//! Mapping-based providers

use super::{BoxProvider, Provider, ProviderResult};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// Picks a provider by the value of a discriminator.
///
/// Raises [`ProviderError::Unsupported`] when the discriminator yields a value
/// with no registered entry.
pub struct EnumeratedProvider<D, T, A = ()> {
    discriminator: BoxProvider<D, A>,
    mapping: HashMap<D, BoxProvider<T, A>>,
}

impl<D, T, A> EnumeratedProvider<D, T, A>
where
    D: Eq + Hash,
{
    pub fn new(discriminator: BoxProvider<D, A>) -> Self {
        Self {
            discriminator,
            mapping: HashMap::new(),
        }
    }

    pub fn with(mut self, discriminant: D, provider: BoxProvider<T, A>) -> Self {
        self.mapping.insert(discriminant, provider);
        self
    }
}

#[async_trait]
impl<D, T, A> Provider<T, A> for EnumeratedProvider<D, T, A>
where
    D: Eq + Hash + Display + Send + Sync,
    T: Send,
    A: Clone + Send + Sync + 'static,
{
    async fn get(&self, args: A) -> ProviderResult<T> {
        let discriminant = self.discriminator.get(args.clone()).await?;
        match self.mapping.get(&discriminant) {
            Some(provider) => provider.get(args).await,
            None => Err(ProviderError::Unsupported(format!(
                "No provider registered for `{}`",
                discriminant
            ))),
        }
    }
}

/// Looks up the call argument in a fixed mapping.
///
/// Raises [`ProviderError::NotFound`] on a miss.
#[derive(Debug, Clone)]
pub struct MapProvider<K, T> {
    mapping: HashMap<K, T>,
}

impl<K, T> MapProvider<K, T> {
    pub fn new(mapping: HashMap<K, T>) -> Self {
        Self { mapping }
    }
}

impl<K: Eq + Hash, T> FromIterator<(K, T)> for MapProvider<K, T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl<K, T> Provider<T, K> for MapProvider<K, T>
where
    K: Eq + Hash + Display + Send + Sync + 'static,
    T: Clone + Send + Sync,
{
    async fn get(&self, key: K) -> ProviderResult<T> {
        self.mapping
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("No entry found for `{}`", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{constant, from_fn};

    #[tokio::test]
    async fn test_enumerated_dispatches_on_discriminator() {
        let provider = EnumeratedProvider::new(from_fn(|lock: &'static str| async move {
            Ok(match lock {
                "yarn.lock" => "yarn".to_string(),
                _ => "npm".to_string(),
            })
        }))
        .with("yarn".to_string(), constant("yarn add"))
        .with("npm".to_string(), constant("npm install"));

        assert_eq!(provider.get("yarn.lock").await.unwrap(), "yarn add");
        assert_eq!(provider.get("package-lock.json").await.unwrap(), "npm install");
    }

    #[tokio::test]
    async fn test_enumerated_unknown_discriminant_is_unsupported() {
        let provider: EnumeratedProvider<String, u32> =
            EnumeratedProvider::new(constant("deno".to_string()));
        let error = provider.get(()).await.unwrap_err();
        assert!(matches!(error, ProviderError::Unsupported(_)));
        assert!(error.to_string().contains("deno"));
    }

    #[tokio::test]
    async fn test_map_lookup() {
        let provider: MapProvider<String, u32> =
            [("one".to_string(), 1), ("two".to_string(), 2)].into_iter().collect();

        assert_eq!(provider.get("two".to_string()).await.unwrap(), 2);
        let error = provider.get("three".to_string()).await.unwrap_err();
        assert!(error.is_not_found());
    }
}
