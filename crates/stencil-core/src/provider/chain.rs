//! Providers that chain or select among other providers

use super::{BoxProvider, Provider, ProviderResult};
use crate::error::ProviderError;
use async_trait::async_trait;
use tracing::debug;

/// Returns the primary value unless it is absent, then consults the fallback once
pub struct FallbackProvider<T, A = ()> {
    primary: BoxProvider<Option<T>, A>,
    fallback: BoxProvider<Option<T>, A>,
}

impl<T, A> FallbackProvider<T, A> {
    pub fn new(primary: BoxProvider<Option<T>, A>, fallback: BoxProvider<Option<T>, A>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<T, A> Provider<Option<T>, A> for FallbackProvider<T, A>
where
    T: Send,
    A: Clone + Send + Sync + 'static,
{
    async fn get(&self, args: A) -> ProviderResult<Option<T>> {
        match self.primary.get(args.clone()).await? {
            Some(value) => Ok(Some(value)),
            None => self.fallback.get(args).await,
        }
    }
}

/// Tries providers in order and returns the first present value
pub struct SequentialProvider<T, A = ()> {
    providers: Vec<BoxProvider<Option<T>, A>>,
}

impl<T, A> SequentialProvider<T, A> {
    pub fn new(providers: Vec<BoxProvider<Option<T>, A>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl<T, A> Provider<Option<T>, A> for SequentialProvider<T, A>
where
    T: Send,
    A: Clone + Send + Sync + 'static,
{
    async fn get(&self, args: A) -> ProviderResult<Option<T>> {
        for provider in &self.providers {
            if let Some(value) = provider.get(args.clone()).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// A predicate paired with the provider used when it holds
pub struct Candidate<T, A = ()> {
    pub predicate: BoxProvider<bool, A>,
    pub value: BoxProvider<T, A>,
}

impl<T, A> Candidate<T, A> {
    pub fn new(predicate: BoxProvider<bool, A>, value: BoxProvider<T, A>) -> Self {
        Self { predicate, value }
    }
}

/// Selects the first candidate whose predicate holds.
///
/// A predicate that fails counts as false and never aborts the chain. When no
/// candidate matches, the default provider is used if one was given, otherwise
/// the result is [`ProviderError::NotFound`].
pub struct ConditionalProvider<T, A = ()> {
    candidates: Vec<Candidate<T, A>>,
    default: Option<BoxProvider<T, A>>,
}

impl<T, A> ConditionalProvider<T, A> {
    pub fn new(candidates: Vec<Candidate<T, A>>) -> Self {
        Self {
            candidates,
            default: None,
        }
    }

    pub fn with_default(mut self, default: BoxProvider<T, A>) -> Self {
        self.default = Some(default);
        self
    }
}

#[async_trait]
impl<T, A> Provider<T, A> for ConditionalProvider<T, A>
where
    T: Send,
    A: Clone + Send + Sync + 'static,
{
    async fn get(&self, args: A) -> ProviderResult<T> {
        for (index, candidate) in self.candidates.iter().enumerate() {
            match candidate.predicate.get(args.clone()).await {
                Ok(true) => return candidate.value.get(args).await,
                Ok(false) => {}
                Err(error) => {
                    debug!(candidate = index, error = %error, "predicate failed, skipping candidate");
                }
            }
        }

        match &self.default {
            Some(default) => default.get(args).await,
            None => Err(ProviderError::NotFound(
                "No candidate matched the given arguments".to_string(),
            )),
        }
    }
}
