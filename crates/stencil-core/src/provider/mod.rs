//! Composable value providers
//!
//! A [`Provider`] produces a value from zero or more arguments, possibly
//! suspending. Providers are composed by exclusive wrapping: each decorator
//! owns the provider(s) it delegates to.
//!
//! This module provides:
//! - Leaf providers ([`ConstantProvider`], [`CallbackProvider`])
//! - Stateful decorators ([`MemoizedProvider`], [`CachedProvider`])
//! - Chains over optional values ([`FallbackProvider`], [`SequentialProvider`])
//! - Selection ([`ConditionalProvider`], [`EnumeratedProvider`], [`MapProvider`])

pub mod cache;
pub mod chain;
pub mod lookup;
pub mod memo;

use crate::error::ProviderError;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

pub use cache::{Cache, CachedProvider, InMemoryCache};
pub use chain::{ConditionalProvider, FallbackProvider, SequentialProvider};
pub use lookup::{EnumeratedProvider, MapProvider};
pub use memo::MemoizedProvider;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A capability that yields a value from its arguments
#[async_trait]
pub trait Provider<T, A = ()>: Send + Sync {
    async fn get(&self, args: A) -> ProviderResult<T>;
}

/// Boxed provider, the unit of ownership in compositions
pub type BoxProvider<T, A = ()> = Box<dyn Provider<T, A>>;

/// Always returns a clone of a fixed value
#[derive(Debug, Clone)]
pub struct ConstantProvider<T> {
    value: T,
}

impl<T> ConstantProvider<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T, A> Provider<T, A> for ConstantProvider<T>
where
    T: Clone + Send + Sync,
    A: Send + 'static,
{
    async fn get(&self, _args: A) -> ProviderResult<T> {
        Ok(self.value.clone())
    }
}

/// Delegates to an async closure
pub struct CallbackProvider<F, T, A> {
    callback: F,
    _marker: PhantomData<fn(A) -> T>,
}

impl<F, Fut, T, A> CallbackProvider<F, T, A>
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = ProviderResult<T>> + Send,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T, A> Provider<T, A> for CallbackProvider<F, T, A>
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = ProviderResult<T>> + Send,
    T: Send,
    A: Send + 'static,
{
    async fn get(&self, args: A) -> ProviderResult<T> {
        (self.callback)(args).await
    }
}

/// Shorthand for boxing a closure as a provider
pub fn from_fn<F, Fut, T, A>(callback: F) -> BoxProvider<T, A>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProviderResult<T>> + Send + 'static,
    T: Send + 'static,
    A: Send + 'static,
{
    Box::new(CallbackProvider::new(callback))
}

/// Shorthand for boxing a constant as a provider
pub fn constant<T, A>(value: T) -> BoxProvider<T, A>
where
    T: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    Box::new(ConstantProvider::new(value))
}
