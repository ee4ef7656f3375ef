//! Deferred values and variables
//!
//! A [`Deferred`] is JSON-like data whose nodes may still be suspended
//! computations. [`resolve`] turns it into a plain [`Value`], resolving
//! siblings concurrently while keeping object key order and array element
//! order exactly as declared.

use crate::error::WorkflowError;
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Nesting depth past which resolution fails instead of recursing further
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Future yielding one more layer of a deferred value
pub type PendingValue = BoxFuture<'static, Result<Deferred, WorkflowError>>;

/// JSON-like data that may contain suspended computations
pub enum Deferred {
    Value(Value),
    Array(Vec<Deferred>),
    Object(Vec<(String, Deferred)>),
    Pending(PendingValue),
}

impl Deferred {
    /// Wrap a computation producing another deferred value
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Deferred, WorkflowError>> + Send + 'static,
    {
        Deferred::Pending(future.boxed())
    }

    /// Wrap a computation producing a plain value
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, WorkflowError>> + Send + 'static,
    {
        Deferred::Pending(future.map(|result| result.map(Deferred::Value)).boxed())
    }

    /// Whether resolving this value can suspend
    pub fn is_ready(&self) -> bool {
        match self {
            Deferred::Value(_) => true,
            Deferred::Array(items) => items.iter().all(Deferred::is_ready),
            Deferred::Object(entries) => entries.iter().all(|(_, value)| value.is_ready()),
            Deferred::Pending(_) => false,
        }
    }
}

impl From<Value> for Deferred {
    fn from(value: Value) -> Self {
        Deferred::Value(value)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Deferred::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Deferred::Object(entries) => f.debug_tuple("Object").field(entries).finish(),
            Deferred::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Resolve with the default depth guard
pub async fn resolve(value: Deferred) -> Result<Value, WorkflowError> {
    resolve_with_limit(value, DEFAULT_MAX_DEPTH).await
}

/// Resolve every suspended node, failing with
/// [`WorkflowError::DepthExceeded`] past `max_depth` levels.
///
/// All branches run to completion; when several fail, the error of the first
/// failing branch in declaration order is returned.
pub async fn resolve_with_limit(value: Deferred, max_depth: usize) -> Result<Value, WorkflowError> {
    resolve_at(value, 0, max_depth).await
}

fn resolve_at(
    value: Deferred,
    depth: usize,
    max_depth: usize,
) -> BoxFuture<'static, Result<Value, WorkflowError>> {
    async move {
        if depth > max_depth {
            return Err(WorkflowError::DepthExceeded(max_depth));
        }

        match value {
            Deferred::Value(value) => Ok(value),
            Deferred::Array(items) => {
                let resolved =
                    join_all(items.into_iter().map(|item| resolve_at(item, depth + 1, max_depth)))
                        .await;
                resolved
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Deferred::Object(entries) => {
                let (keys, values): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
                let resolved =
                    join_all(values.into_iter().map(|item| resolve_at(item, depth + 1, max_depth)))
                        .await;

                let mut object = Map::new();
                for (key, value) in keys.into_iter().zip(resolved) {
                    object.insert(key, value?);
                }
                Ok(Value::Object(object))
            }
            Deferred::Pending(future) => {
                let next = future.await?;
                resolve_at(next, depth + 1, max_depth).await
            }
        }
    }
    .boxed()
}

type LazyFn = dyn Fn() -> BoxFuture<'static, Result<Value, WorkflowError>> + Send + Sync;

/// A value computed on demand, every time it is forced
#[derive(Clone)]
pub struct LazyValue(Arc<LazyFn>);

impl LazyValue {
    pub fn new<F, Fut>(compute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, WorkflowError>> + Send + 'static,
    {
        Self(Arc::new(move || compute().boxed()))
    }

    pub fn evaluate(&self) -> BoxFuture<'static, Result<Value, WorkflowError>> {
        (self.0)()
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyValue")
    }
}

/// Content of a variable slot
#[derive(Debug, Clone)]
pub enum Variable {
    Literal(Value),
    Lazy(LazyValue),
}

impl Variable {
    /// Produce the plain value, computing it if lazy
    pub async fn force(&self) -> Result<Value, WorkflowError> {
        match self {
            Variable::Literal(value) => Ok(value.clone()),
            Variable::Lazy(lazy) => lazy.evaluate().await,
        }
    }

    /// Same as [`force`](Self::force), as a deferred value
    pub fn to_deferred(&self) -> Deferred {
        match self {
            Variable::Literal(value) => Deferred::Value(value.clone()),
            Variable::Lazy(lazy) => Deferred::from_future(lazy.evaluate()),
        }
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        Variable::Literal(value)
    }
}
