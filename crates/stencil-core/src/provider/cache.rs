//! Key-value cache collaborator and the provider that delegates to it

use super::{from_fn, BoxProvider, Provider, ProviderResult};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// External key-value cache.
///
/// `get` returns the cached value for `key`, or awaits `loader` on a miss and
/// stores its successful result. Failed loads are never stored.
#[async_trait]
pub trait Cache<T>: Send + Sync {
    async fn get(&self, key: &str, loader: BoxFuture<'_, ProviderResult<T>>) -> ProviderResult<T>;

    async fn set(&self, key: &str, value: T);

    async fn delete(&self, key: &str);
}

/// Process-local cache with per-key single-flight loading.
///
/// The map lock is only held to look up the slot for a key; loading happens on
/// the slot itself, so loads for distinct keys proceed concurrently while
/// concurrent loads for the same key run the loader once.
pub struct InMemoryCache<T> {
    entries: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T> InMemoryCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, key: &str) -> Arc<OnceCell<T>> {
        let mut entries = self.entries.lock().await;
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Drop a slot left empty by a failed load, unless it was replaced meanwhile
    async fn discard(&self, key: &str, slot: &Arc<OnceCell<T>>) {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(key) {
            if Arc::ptr_eq(existing, slot) && !existing.initialized() {
                entries.remove(key);
            }
        }
    }
}

impl<T> Default for InMemoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Cache<T> for InMemoryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str, loader: BoxFuture<'_, ProviderResult<T>>) -> ProviderResult<T> {
        let slot = self.slot(key).await;
        if let Some(value) = slot.get() {
            debug!(key, "cache hit");
            return Ok(value.clone());
        }
        debug!(key, "cache miss");
        match slot.get_or_try_init(|| loader).await {
            Ok(value) => Ok(value.clone()),
            Err(error) => {
                self.discard(key, &slot).await;
                Err(error)
            }
        }
    }

    async fn set(&self, key: &str, value: T) {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Arc::new(OnceCell::new_with(Some(value))));
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

/// Caches the results of a provider in an external [`Cache`].
///
/// The cache key is derived either from the JSON serialization of the call
/// arguments or from an explicitly supplied key provider.
pub struct CachedProvider<T, A = ()> {
    inner: BoxProvider<T, A>,
    cache: Arc<dyn Cache<T>>,
    key: BoxProvider<String, A>,
}

impl<T, A> CachedProvider<T, A>
where
    T: Send + 'static,
    A: Serialize + Send + 'static,
{
    pub fn new(inner: BoxProvider<T, A>, cache: Arc<dyn Cache<T>>) -> Self {
        let key = from_fn(|args: A| async move {
            serde_json::to_string(&args)
                .map_err(|e| ProviderError::failed_with("Failed to derive cache key", e))
        });
        Self { inner, cache, key }
    }
}

impl<T, A> CachedProvider<T, A>
where
    T: Send + 'static,
    A: Send + 'static,
{
    pub fn with_key(
        inner: BoxProvider<T, A>,
        cache: Arc<dyn Cache<T>>,
        key: BoxProvider<String, A>,
    ) -> Self {
        Self { inner, cache, key }
    }
}

#[async_trait]
impl<T, A> Provider<T, A> for CachedProvider<T, A>
where
    T: Send + 'static,
    A: Clone + Send + Sync + 'static,
{
    async fn get(&self, args: A) -> ProviderResult<T> {
        let key = self.key.get(args.clone()).await?;
        self.cache.get(&key, self.inner.get(args)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_cache_loads_once_per_key() {
        let cache = InMemoryCache::new();
        let loads = AtomicU32::new(0);

        for _ in 0..3 {
            let value = cache
                .get(
                    "a",
                    Box::pin(async {
                        loads.fetch_add(1, Ordering::SeqCst);
                        Ok(7)
                    }),
                )
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_set_and_delete() {
        let cache = InMemoryCache::new();
        cache.set("a", 1).await;
        assert_eq!(cache.get("a", Box::pin(async { Ok(2) })).await.unwrap(), 1);

        cache.delete("a").await;
        assert_eq!(cache.get("a", Box::pin(async { Ok(3) })).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cache_concurrent_loads_share_one_fetch() {
        let cache = InMemoryCache::new();
        let loads = AtomicU32::new(0);

        let results = join_all((0..5).map(|_| {
            cache.get(
                "shared",
                Box::pin(async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(9)
                }),
            )
        }))
        .await;

        for result in results {
            assert_eq!(result.unwrap(), 9);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_failed_load_is_retried() {
        let cache: InMemoryCache<u32> = InMemoryCache::new();
        let loads = AtomicU32::new(0);
        let load = || {
            Box::pin(async {
                if loads.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProviderError::failed("offline"))
                } else {
                    Ok(5u32)
                }
            }) as BoxFuture<'_, ProviderResult<u32>>
        };

        assert!(cache.get("a", load()).await.is_err());
        assert!(cache.entries.lock().await.is_empty());

        assert_eq!(cache.get("a", load()).await.unwrap(), 5);
        assert_eq!(cache.get("a", load()).await.unwrap(), 5);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_distinct_keys_load_concurrently() {
        let cache = Arc::new(InMemoryCache::new());
        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get(
                        "slow",
                        Box::pin(async {
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            Ok("slow")
                        }),
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let fast = tokio::time::timeout(
            Duration::from_millis(100),
            cache.get("fast", Box::pin(async { Ok("fast") })),
        )
        .await
        .expect("independent key must not wait for the slow load");
        assert_eq!(fast.unwrap(), "fast");
        assert_eq!(slow.await.unwrap().unwrap(), "slow");
    }

    #[tokio::test]
    async fn test_cached_provider_keys_by_arguments() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let inner = from_fn(move |name: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(format!("hello {}", name))
            }
        });
        let provider = CachedProvider::new(inner, Arc::new(InMemoryCache::new()));

        assert_eq!(provider.get("a".to_string()).await.unwrap(), "hello a");
        assert_eq!(provider.get("a".to_string()).await.unwrap(), "hello a");
        assert_eq!(provider.get("b".to_string()).await.unwrap(), "hello b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_provider_with_explicit_key() {
        let inner = from_fn(|n: u32| async move { Ok(n) });
        let key = from_fn(|_: u32| async { Ok("shared".to_string()) });
        let provider = CachedProvider::with_key(inner, Arc::new(InMemoryCache::new()), key);

        assert_eq!(provider.get(1).await.unwrap(), 1);
        assert_eq!(provider.get(2).await.unwrap(), 1);
    }
}
