//! Compute-once memoization

use super::{BoxProvider, Provider, ProviderResult};
use async_trait::async_trait;
use tokio::sync::Mutex;

struct Memo<T, K> {
    key: Option<K>,
    value: T,
}

/// Computes a value once and returns it on every later call.
///
/// When a key provider is supplied the value is recomputed whenever the key
/// changes (compared by equality). The lock is held while computing, so
/// concurrent callers wait for the first computation instead of repeating it.
pub struct MemoizedProvider<T, A = (), K = ()> {
    inner: BoxProvider<T, A>,
    key: Option<BoxProvider<K, A>>,
    memo: Mutex<Option<Memo<T, K>>>,
}

impl<T, A> MemoizedProvider<T, A, ()> {
    pub fn new(inner: BoxProvider<T, A>) -> Self {
        Self {
            inner,
            key: None,
            memo: Mutex::new(None),
        }
    }
}

impl<T, A, K> MemoizedProvider<T, A, K> {
    pub fn with_key(inner: BoxProvider<T, A>, key: BoxProvider<K, A>) -> Self {
        Self {
            inner,
            key: Some(key),
            memo: Mutex::new(None),
        }
    }

    /// Forget the memoized value
    pub async fn reset(&self) {
        *self.memo.lock().await = None;
    }
}

#[async_trait]
impl<T, A, K> Provider<T, A> for MemoizedProvider<T, A, K>
where
    T: Clone + Send + Sync,
    A: Clone + Send + Sync + 'static,
    K: PartialEq + Send + Sync,
{
    async fn get(&self, args: A) -> ProviderResult<T> {
        let key = match &self.key {
            Some(provider) => Some(provider.get(args.clone()).await?),
            None => None,
        };

        let mut memo = self.memo.lock().await;
        if let Some(existing) = memo.as_ref() {
            if existing.key == key {
                return Ok(existing.value.clone());
            }
        }

        let value = self.inner.get(args).await?;
        *memo = Some(Memo {
            key,
            value: value.clone(),
        });
        Ok(value)
    }
}
