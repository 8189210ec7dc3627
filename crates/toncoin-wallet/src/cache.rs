//! Session-scoped memoization of async calls.
//!
//! Entries are keyed by call name plus the JSON serialization of the
//! arguments. Concurrent callers with the same key share one in-flight
//! computation. Failed computations are not stored, so the next caller
//! retries.

use crate::{WalletError, WalletResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// A keyed cache of async results with explicit lifetime.
pub struct MemoCache<V> {
    name: &'static str,
    entries: Mutex<HashMap<String, Arc<OnceCell<V>>>>,
}

impl<V: Clone> MemoCache<V> {
    /// Create an empty cache for the call `name`.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key for `args`.
    pub fn key<A: Serialize + ?Sized>(&self, args: &A) -> WalletResult<String> {
        let args = serde_json::to_string(args)
            .map_err(|e| WalletError::Internal(format!("cache key for {}: {}", self.name, e)))?;
        Ok(format!("{}:{}", self.name, args))
    }

    /// Return the cached value for `args`, or run `init` once for all
    /// concurrent callers.
    pub async fn get_or_try_init<A, F, Fut>(&self, args: &A, init: F) -> WalletResult<V>
    where
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = WalletResult<V>>,
    {
        let key = self.key(args)?;
        let cell = {
            let mut entries = self.entries.lock();
            entries
                .entry(key)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        let value = cell.get_or_try_init(init).await?;
        Ok(value.clone())
    }

    /// Drop the entry for `args`.
    pub fn invalidate<A: Serialize + ?Sized>(&self, args: &A) -> WalletResult<()> {
        let key = self.key(args)?;
        if self.entries.lock().remove(&key).is_some() {
            debug!(cache = self.name, key = %key, "Invalidated cache entry");
        }
        Ok(())
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        debug!(cache = self.name, count, "Cleared cache");
    }

    /// Number of keys (including in-flight ones).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when no keys are present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_collapse() {
        let cache = Arc::new(MemoCache::<u64>::new("state"));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_init("addr", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(42)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_args() {
        let cache = MemoCache::<String>::new("echo");
        let a = cache
            .get_or_try_init(&("a", 1), || async { Ok("a".to_string()) })
            .await
            .unwrap();
        let b = cache
            .get_or_try_init(&("b", 1), || async { Ok("b".to_string()) })
            .await
            .unwrap();
        assert_eq!((a.as_str(), b.as_str()), ("a", "b"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_errors_not_cached() {
        let cache = MemoCache::<u32>::new("flaky");
        let first = cache
            .get_or_try_init("k", || async { Err(WalletError::Node("down".to_string())) })
            .await;
        assert!(first.is_err());

        let second = cache.get_or_try_init("k", || async { Ok(7) }).await;
        assert_eq!(second.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = MemoCache::<u32>::new("state");
        cache.get_or_try_init("a", || async { Ok(1) }).await.unwrap();
        cache.get_or_try_init("b", || async { Ok(2) }).await.unwrap();

        cache.invalidate("a").unwrap();
        let refreshed = cache.get_or_try_init("a", || async { Ok(10) }).await.unwrap();
        assert_eq!(refreshed, 10);

        cache.clear();
        assert!(cache.is_empty());
    }
}
