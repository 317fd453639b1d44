//! Cache-aside reads with an optional distributed lock against stampedes.
//!
//! On a miss, [`StampedeGuard::wrap_with_lock`] lets one caller per key fetch from the
//! source while the others poll the cache. The lock lives in the shared cache, so it
//! coordinates across processes. Cache failures never fail the read: they degrade to an
//! unguarded fetch.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::cache_store::CacheStore;

pub const LOCK_SUFFIX: &str = ":lock";

/// Delay between lock attempts while another caller holds the lock.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

const LOCK_MARKER: &str = "locked";

#[derive(Clone)]
pub struct StampedeGuard {
    cache: CacheStore,
    retry_interval: Duration,
}

impl StampedeGuard {
    pub fn new(cache: CacheStore) -> Self {
        Self {
            cache,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Plain cache-aside: return the cached value or fetch and cache it.
    ///
    /// Fetch errors are returned as-is and nothing is cached.
    pub async fn wrap<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.remember(key, &value, ttl).await;
        Ok(value)
    }

    /// Cache-aside where at most one caller per key runs `fetch` at a time.
    ///
    /// Waiters poll every retry interval for up to twice `lock_timeout`, then fetch
    /// unguarded. The lock expires on its own after `lock_timeout` if the holder dies.
    pub async fn wrap_with_lock<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        lock_timeout: Duration,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(hit);
        }

        let lock_key = format!("{key}{LOCK_SUFFIX}");
        let deadline = Instant::now() + lock_timeout * 2;

        loop {
            match self
                .cache
                .set_if_absent(&lock_key, LOCK_MARKER, lock_timeout)
                .await
            {
                Ok(true) => {
                    let lock = LockGuard::new(self.cache.clone(), lock_key);

                    // A previous holder may have filled the entry while we waited.
                    if let Some(hit) = self.lookup(key).await {
                        lock.release().await;
                        return Ok(hit);
                    }

                    let result = fetch().await;
                    if let Ok(value) = &result {
                        self.remember(key, value, ttl).await;
                    }
                    lock.release().await;
                    return result;
                }
                Ok(false) => {
                    if Instant::now() >= deadline {
                        warn!(key, "Timed out waiting for cache lock; fetching unguarded");
                        break;
                    }
                    sleep(self.retry_interval).await;
                    if let Some(hit) = self.lookup(key).await {
                        return Ok(hit);
                    }
                }
                Err(err) => {
                    warn!(key, error = %err, "Cache lock unavailable; fetching unguarded");
                    break;
                }
            }
        }

        let value = fetch().await?;
        self.remember(key, &value, ttl).await;
        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(value)) => {
                debug!(key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(key, "Cache miss");
                None
            }
            Err(err) => {
                warn!(key, error = %err, "Cache read failed; treating as miss");
                None
            }
        }
    }

    async fn remember<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) {
        if let Err(err) = self.cache.set(key, value, Some(ttl)).await {
            warn!(key, error = %err, "Failed to cache value");
        }
    }
}

/// Held lock key. Released explicitly on normal exits; if the holding future is dropped
/// first, the release runs on a spawned task instead.
struct LockGuard {
    cache: CacheStore,
    key: Option<String>,
}

impl LockGuard {
    fn new(cache: CacheStore, key: String) -> Self {
        Self {
            cache,
            key: Some(key),
        }
    }

    async fn release(mut self) {
        if let Some(key) = self.key.take() {
            release_lock(&self.cache, &key).await;
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let cache = self.cache.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move { release_lock(&cache, &key).await });
        }
    }
}

async fn release_lock(cache: &CacheStore, key: &str) {
    if let Err(err) = cache.delete(key).await {
        warn!(key, error = %err, "Failed to release cache lock; it will expire");
    }
}
